//! Model registry — the ordered variant → model-id table of one provider family.
//!
//! Built once at startup and owned by the adapter that uses it. Tests can
//! hand an adapter any registry they like.

use serde::{Deserialize, Serialize};

use crate::error::{ClearTextError, ProviderError, ProviderResult, Result};
use crate::provider::ProviderFamily;

/// What to do when a caller names a variant the registry doesn't know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantPolicy {
    /// Fail with `UnknownVariant`.
    #[default]
    Reject,
    /// Use the registry's default model.
    Fallback,
}

impl std::str::FromStr for VariantPolicy {
    type Err = ClearTextError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reject" => Ok(Self::Reject),
            "fallback" => Ok(Self::Fallback),
            other => Err(ClearTextError::Config(format!(
                "Unknown variant policy '{}': expected 'reject' or 'fallback'",
                other
            ))),
        }
    }
}

/// A variant name and the backend model it selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub variant: String,
    pub model_id: String,
}

/// Ordered model table for one provider family.
///
/// Entry order is priority order: the fallback chain tries variants
/// first to last.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    family: ProviderFamily,
    entries: Vec<ModelEntry>,
    default_index: usize,
    policy: VariantPolicy,
}

impl ModelRegistry {
    /// Create a registry. The first entry becomes the default.
    pub fn new<V, M>(family: ProviderFamily, entries: Vec<(V, M)>) -> Result<Self>
    where
        V: Into<String>,
        M: Into<String>,
    {
        if entries.is_empty() {
            return Err(ClearTextError::Config(format!(
                "Model registry for {} has no entries",
                family
            )));
        }
        Ok(Self {
            family,
            entries: entries
                .into_iter()
                .map(|(variant, model_id)| ModelEntry {
                    variant: variant.into(),
                    model_id: model_id.into(),
                })
                .collect(),
            default_index: 0,
            policy: VariantPolicy::default(),
        })
    }

    /// Gemini models, most capable first. Unknown variants default to 1.5.
    pub fn gemini() -> Self {
        Self {
            family: ProviderFamily::Gemini,
            entries: vec![
                ModelEntry {
                    variant: "2.5".to_string(),
                    model_id: "gemini-2.5-flash".to_string(),
                },
                ModelEntry {
                    variant: "1.5".to_string(),
                    model_id: "gemini-1.5-flash".to_string(),
                },
            ],
            default_index: 1,
            policy: VariantPolicy::default(),
        }
    }

    /// OpenAI models, most capable first.
    pub fn openai() -> Self {
        Self {
            family: ProviderFamily::OpenAi,
            entries: vec![
                ModelEntry {
                    variant: "4o-mini".to_string(),
                    model_id: "gpt-4o-mini".to_string(),
                },
                ModelEntry {
                    variant: "4.1-mini".to_string(),
                    model_id: "gpt-4.1-mini".to_string(),
                },
                ModelEntry {
                    variant: "o3-mini".to_string(),
                    model_id: "o3-mini".to_string(),
                },
            ],
            default_index: 0,
            policy: VariantPolicy::default(),
        }
    }

    /// Built-in registry for a family.
    pub fn for_family(family: ProviderFamily) -> Self {
        match family {
            ProviderFamily::Gemini => Self::gemini(),
            ProviderFamily::OpenAi => Self::openai(),
        }
    }

    pub fn with_policy(mut self, policy: VariantPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Change the default variant. The variant must already be registered.
    pub fn with_default(mut self, variant: &str) -> Result<Self> {
        self.default_index = self.position(variant).ok_or_else(|| {
            ClearTextError::Config(format!(
                "Default variant '{}' is not registered for {}",
                variant, self.family
            ))
        })?;
        Ok(self)
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    /// Variant names in priority order.
    pub fn variants(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.variant.as_str())
    }

    pub fn default_variant(&self) -> &str {
        &self.entries[self.default_index].variant
    }

    /// Resolve a variant to its backend model id, applying the policy.
    pub fn resolve(&self, variant: &str) -> ProviderResult<&str> {
        match self.position(variant) {
            Some(i) => Ok(&self.entries[i].model_id),
            None => match self.policy {
                VariantPolicy::Reject => Err(ProviderError::unknown_variant(
                    self.family.as_str(),
                    variant,
                )),
                VariantPolicy::Fallback => {
                    tracing::debug!(
                        "Unknown {} variant '{}', using default '{}'",
                        self.family,
                        variant,
                        self.default_variant()
                    );
                    Ok(&self.entries[self.default_index].model_id)
                }
            },
        }
    }

    fn position(&self, variant: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.variant == variant)
    }
}
