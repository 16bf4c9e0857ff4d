//! Text provider trait — the abstraction over different LLM backends.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ClearTextError, ProviderError, ProviderResult};
use crate::operation::{Operation, RewriteStyle, SummaryLength};
use crate::registry::ModelRegistry;

/// A provider family: one external text-generation backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    #[default]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderFamily {
    type Err = ClearTextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(ClearTextError::Config(format!(
                "Unknown LLM_PROVIDER '{}': expected 'gemini' or 'openai'",
                other
            ))),
        }
    }
}

/// Build the instruction sent to the backend. Families override
/// [`TextProvider::prompt`] where their wording differs.
pub fn default_prompt(operation: &Operation, text: &str) -> String {
    match operation {
        Operation::Summarize(length) => {
            format!("Summarize the following text in a {} way:\n\n{}", length, text)
        }
        Operation::Rewrite(style) => {
            format!("Rewrite the following text in a more {} tone:\n\n{}", style, text)
        }
        Operation::Title => format!(
            "Generate a concise and engaging title for the following content:\n\n{}\n\nTitle:",
            text.trim()
        ),
    }
}

/// Trim the completion; titles also lose any enclosing quotes.
pub fn finish_output(operation: &Operation, raw: &str) -> ProviderResult<String> {
    let trimmed = raw.trim();
    let out = match operation {
        Operation::Title => trimmed.trim_matches('"').trim(),
        _ => trimmed,
    };
    if out.is_empty() {
        return Err(ProviderError::malformed("Empty completion"));
    }
    Ok(out.to_string())
}

/// Text provider trait — implement this to add a new backend family.
///
/// Implementors supply `family`, `registry` and `complete`; the three
/// operations are provided on top of them.
///
/// # Example
///
/// ```rust,ignore
/// struct MyProvider { registry: ModelRegistry }
///
/// #[async_trait]
/// impl TextProvider for MyProvider {
///     fn family(&self) -> ProviderFamily { ProviderFamily::OpenAi }
///     fn registry(&self) -> &ModelRegistry { &self.registry }
///
///     async fn complete(&self, model: &str, prompt: &str) -> ProviderResult<String> {
///         // Call your API here
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn family(&self) -> ProviderFamily;

    /// Variant table this adapter resolves models from.
    fn registry(&self) -> &ModelRegistry;

    /// Send one prompt to one backend model and return its raw text.
    async fn complete(&self, model: &str, prompt: &str) -> ProviderResult<String>;

    fn prompt(&self, operation: &Operation, text: &str) -> String {
        default_prompt(operation, text)
    }

    /// Resolve the variant, build the prompt, call the backend and
    /// post-process the output.
    async fn execute(
        &self,
        operation: &Operation,
        text: &str,
        variant: &str,
    ) -> ProviderResult<String> {
        let model = self.registry().resolve(variant)?;
        let prompt = self.prompt(operation, text);
        let raw = self.complete(model, &prompt).await?;
        finish_output(operation, &raw)
    }

    async fn summarize(
        &self,
        text: &str,
        length: SummaryLength,
        variant: &str,
    ) -> ProviderResult<String> {
        self.execute(&Operation::Summarize(length), text, variant).await
    }

    async fn rewrite(
        &self,
        text: &str,
        style: RewriteStyle,
        variant: &str,
    ) -> ProviderResult<String> {
        self.execute(&Operation::Rewrite(style), text, variant).await
    }

    async fn generate_title(&self, text: &str, variant: &str) -> ProviderResult<String> {
        self.execute(&Operation::Title, text, variant).await
    }
}
