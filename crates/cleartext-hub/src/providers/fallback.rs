//! Provider fallback chain.
//!
//! A request becomes an ordered list of [`Candidate`]s (family + model
//! variant). [`run_fallback_chain`] tries them one at a time and returns
//! the first success. Only when every candidate has failed does it give up.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use cleartext_core::config::Settings;
use cleartext_core::error::{ClearTextError, FailedAttempt, ProviderResult, Result};
use cleartext_core::operation::{Operation, OperationResult};
use cleartext_core::provider::{ProviderFamily, TextProvider};
use cleartext_core::registry::ModelRegistry;

use super::{http_client, GeminiProvider, OpenAiProvider};

/// One deferred provider call: which adapter, which variant, what to do.
///
/// Holds everything explicitly so a chain can be inspected before any
/// network call happens.
#[derive(Clone)]
pub struct Candidate {
    pub id: String,
    pub variant: String,
    pub operation: Operation,
    text: Arc<str>,
    provider: Arc<dyn TextProvider>,
}

impl Candidate {
    pub fn new(
        provider: Arc<dyn TextProvider>,
        variant: &str,
        operation: Operation,
        text: Arc<str>,
    ) -> Self {
        Self {
            id: format!("{}-{}", provider.family(), variant),
            variant: variant.to_string(),
            operation,
            text,
            provider,
        }
    }

    pub fn family(&self) -> ProviderFamily {
        self.provider.family()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Run the deferred call.
    pub async fn invoke(&self) -> ProviderResult<String> {
        let p = &self.provider;
        match self.operation {
            Operation::Summarize(length) => p.summarize(&self.text, length, &self.variant).await,
            Operation::Rewrite(style) => p.rewrite(&self.text, style, &self.variant).await,
            Operation::Title => p.generate_title(&self.text, &self.variant).await,
        }
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .finish()
    }
}

/// Try candidates in order and return the first success.
///
/// Failures are logged and skipped; there is no retry and no delay. An
/// empty list, or a list where everything failed, yields
/// [`ClearTextError::ProvidersExhausted`].
pub async fn run_fallback_chain(candidates: Vec<Candidate>) -> Result<OperationResult> {
    let total = candidates.len();
    let mut attempts = Vec::new();

    for (i, candidate) in candidates.into_iter().enumerate() {
        debug!("Trying candidate {}/{}: {}", i + 1, total, candidate.id);

        match candidate.invoke().await {
            Ok(text) => {
                if i > 0 {
                    info!("Fallback candidate {} succeeded after {} failure(s)", candidate.id, i);
                }
                return Ok(OperationResult {
                    text,
                    provider: candidate.id,
                });
            }
            Err(e) => {
                warn!("Candidate {} failed ({}): {}", candidate.id, e.kind, e.message);
                attempts.push(FailedAttempt {
                    provider: candidate.id,
                    error: e,
                });
            }
        }
    }

    warn!("All {} candidate(s) failed", total);
    Err(ClearTextError::ProvidersExhausted { attempts })
}

/// The configured adapters, built once at startup.
///
/// `primary` decides whether Gemini takes part at all; OpenAI joins
/// whenever it has a credential.
#[derive(Clone)]
pub struct ProviderSet {
    primary: ProviderFamily,
    gemini: Option<Arc<dyn TextProvider>>,
    openai: Option<Arc<dyn TextProvider>>,
}

impl ProviderSet {
    pub fn new(
        primary: ProviderFamily,
        gemini: Option<Arc<dyn TextProvider>>,
        openai: Option<Arc<dyn TextProvider>>,
    ) -> Self {
        Self {
            primary,
            gemini,
            openai,
        }
    }

    /// Build real adapters for every credentialed family.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = http_client(settings.upstream_timeout())?;
        let policy = settings.variant_policy;
        let registry = |family| ModelRegistry::for_family(family).with_policy(policy);

        let gemini = settings.credential(ProviderFamily::Gemini).map(|key| {
            Arc::new(GeminiProvider::new(
                client.clone(),
                key,
                settings.api_base(ProviderFamily::Gemini),
                registry(ProviderFamily::Gemini),
            )) as Arc<dyn TextProvider>
        });

        let openai = settings.credential(ProviderFamily::OpenAi).map(|key| {
            Arc::new(OpenAiProvider::new(
                client.clone(),
                key,
                settings.api_base(ProviderFamily::OpenAi),
                registry(ProviderFamily::OpenAi),
            )) as Arc<dyn TextProvider>
        });

        let set = Self::new(settings.llm_provider, gemini, openai);
        if set.is_empty() {
            return Err(ClearTextError::Config(
                "No provider has a credential; the fallback chain would always be empty"
                    .to_string(),
            ));
        }
        Ok(set)
    }

    pub fn primary(&self) -> ProviderFamily {
        self.primary
    }

    /// Families that will take part in a chain, in chain order.
    pub fn active_families(&self) -> Vec<ProviderFamily> {
        self.tiers().map(|p| p.family()).collect()
    }

    /// Identifier of the candidate every chain starts with.
    pub fn preferred_id(&self) -> Option<String> {
        let provider = self.tiers().next()?;
        let variant = provider.registry().variants().next()?;
        Some(format!("{}-{}", provider.family(), variant))
    }

    pub fn is_empty(&self) -> bool {
        self.tiers().next().is_none()
    }

    fn tiers(&self) -> impl Iterator<Item = &Arc<dyn TextProvider>> {
        let gemini = if self.primary == ProviderFamily::Gemini {
            self.gemini.as_ref()
        } else {
            None
        };
        gemini.into_iter().chain(self.openai.as_ref())
    }

    /// Ordered candidates for one request: every Gemini variant (when
    /// Gemini is primary) before any OpenAI variant.
    pub fn candidates(&self, operation: Operation, text: &str) -> Vec<Candidate> {
        let text: Arc<str> = Arc::from(text);
        self.tiers()
            .flat_map(|provider| {
                let text = text.clone();
                provider
                    .registry()
                    .variants()
                    .map(move |variant| {
                        Candidate::new(provider.clone(), variant, operation, text.clone())
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Build the chain for `operation` and run it.
    pub async fn execute(&self, operation: Operation, text: &str) -> Result<OperationResult> {
        let chain = self.candidates(operation, text);
        debug!("Running {} with {} candidate(s)", operation, chain.len());
        run_fallback_chain(chain).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cleartext_core::error::{FailureKind, ProviderError};
    use cleartext_core::operation::{RewriteStyle, SummaryLength};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Provider whose outcome is scripted per model id.
    struct ScriptedProvider {
        family: ProviderFamily,
        registry: ModelRegistry,
        outcomes: HashMap<String, ProviderResult<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(family: ProviderFamily) -> Self {
            Self {
                family,
                registry: ModelRegistry::for_family(family),
                outcomes: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn ok(mut self, model: &str, text: &str) -> Self {
            self.outcomes.insert(model.to_string(), Ok(text.to_string()));
            self
        }

        fn fail(mut self, model: &str, kind: FailureKind) -> Self {
            self.outcomes
                .insert(model.to_string(), Err(ProviderError::new(kind, "scripted")));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextProvider for ScriptedProvider {
        fn family(&self) -> ProviderFamily {
            self.family
        }

        fn registry(&self) -> &ModelRegistry {
            &self.registry
        }

        async fn complete(&self, model: &str, _prompt: &str) -> ProviderResult<String> {
            self.calls.lock().unwrap().push(model.to_string());
            self.outcomes
                .get(model)
                .cloned()
                .unwrap_or_else(|| Err(ProviderError::new(FailureKind::Transport, "unscripted")))
        }
    }

    fn set(
        primary: ProviderFamily,
        gemini: Option<Arc<ScriptedProvider>>,
        openai: Option<Arc<ScriptedProvider>>,
    ) -> ProviderSet {
        ProviderSet::new(
            primary,
            gemini.map(|p| p as Arc<dyn TextProvider>),
            openai.map(|p| p as Arc<dyn TextProvider>),
        )
    }

    fn ids(chain: &[Candidate]) -> Vec<&str> {
        chain.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let gemini = Arc::new(
            ScriptedProvider::new(ProviderFamily::Gemini)
                .ok("gemini-2.5-flash", "first")
                .ok("gemini-1.5-flash", "second"),
        );
        let openai =
            Arc::new(ScriptedProvider::new(ProviderFamily::OpenAi).ok("gpt-4o-mini", "third"));
        let providers = set(ProviderFamily::Gemini, Some(gemini.clone()), Some(openai.clone()));

        let result = providers
            .execute(Operation::Summarize(SummaryLength::Short), "text")
            .await
            .unwrap();

        assert_eq!(result.text, "first");
        assert_eq!(result.provider, "gemini-2.5");
        assert_eq!(gemini.calls(), vec!["gemini-2.5-flash"]);
        assert!(openai.calls().is_empty());
    }

    #[tokio::test]
    async fn test_k_failures_then_success() {
        let gemini = Arc::new(
            ScriptedProvider::new(ProviderFamily::Gemini)
                .fail("gemini-2.5-flash", FailureKind::Timeout)
                .fail("gemini-1.5-flash", FailureKind::Quota),
        );
        let openai = Arc::new(
            ScriptedProvider::new(ProviderFamily::OpenAi)
                .fail("gpt-4o-mini", FailureKind::Malformed)
                .ok("gpt-4.1-mini", "rewritten")
                .ok("o3-mini", "never"),
        );
        let providers = set(ProviderFamily::Gemini, Some(gemini.clone()), Some(openai.clone()));

        let result = providers
            .execute(Operation::Rewrite(RewriteStyle::Formal), "text")
            .await
            .unwrap();

        assert_eq!(result.text, "rewritten");
        assert_eq!(result.provider, "openai-4.1-mini");
        assert_eq!(gemini.calls().len(), 2);
        assert_eq!(openai.calls(), vec!["gpt-4o-mini", "gpt-4.1-mini"]);
    }

    #[tokio::test]
    async fn test_all_fail_exhausts_and_keeps_attempts() {
        let gemini = Arc::new(ScriptedProvider::new(ProviderFamily::Gemini));
        let providers = set(ProviderFamily::Gemini, Some(gemini.clone()), None);

        let err = providers.execute(Operation::Title, "text").await.unwrap_err();

        match err {
            ClearTextError::ProvidersExhausted { attempts } => {
                let tried: Vec<&str> = attempts.iter().map(|a| a.provider.as_str()).collect();
                assert_eq!(tried, vec!["gemini-2.5", "gemini-1.5"]);
                assert!(attempts.iter().all(|a| a.error.kind == FailureKind::Transport));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(gemini.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_chain_exhausts() {
        let err = run_fallback_chain(Vec::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ClearTextError::ProvidersExhausted { ref attempts } if attempts.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let gemini = Arc::new(
            ScriptedProvider::new(ProviderFamily::Gemini)
                .fail("gemini-2.5-flash", FailureKind::Auth)
                .ok("gemini-1.5-flash", "stable"),
        );
        let providers = set(ProviderFamily::Gemini, Some(gemini.clone()), None);

        let a = providers.execute(Operation::Title, "same").await.unwrap();
        let b = providers.execute(Operation::Title, "same").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(gemini.calls().len(), 4);
    }

    #[test]
    fn test_chain_order_gemini_primary_with_openai_key() {
        let providers = set(
            ProviderFamily::Gemini,
            Some(Arc::new(ScriptedProvider::new(ProviderFamily::Gemini))),
            Some(Arc::new(ScriptedProvider::new(ProviderFamily::OpenAi))),
        );
        let chain = providers.candidates(Operation::Title, "t");
        assert_eq!(
            ids(&chain),
            vec!["gemini-2.5", "gemini-1.5", "openai-4o-mini", "openai-4.1-mini", "openai-o3-mini"]
        );
        assert!(chain.iter().all(|c| c.text() == "t" && c.operation == Operation::Title));
    }

    #[test]
    fn test_chain_skips_gemini_when_openai_primary() {
        let providers = set(
            ProviderFamily::OpenAi,
            Some(Arc::new(ScriptedProvider::new(ProviderFamily::Gemini))),
            Some(Arc::new(ScriptedProvider::new(ProviderFamily::OpenAi))),
        );
        let chain = providers.candidates(Operation::Summarize(SummaryLength::Long), "t");
        assert_eq!(ids(&chain), vec!["openai-4o-mini", "openai-4.1-mini", "openai-o3-mini"]);
        assert_eq!(providers.active_families(), vec![ProviderFamily::OpenAi]);
        assert_eq!(providers.preferred_id().as_deref(), Some("openai-4o-mini"));
    }

    #[test]
    fn test_chain_without_openai_key() {
        let providers = set(
            ProviderFamily::Gemini,
            Some(Arc::new(ScriptedProvider::new(ProviderFamily::Gemini))),
            None,
        );
        let chain = providers.candidates(Operation::Title, "t");
        assert_eq!(ids(&chain), vec!["gemini-2.5", "gemini-1.5"]);
        assert!(chain.iter().all(|c| c.family() == ProviderFamily::Gemini));
    }

    #[test]
    fn test_from_settings_requires_some_credential() {
        let settings = Settings::default();
        assert!(ProviderSet::from_settings(&settings).is_err());

        let settings = Settings {
            gemini_api_key: Some("g".to_string()),
            openai_api_key: Some("o".to_string()),
            ..Settings::default()
        };
        let providers = ProviderSet::from_settings(&settings).unwrap();
        assert_eq!(
            providers.active_families(),
            vec![ProviderFamily::Gemini, ProviderFamily::OpenAi]
        );
        assert_eq!(providers.candidates(Operation::Title, "t").len(), 5);
    }
}
