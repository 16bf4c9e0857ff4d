//! Google Gemini adapter — native `generateContent` REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cleartext_core::error::{ProviderError, ProviderResult};
use cleartext_core::provider::{ProviderFamily, TextProvider};
use cleartext_core::registry::ModelRegistry;

use super::{excerpt, status_error};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    registry: ModelRegistry,
}

impl GeminiProvider {
    pub fn new(
        client: Client,
        api_key: &str,
        api_base: Option<&str>,
        registry: ModelRegistry,
    ) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base
                .unwrap_or(DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            registry,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<PartIn<'a>>,
}

#[derive(Serialize)]
struct PartIn<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<PartOut>,
}

#[derive(Deserialize)]
struct PartOut {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Gemini
    }

    fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    async fn complete(&self, model: &str, prompt: &str) -> ProviderResult<String> {
        info!("Calling gemini model: {}", model);

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![PartIn { text: prompt }],
            }],
        };

        let resp = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let body_text = resp.text().await?;

        debug!("API response status: {}, body length: {}", status, body_text.len());

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&body_text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| excerpt(&body_text).to_string());
            return Err(status_error("gemini", status, &detail));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body_text).map_err(|e| {
            ProviderError::malformed(format!(
                "Failed to parse response: {} — body: {}",
                e,
                excerpt(&body_text)
            ))
        })?;

        // Blocked prompts come back as 200 with no candidates or no parts.
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::malformed("No text in response"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cleartext_core::error::FailureKind;
    use cleartext_core::operation::SummaryLength;
    use std::time::Duration;

    fn provider(base: &str) -> GeminiProvider {
        let client = crate::providers::http_client(Duration::from_secs(5)).unwrap();
        GeminiProvider::new(client, "g-key", Some(base), ModelRegistry::gemini())
    }

    #[tokio::test]
    async fn test_summarize_calls_generate_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "g-key")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "contents": [{"parts": [{
                    "text": "Summarize the following text in a long way:\n\nRust is fast."
                }]}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"role":"model",
                    "parts":[{"text":"Rust "},{"text":"is quick.\n"}]}}]}"#,
            )
            .create_async()
            .await;

        let out = provider(&server.url())
            .summarize("Rust is fast.", SummaryLength::Long, "2.5")
            .await
            .unwrap();

        assert_eq!(out, "Rust is quick.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_key_is_auth_failure() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/models/gemini-1.5-flash:generateContent")
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"message":"API key not valid"}}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .generate_title("text", "1.5")
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Auth);
        assert!(err.message.contains("API key not valid"));
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(200)
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .generate_title("text", "2.5")
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Malformed);
    }

    #[tokio::test]
    async fn test_server_error_is_transport() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let err = provider(&server.url())
            .generate_title("text", "2.5")
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Transport);
        assert!(err.message.contains("upstream exploded"));
    }
}
