//! OpenAI adapter — chat completions against api.openai.com or any
//! compatible endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cleartext_core::error::{ProviderError, ProviderResult};
use cleartext_core::operation::Operation;
use cleartext_core::provider::{default_prompt, ProviderFamily, TextProvider};
use cleartext_core::registry::ModelRegistry;

use super::{excerpt, status_error};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI chat-completions provider.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_url: String,
    registry: ModelRegistry,
}

impl OpenAiProvider {
    pub fn new(
        client: Client,
        api_key: &str,
        api_base: Option<&str>,
        registry: ModelRegistry,
    ) -> Self {
        let api_base = api_base.unwrap_or(DEFAULT_API_BASE);
        let api_url = format!("{}/chat/completions", api_base.trim_end_matches('/'));

        Self {
            client,
            api_key: api_key.to_string(),
            api_url,
            registry,
        }
    }
}

/// Internal request body.
#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessageIn<'a>>,
}

#[derive(Serialize)]
struct ApiMessageIn<'a> {
    role: &'static str,
    content: &'a str,
}

/// Internal response body.
#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
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
impl TextProvider for OpenAiProvider {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenAi
    }

    fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    fn prompt(&self, operation: &Operation, text: &str) -> String {
        match operation {
            Operation::Rewrite(style) => {
                format!("Rewrite this text in a more {} tone:\n\n{}", style, text)
            }
            Operation::Title => format!("Create a short, engaging title for:\n\n{}", text),
            Operation::Summarize(_) => default_prompt(operation, text),
        }
    }

    async fn complete(&self, model: &str, prompt: &str) -> ProviderResult<String> {
        info!("Calling openai model: {}", model);

        let body = ApiRequest {
            model,
            messages: vec![ApiMessageIn {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
            return Err(status_error("openai", status, &detail));
        }

        let api_resp: ApiResponse = serde_json::from_str(&body_text).map_err(|e| {
            ProviderError::malformed(format!(
                "Failed to parse response: {} — body: {}",
                e,
                excerpt(&body_text)
            ))
        })?;

        api_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::malformed("No content in response"))
    }
}
