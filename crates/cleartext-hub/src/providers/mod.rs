pub mod fallback;
pub mod gemini;
pub mod openai;

pub use fallback::{run_fallback_chain, Candidate, ProviderSet};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use std::time::Duration;

use reqwest::{Client, StatusCode};

use cleartext_core::error::{ClearTextError, FailureKind, ProviderError, Result};

/// HTTP client shared by the adapters. Timeout policy lives here, not in
/// the adapters.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClearTextError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Map a non-success upstream status to a provider failure.
pub(crate) fn status_error(provider: &str, status: StatusCode, detail: &str) -> ProviderError {
    let kind = match status.as_u16() {
        401 | 403 => FailureKind::Auth,
        429 => FailureKind::Quota,
        400..=499 => FailureKind::Rejected,
        _ => FailureKind::Transport,
    };
    ProviderError::new(kind, format!("{} API error ({}): {}", provider, status, detail))
}

/// First 200 characters of a body, for error messages.
pub(crate) fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((i, _)) => &body[..i],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let kind = |code: u16| status_error("x", StatusCode::from_u16(code).unwrap(), "").kind;
        assert_eq!(kind(401), FailureKind::Auth);
        assert_eq!(kind(403), FailureKind::Auth);
        assert_eq!(kind(429), FailureKind::Quota);
        assert_eq!(kind(400), FailureKind::Rejected);
        assert_eq!(kind(404), FailureKind::Rejected);
        assert_eq!(kind(500), FailureKind::Transport);
        assert_eq!(kind(503), FailureKind::Transport);
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let body = "é".repeat(300);
        assert_eq!(excerpt(&body).chars().count(), 200);
        assert_eq!(excerpt("short"), "short");
    }
}
