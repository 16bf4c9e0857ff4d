//! Error types for Cleartext.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why a single provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection, DNS, TLS or upstream 5xx trouble.
    Transport,
    /// The HTTP client gave up waiting.
    Timeout,
    /// Credential rejected (401/403).
    Auth,
    /// Rate limit or quota exhausted (429).
    Quota,
    /// Any other 4xx: the backend refused the request.
    Rejected,
    /// The body could not be decoded or held no text.
    Malformed,
    /// The requested model variant is not in the family's registry.
    UnknownVariant,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::Rejected => "rejected",
            Self::Malformed => "malformed",
            Self::UnknownVariant => "unknown-variant",
        };
        f.write_str(s)
    }
}

/// Failure of one provider adapter call.
///
/// This is an expected outcome: the fallback chain treats it as
/// "this candidate failed" and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, message)
    }

    pub fn unknown_variant(family: &str, variant: &str) -> Self {
        Self::new(
            FailureKind::UnknownVariant,
            format!("Unknown {} model variant: {}", family, variant),
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            FailureKind::Timeout
        } else if e.is_decode() {
            FailureKind::Malformed
        } else {
            FailureKind::Transport
        };
        Self::new(kind, e.to_string())
    }
}

/// One failed candidate, kept for logs only.
#[derive(Debug, Clone)]
pub struct FailedAttempt {
    pub provider: String,
    pub error: ProviderError,
}

/// Core error type for all Cleartext operations.
#[derive(Error, Debug)]
pub enum ClearTextError {
    /// Every candidate failed, or there were none. The message stays
    /// generic; `attempts` is for logging.
    #[error("All providers failed")]
    ProvidersExhausted { attempts: Vec<FailedAttempt> },

    #[error("{0}")]
    Validation(String),

    #[error("Could not determine language. Try providing more text.")]
    UndetectableLanguage,

    #[error("Request deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClearTextError>;

/// Result of a single provider adapter call.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_message_hides_attempts() {
        let err = ClearTextError::ProvidersExhausted {
            attempts: vec![FailedAttempt {
                provider: "gemini-2.5".to_string(),
                error: ProviderError::new(FailureKind::Auth, "bad key sk-123"),
            }],
        };
        assert_eq!(err.to_string(), "All providers failed");
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::unknown_variant("gemini", "9.9");
        assert_eq!(err.kind, FailureKind::UnknownVariant);
        assert_eq!(err.to_string(), "unknown-variant: Unknown gemini model variant: 9.9");
    }
}
