//! Operation types — what a caller asks a provider to do with a piece of text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClearTextError;

/// How long a summary should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    #[default]
    Short,
    Long,
}

impl fmt::Display for SummaryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => write!(f, "short"),
            Self::Long => write!(f, "long"),
        }
    }
}

impl FromStr for SummaryLength {
    type Err = ClearTextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(Self::Short),
            "long" => Ok(Self::Long),
            _ => Err(ClearTextError::Validation(
                "length must be 'short' or 'long'".to_string(),
            )),
        }
    }
}

/// Target tone for a rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteStyle {
    #[default]
    Simple,
    Formal,
}

impl fmt::Display for RewriteStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Formal => write!(f, "formal"),
        }
    }
}

impl FromStr for RewriteStyle {
    type Err = ClearTextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "formal" => Ok(Self::Formal),
            _ => Err(ClearTextError::Validation(
                "style must be 'simple' or 'formal'".to_string(),
            )),
        }
    }
}

/// A logical text operation, independent of which provider runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Summarize(SummaryLength),
    Rewrite(RewriteStyle),
    Title,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summarize(length) => write!(f, "summarize ({})", length),
            Self::Rewrite(style) => write!(f, "rewrite ({})", style),
            Self::Title => write!(f, "title"),
        }
    }
}

/// Generated text plus the identifier of the candidate that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub text: String,
    pub provider: String,
}

/// Reject empty or whitespace-only text, the same way for every endpoint.
pub fn require_text(text: &str) -> Result<&str, ClearTextError> {
    if text.trim().is_empty() {
        return Err(ClearTextError::Validation("Text cannot be empty".to_string()));
    }
    Ok(text)
}
