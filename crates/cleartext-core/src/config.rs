//! Configuration management for Cleartext.
//!
//! Settings come from an optional TOML file, then environment variables
//! override individual keys. [`Settings::validate`] runs once at startup;
//! a missing credential for the selected family is a startup failure,
//! never a request-time one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ClearTextError, Result};
use crate::provider::ProviderFamily;
use crate::registry::VariantPolicy;

/// Top-level Cleartext configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Environment tag. `development` exposes the API docs and debug logs.
    pub env: String,

    /// Primary provider family.
    pub llm_provider: ProviderFamily,

    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,

    /// Shared secret expected in `x-api-key`. Unset = open API.
    pub internal_api_key: Option<String>,

    /// Base URL overrides (proxies, tests).
    pub gemini_api_base: Option<String>,
    pub openai_api_base: Option<String>,

    /// HTTP client timeout for a single upstream call.
    pub upstream_timeout_secs: u64,

    /// Budget for a whole fallback chain inside one request.
    pub request_deadline_secs: u64,

    pub variant_policy: VariantPolicy,

    pub server: ServerSettings,

    pub rate_limit: RateLimitSettings,
}

/// Bind address for `cleartext serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Sliding-window request budget per client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_requests: usize,
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_secs: 60,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            llm_provider: ProviderFamily::Gemini,
            gemini_api_key: None,
            openai_api_key: None,
            internal_api_key: None,
            gemini_api_base: None,
            openai_api_base: None,
            upstream_timeout_secs: 30,
            request_deadline_secs: 60,
            variant_policy: VariantPolicy::Reject,
            server: ServerSettings::default(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClearTextError::Config(format!("Failed to read config: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| ClearTextError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cleartext")
            .join("config.toml")
    }

    /// Override fields from environment-style lookups. Blank values are
    /// ignored so `OPENAI_API_KEY=` doesn't count as a credential.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("ENV") {
            self.env = v;
        }
        if let Some(v) = get("LLM_PROVIDER") {
            self.llm_provider = v.parse()?;
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = get("INTERNAL_API_KEY") {
            self.internal_api_key = Some(v);
        }
        if let Some(v) = get("GEMINI_API_BASE") {
            self.gemini_api_base = Some(v);
        }
        if let Some(v) = get("OPENAI_API_BASE") {
            self.openai_api_base = Some(v);
        }
        if let Some(v) = get("UPSTREAM_TIMEOUT_SECS") {
            self.upstream_timeout_secs = parse_number("UPSTREAM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("REQUEST_DEADLINE_SECS") {
            self.request_deadline_secs = parse_number("REQUEST_DEADLINE_SECS", &v)?;
        }
        if let Some(v) = get("MODEL_VARIANT_POLICY") {
            self.variant_policy = v.parse()?;
        }
        if let Some(v) = get("HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = parse_number("PORT", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_MAX_REQUESTS") {
            self.rate_limit.max_requests = parse_number("RATE_LIMIT_MAX_REQUESTS", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_WINDOW_SECS") {
            self.rate_limit.window_secs = parse_number("RATE_LIMIT_WINDOW_SECS", &v)?;
        }
        Ok(())
    }

    /// Fail fast on configuration defects.
    pub fn validate(&self) -> Result<()> {
        match self.llm_provider {
            ProviderFamily::Gemini if self.credential(ProviderFamily::Gemini).is_none() => {
                return Err(ClearTextError::Config(
                    "Missing GEMINI_API_KEY: 'gemini' is the selected LLM provider \
                     but GEMINI_API_KEY is not set"
                        .to_string(),
                ));
            }
            ProviderFamily::OpenAi if self.credential(ProviderFamily::OpenAi).is_none() => {
                return Err(ClearTextError::Config(
                    "Missing OPENAI_API_KEY: 'openai' is the selected LLM provider \
                     but OPENAI_API_KEY is not set"
                        .to_string(),
                ));
            }
            _ => {}
        }
        if self.upstream_timeout_secs == 0 || self.request_deadline_secs == 0 {
            return Err(ClearTextError::Config(
                "Timeouts must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(ClearTextError::Config(
                "Rate limit budget and window must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Non-blank credential for a family, if configured.
    pub fn credential(&self, family: ProviderFamily) -> Option<&str> {
        let key = match family {
            ProviderFamily::Gemini => self.gemini_api_key.as_deref(),
            ProviderFamily::OpenAi => self.openai_api_key.as_deref(),
        };
        key.map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn api_base(&self, family: ProviderFamily) -> Option<&str> {
        match family {
            ProviderFamily::Gemini => self.gemini_api_base.as_deref(),
            ProviderFamily::OpenAi => self.openai_api_base.as_deref(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.env == "development"
    }

    /// Interactive API docs are only served in development.
    pub fn docs_enabled(&self) -> bool {
        self.is_development()
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ClearTextError::Config(format!("{} must be a number, got '{}'", key, value)))
}
