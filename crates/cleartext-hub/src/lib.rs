//! # Cleartext Hub
//!
//! Provider adapters (Gemini, OpenAI), the provider fallback chain,
//! language detection, and the REST API server with its middleware.

pub mod api;
pub mod language;
pub mod metrics;
pub mod middleware;
pub mod providers;
