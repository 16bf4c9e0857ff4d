//! # Cleartext Core
//!
//! Shared types, traits, and configuration for the Cleartext text-processing
//! proxy. Provider adapters, the fallback chain and the HTTP API live in
//! `cleartext-hub`; this crate is what they agree on.

pub mod config;
pub mod error;
pub mod operation;
pub mod provider;
pub mod registry;
