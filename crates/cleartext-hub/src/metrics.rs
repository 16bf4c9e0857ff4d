//! Runtime metrics — request outcomes per endpoint family.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Process-lifetime counters. Reset on restart.
#[derive(Debug, Default)]
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_rejected: AtomicU64,
    pub requests_error: AtomicU64,
    pub chains_exhausted: AtomicU64,
    pub fallbacks_used: AtomicU64,
    pub detections: AtomicU64,
    start_time: Option<Instant>,
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Client error (validation, undetectable input).
    Rejected,
    Exhausted,
    Error,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record(&self, outcome: Outcome) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Outcome::Success => &self.requests_success,
            Outcome::Rejected => &self.requests_rejected,
            Outcome::Exhausted => {
                self.chains_exhausted.fetch_add(1, Ordering::Relaxed);
                &self.requests_error
            }
            Outcome::Error => &self.requests_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A chain succeeded on something other than its first candidate.
    pub fn record_fallback(&self) {
        self.fallbacks_used.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection(&self) {
        self.detections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// Export as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        let uptime = self.uptime_secs();
        let hours = uptime / 3600;
        let minutes = (uptime % 3600) / 60;
        let seconds = uptime % 60;

        serde_json::json!({
            "uptime": format!("{}h {}m {}s", hours, minutes, seconds),
            "uptime_secs": uptime,
            "requests": {
                "total": self.requests_total.load(Ordering::Relaxed),
                "success": self.requests_success.load(Ordering::Relaxed),
                "rejected": self.requests_rejected.load(Ordering::Relaxed),
                "errors": self.requests_error.load(Ordering::Relaxed),
            },
            "chains_exhausted": self.chains_exhausted.load(Ordering::Relaxed),
            "fallbacks_used": self.fallbacks_used.load(Ordering::Relaxed),
            "detections": self.detections.load(Ordering::Relaxed),
        })
    }
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;

pub fn new_metrics() -> SharedMetrics {
    Arc::new(Metrics::new())
}
