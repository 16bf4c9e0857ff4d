//! API middleware — rate limiting, shared-secret auth, and request logging.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

use crate::api::AppState;

/// Sliding-window rate limiter keyed by client.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Check if a request should be allowed.
    pub async fn check(&self, key: &str) -> bool {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();

        // Clients that went quiet would otherwise stay in the map forever.
        let window = self.window;
        requests.retain(|_, hits| hits.last().is_some_and(|t| now.duration_since(*t) < window));

        let entry = requests.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);

        if entry.len() >= self.max_requests {
            false
        } else {
            entry.push(now);
            true
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }
}

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&headers);

    if !state.limiter.check(&key).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(serde_json::json!({
                "detail": format!(
                    "Rate limit exceeded. Max {} requests per window.",
                    state.limiter.max_requests()
                )
            })),
        )
            .into_response();
    }

    next.run(request).await
}

/// Shared-secret authentication via the `x-api-key` header.
///
/// Without a configured `INTERNAL_API_KEY` every request passes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.settings.internal_api_key.as_deref() else {
        return next.run(request).await;
    };

    let provided = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided != expected {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({
                "detail": "Invalid or missing API key"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

/// Request logging middleware.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    info!(
        "{} {} → {} ({:.1}ms)",
        method,
        uri.path(),
        status.as_u16(),
        duration.as_secs_f64() * 1000.0
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_window() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.check("a").await);
        assert!(limiter.check("a").await);
        assert!(!limiter.check("a").await);
        assert!(limiter.check("b").await);
    }

    #[tokio::test]
    async fn test_rate_limiter_expires() {
        let limiter = RateLimiter {
            requests: Arc::new(Mutex::new(HashMap::new())),
            max_requests: 1,
            window: Duration::from_millis(20),
        };
        assert!(limiter.check("a").await);
        assert!(!limiter.check("a").await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.check("a").await);
    }

    #[test]
    fn test_client_key_uses_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "unknown");
        headers.insert("x-forwarded-for", "10.0.0.1, 172.16.0.2".parse().unwrap());
        assert_eq!(client_key(&headers), "10.0.0.1");
    }
}
