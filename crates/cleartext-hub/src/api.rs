//! REST API server — expose the text operations as an HTTP service.
//!
//! Endpoints:
//! - POST /summarize — Summarize text (`short` | `long`)
//! - POST /rewrite — Rewrite text in another tone (`simple` | `formal`)
//! - POST /title — Generate a title
//! - POST /language-detect — Detect the language of a text
//! - GET  /health — Health check and counters
//! - GET  /docs, /openapi.json — API docs, development only

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use cleartext_core::config::Settings;
use cleartext_core::error::ClearTextError;
use cleartext_core::operation::{
    require_text, Operation, OperationResult, RewriteStyle, SummaryLength,
};

use crate::language::{LanguageDetector, WhatlangDetector};
use crate::metrics::{new_metrics, Outcome, SharedMetrics};
use crate::middleware::{auth_middleware, logging_middleware, rate_limit_middleware, RateLimiter};
use crate::providers::ProviderSet;

/// Shared API state. Everything in here is read-only or internally
/// synchronized, so handlers never take a lock on it.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub providers: ProviderSet,
    pub detector: Arc<dyn LanguageDetector>,
    pub metrics: SharedMetrics,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        settings: Settings,
        providers: ProviderSet,
        detector: Arc<dyn LanguageDetector>,
    ) -> Self {
        let limiter = RateLimiter::new(
            settings.rate_limit.max_requests,
            settings.rate_limit.window_secs,
        );
        Self {
            settings: Arc::new(settings),
            providers,
            detector,
            metrics: new_metrics(),
            limiter,
        }
    }

    /// Real adapters and the `whatlang` detector.
    pub fn from_settings(settings: Settings) -> cleartext_core::error::Result<Self> {
        let providers = ProviderSet::from_settings(&settings)?;
        Ok(Self::new(settings, providers, Arc::new(WhatlangDetector)))
    }
}

// ─── Request/Response types ────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct SummarizeRequest {
    #[schema(example = "Rust is a systems programming language focused on safety.")]
    pub text: String,
    /// `short` (default) or `long`.
    #[serde(default)]
    pub length: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SummarizeResponse {
    pub summary: String,
    pub provider: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RewriteRequest {
    pub text: String,
    /// `simple` (default) or `formal`.
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RewriteResponse {
    pub rewritten: String,
    pub provider: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TitleRequest {
    #[schema(example = "Here is a long article...")]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TitleResponse {
    pub title: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LanguageDetectRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LanguageDetectResponse {
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub detail: String,
}

// ─── Errors ────────────────────────────────────────────────

/// An HTTP error with a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => rejection.status(),
        };
        Self::new(status, rejection.body_text())
    }
}

/// JSON body extractor whose rejections use the API error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Summarize,
    Rewrite,
    Title,
    LanguageDetect,
}

impl Endpoint {
    fn generic_failure(self) -> &'static str {
        match self {
            Self::Summarize => "Summarization failed",
            Self::Rewrite => "Rewrite failed",
            Self::Title => "Internal server error during title generation",
            Self::LanguageDetect => "Language detection failed",
        }
    }
}

/// Map a failure to a status code and record it. Internal detail is
/// logged, never returned.
fn failure(state: &AppState, endpoint: Endpoint, err: ClearTextError) -> ApiError {
    let (outcome, api_error) = match err {
        ClearTextError::Validation(msg) => (
            Outcome::Rejected,
            ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, msg),
        ),
        ClearTextError::UndetectableLanguage => (
            Outcome::Rejected,
            ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                ClearTextError::UndetectableLanguage.to_string(),
            ),
        ),
        ClearTextError::ProvidersExhausted { ref attempts } => {
            let tried: Vec<String> = attempts
                .iter()
                .map(|a| format!("{} ({})", a.provider, a.error.kind))
                .collect();
            warn!("{:?}: providers exhausted, tried [{}]", endpoint, tried.join(", "));
            let api_error = match endpoint {
                Endpoint::Title => {
                    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, endpoint.generic_failure())
                }
                _ => ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "All providers failed"),
            };
            (Outcome::Exhausted, api_error)
        }
        ClearTextError::DeadlineExceeded(limit) => {
            warn!("{:?}: deadline of {:?} exceeded", endpoint, limit);
            let api_error = match endpoint {
                Endpoint::Summarize | Endpoint::Rewrite => {
                    ApiError::new(StatusCode::GATEWAY_TIMEOUT, "LLM provider timeout")
                }
                _ => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, endpoint.generic_failure()),
            };
            (Outcome::Error, api_error)
        }
        other => {
            error!("{:?} failed: {}", endpoint, other);
            (
                Outcome::Error,
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, endpoint.generic_failure()),
            )
        }
    };
    state.metrics.record(outcome);
    api_error
}

/// Unwrap an extracted body. A rejected body is a rejected request.
fn accept<T>(state: &AppState, body: Result<ApiJson<T>, ApiError>) -> Result<T, ApiError> {
    match body {
        Ok(ApiJson(req)) => Ok(req),
        Err(e) => {
            state.metrics.record(Outcome::Rejected);
            Err(e)
        }
    }
}

fn parse_or_default<T>(value: Option<&str>) -> Result<T, ClearTextError>
where
    T: std::str::FromStr<Err = ClearTextError> + Default,
{
    value.map(str::parse::<T>).transpose().map(Option::unwrap_or_default)
}

/// Run the fallback chain under the per-request deadline.
async fn run_operation(
    state: &AppState,
    operation: Operation,
    text: &str,
) -> Result<OperationResult, ClearTextError> {
    let deadline = state.settings.request_deadline();
    let result = tokio::time::timeout(deadline, state.providers.execute(operation, text))
        .await
        .map_err(|_| ClearTextError::DeadlineExceeded(deadline))??;

    if state.providers.preferred_id().as_deref() != Some(result.provider.as_str()) {
        state.metrics.record_fallback();
    }
    state.metrics.record(Outcome::Success);
    Ok(result)
}

// ─── Handlers ──────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/summarize",
    tag = "Summarize",
    request_body = SummarizeRequest,
    responses(
        (status = 200, description = "Summary and its provider", body = SummarizeResponse),
        (status = 401, description = "Invalid or missing API key", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody),
        (status = 503, description = "All providers failed", body = ErrorBody),
        (status = 504, description = "LLM provider timeout", body = ErrorBody)
    )
)]
async fn summarize(
    State(state): State<AppState>,
    body: Result<ApiJson<SummarizeRequest>, ApiError>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let endpoint = Endpoint::Summarize;
    let req = accept(&state, body)?;
    let length: SummaryLength =
        parse_or_default(req.length.as_deref()).map_err(|e| failure(&state, endpoint, e))?;
    let text = require_text(&req.text).map_err(|e| failure(&state, endpoint, e))?;

    let result = run_operation(&state, Operation::Summarize(length), text)
        .await
        .map_err(|e| failure(&state, endpoint, e))?;

    Ok(Json(SummarizeResponse {
        summary: result.text,
        provider: result.provider,
    }))
}

#[utoipa::path(
    post,
    path = "/rewrite",
    tag = "Rewrite",
    request_body = RewriteRequest,
    responses(
        (status = 200, description = "Rewritten text and its provider", body = RewriteResponse),
        (status = 401, description = "Invalid or missing API key", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody),
        (status = 503, description = "All providers failed", body = ErrorBody),
        (status = 504, description = "LLM provider timeout", body = ErrorBody)
    )
)]
async fn rewrite(
    State(state): State<AppState>,
    body: Result<ApiJson<RewriteRequest>, ApiError>,
) -> Result<Json<RewriteResponse>, ApiError> {
    let endpoint = Endpoint::Rewrite;
    let req = accept(&state, body)?;
    let style: RewriteStyle =
        parse_or_default(req.style.as_deref()).map_err(|e| failure(&state, endpoint, e))?;
    let text = require_text(&req.text).map_err(|e| failure(&state, endpoint, e))?;

    let result = run_operation(&state, Operation::Rewrite(style), text)
        .await
        .map_err(|e| failure(&state, endpoint, e))?;

    Ok(Json(RewriteResponse {
        rewritten: result.text,
        provider: result.provider,
    }))
}

#[utoipa::path(
    post,
    path = "/title",
    tag = "Title",
    request_body = TitleRequest,
    responses(
        (status = 200, description = "Generated title", body = TitleResponse),
        (status = 401, description = "Invalid or missing API key", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody),
        (status = 500, description = "Title generation failed", body = ErrorBody)
    )
)]
async fn title(
    State(state): State<AppState>,
    body: Result<ApiJson<TitleRequest>, ApiError>,
) -> Result<Json<TitleResponse>, ApiError> {
    let endpoint = Endpoint::Title;
    let req = accept(&state, body)?;
    let text = require_text(&req.text).map_err(|e| failure(&state, endpoint, e))?;

    let result = run_operation(&state, Operation::Title, text)
        .await
        .map_err(|e| failure(&state, endpoint, e))?;

    Ok(Json(TitleResponse { title: result.text }))
}

#[utoipa::path(
    post,
    path = "/language-detect",
    tag = "Language",
    request_body = LanguageDetectRequest,
    responses(
        (status = 200, description = "Detected language code", body = LanguageDetectResponse),
        (status = 401, description = "Invalid or missing API key", body = ErrorBody),
        (status = 422, description = "Empty input or undetectable language", body = ErrorBody),
        (status = 500, description = "Language detection failed", body = ErrorBody)
    )
)]
async fn language_detect(
    State(state): State<AppState>,
    body: Result<ApiJson<LanguageDetectRequest>, ApiError>,
) -> Result<Json<LanguageDetectResponse>, ApiError> {
    let endpoint = Endpoint::LanguageDetect;
    let req = accept(&state, body)?;
    let text = require_text(&req.text).map_err(|e| failure(&state, endpoint, e))?;

    let language = state
        .detector
        .detect(text)
        .map_err(|e| failure(&state, endpoint, e))?;

    state.metrics.record_detection();
    state.metrics.record(Outcome::Success);
    Ok(Json(LanguageDetectResponse {
        language: language.to_string(),
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let providers: Vec<String> = state
        .providers
        .active_families()
        .iter()
        .map(|f| f.to_string())
        .collect();

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "env": state.settings.env,
        "providers": providers,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "metrics": state.metrics.to_json(),
    }))
}

/// The root is not part of the API. Answer like nothing is here.
async fn block_root() -> impl IntoResponse {
    let jitter = rand::thread_rng().gen_range(50..=200);
    tokio::time::sleep(Duration::from_millis(jitter)).await;

    (
        StatusCode::NOT_FOUND,
        [
            ("x-robots-tag", "noindex, nofollow"),
            ("cache-control", "no-store"),
            ("x-content-type-options", "nosniff"),
        ],
        "Not found",
    )
}

// ─── OpenAPI ───────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cleartext API",
        description = "Summarization, rewriting, title generation and language detection."
    ),
    paths(summarize, rewrite, title, language_detect),
    components(schemas(
        SummarizeRequest,
        SummarizeResponse,
        RewriteRequest,
        RewriteResponse,
        TitleRequest,
        TitleResponse,
        LanguageDetectRequest,
        LanguageDetectResponse,
        ErrorBody
    )),
    tags(
        (name = "Summarize", description = "Summarize text"),
        (name = "Rewrite", description = "Rewrite text in another tone"),
        (name = "Title", description = "Generate a title"),
        (name = "Language", description = "Detect the language of a text")
    )
)]
pub struct ApiDoc;

// ─── Server builder ────────────────────────────────────────

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/summarize", post(summarize))
        .route("/summarize/", post(summarize))
        .route("/rewrite", post(rewrite))
        .route("/rewrite/", post(rewrite))
        .route("/title", post(title))
        .route("/title/", post(title))
        .route("/language-detect", post(language_detect))
        .route("/language-detect/", post(language_detect))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    let mut app = Router::new()
        .route("/", get(block_root))
        .route("/health", get(health))
        .merge(protected);

    if state.settings.docs_enabled() {
        app = app.merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server.
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let server = &state.settings.server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;

    if state.settings.internal_api_key.is_none() {
        warn!("INTERNAL_API_KEY is not set; the API accepts unauthenticated requests");
    }
    info!(
        "Provider chain: {}",
        state
            .providers
            .active_families()
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(" → ")
    );
    if state.settings.docs_enabled() {
        info!("API docs at http://{}/docs", addr);
    }

    let app = build_router(state);

    info!("🌐 API server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
