mod config;
mod rate_limit;

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use medbot_agents::{AgentConfig, ChatAgent};
use medbot_core::{CatalogStats, ChatInput, FALLBACK_RESPONSE};
use medbot_observability::{AppMetrics, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

pub use crate::config::{ApiConfig, DEFAULT_API_KEY, DEFAULT_BIND};
use crate::rate_limit::IpRateLimiter;

const MAX_CHAT_TEXT_CHARS: usize = 2_000;

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<ChatAgent>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: IpRateLimiter,
    pub allowed_origins: Arc<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    model: &'static str,
    embedder: &'static str,
    burn_enabled: bool,
    confidence_threshold: f32,
    catalog: CatalogStats,
    metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize)]
struct IntentsResponse {
    intents: usize,
    tag_order: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    text: String,
}

/// Loads the serving context and wires the router. Catalog or classifier
/// problems surface here, before any request is accepted.
pub fn build_app(agent_config: &AgentConfig, api_config: &ApiConfig) -> Result<Router> {
    let metrics = AppMetrics::shared();
    let agent = Arc::new(ChatAgent::load(agent_config, metrics.clone())?);

    let state = ApiState {
        agent,
        metrics,
        api_key: api_config.api_key.clone(),
        limiter: IpRateLimiter::new(api_config.rate_limit_window, api_config.rate_limit_max),
        allowed_origins: Arc::new(api_config.allowed_origins.clone()),
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(chat))
        .route("/v1/intents", get(intents))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(16 * 1024))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        model: state.agent.model_name(),
        embedder: state.agent.embedder_name(),
        burn_enabled: state.agent.burn_enabled(),
        confidence_threshold: state.agent.ranker().threshold(),
        catalog: state.agent.catalog().stats(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn intents(State(state): State<ApiState>) -> impl IntoResponse {
    let catalog = state.agent.catalog();
    (
        StatusCode::OK,
        Json(IntentsResponse {
            intents: catalog.len(),
            tag_order: catalog.tag_order().to_vec(),
        }),
    )
}

async fn chat(
    State(state): State<ApiState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return invalid_request(&rejection),
    };

    if request.text.chars().count() > MAX_CHAT_TEXT_CHARS {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(serde_json::json!({
                "error": "text_too_long",
                "message": format!("text must be at most {MAX_CHAT_TEXT_CHARS} characters"),
            })),
        )
            .into_response();
    }

    match state
        .agent
        .handle_chat(ChatInput { text: request.text })
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(err) => {
            warn!(error = %err, "chat request failed in the classifier");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": err.code(),
                    "message": "the intent classifier is unavailable, retry later",
                    "reply_text": FALLBACK_RESPONSE,
                })),
            )
                .into_response()
        }
    }
}

fn invalid_request(rejection: &JsonRejection) -> Response {
    debug!(reason = %rejection.body_text(), "rejected chat body");
    (
        rejection.status(),
        Json(serde_json::json!({
            "error": "invalid_request",
            "message": "body must be a JSON object with a `text` string",
        })),
    )
        .into_response()
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if header_key != state.api_key {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "missing or invalid x-api-key"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if !state.limiter.allow(&ip) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this IP"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );

    response
}
