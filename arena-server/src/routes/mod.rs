//! HTTP routes for the arena server.
//!
//! Handlers are thin: they decode camelCase bodies, call the debate or tutor
//! engine and map [`arena_common::Error`] onto `{error, code}` responses.

mod debate;
mod health;
mod tutor;

pub use debate::{DebateIdRequest, StartDebateRequest, TurnResponse};
pub use health::{DebugSessionsResponse, HealthResponse};
pub use tutor::{ChatRequestBody, ChatResponseBody, ClearRequest, ClearResponse};

use crate::debate::DebateEngine;
use crate::tutor::TutorEngine;
use arena_common::config::Config;
use arena_common::Error;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub debates: Arc<DebateEngine>,
    pub tutor: Arc<TutorEngine>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(debates: DebateEngine, tutor: TutorEngine) -> Self {
        Self {
            debates: Arc::new(debates),
            tutor: Arc::new(tutor),
            started_at: Instant::now(),
        }
    }
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Handler error carrying a domain [`Error`].
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &self.0 {
            Error::Upstream(message) => message.clone(),
            Error::NotFound(_) | Error::InvalidInput(_) | Error::Conflict(_) => self.0.to_string(),
            Error::WithContext { .. } if status != StatusCode::INTERNAL_SERVER_ERROR => {
                self.0.to_string()
            }
            _ => "Internal server error".to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: self.0.code().to_string(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// `Referer` header, forwarded to the completion service.
pub(crate) fn referer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(String::from)
}

/// Routes without middleware, for tests.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/debate/start", post(debate::start_handler))
        .route("/api/debate/next-round", post(debate::next_round_handler))
        .route("/api/debate/continue", post(debate::continue_handler))
        .route("/api/debate/stop", post(debate::stop_handler))
        .route(
            "/api/debate/:debate_id",
            get(debate::get_handler).delete(debate::delete_handler),
        )
        .route("/api/chat", post(tutor::chat_handler))
        .route("/api/clear-pdf", post(tutor::clear_handler))
        .route("/api/health", get(health::health_handler))
        .route("/api/debug/sessions", get(health::debug_sessions_handler))
        .with_state(state)
}

/// Full router with request tracing, CORS, a request timeout and the JSON
/// body limit.
pub fn build_router(config: &Config, state: AppState) -> Router {
    // must exceed the completion client timeout
    let request_timeout = Duration::from_secs(config.llm.request_timeout_secs + 5);

    api_routes(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(config))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(DefaultBodyLimit::max(config.limits.body_limit_mb * 1024 * 1024)),
    )
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
