//! Admin HTTP API.
//!
//! `GET /health` is public. `GET /admin/status` and `POST /admin/check`
//! require `Authorization: Bearer <admin token>`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::service::{AdminService, CheckOutcome, CheckSummary, StatusReport};
use crate::config::AdminConfig;
use crate::error::{RelayError, Result};

/// Shared state of the admin API.
pub struct AdminState {
    pub service: Arc<AdminService>,
    token: String,
}

impl AdminState {
    /// Create the state with the token callers must present.
    pub fn new(service: Arc<AdminService>, token: impl Into<String>) -> Self {
        Self {
            service,
            token: token.into(),
        }
    }

    fn accepts(&self, presented: &str) -> bool {
        !self.token.is_empty() && constant_time_eq(self.token.as_bytes(), presented.as_bytes())
    }
}

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    Conflict,
    InternalError,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: ErrorCode,
    message: String,
}

/// Error returned by admin handlers.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.code.status_code(), Json(body)).into_response()
    }
}

/// Create the admin router.
pub fn create_router(state: Arc<AdminState>) -> Router {
    let protected = Router::new()
        .route("/admin/status", get(status))
        .route("/admin/check", post(check))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_admin_token,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Resolve the listen address from configuration.
pub fn bind_address(config: &AdminConfig) -> Result<SocketAddr> {
    format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| RelayError::Config(format!("invalid admin address: {}", e)))
}

/// Serve the admin API on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, state: Arc<AdminState>) -> std::io::Result<()> {
    let local_addr = listener.local_addr()?;
    tracing::info!("Admin API listening on http://{}", local_addr);
    axum::serve(listener, create_router(state)).await
}

async fn require_admin_token(
    State(state): State<Arc<AdminState>>,
    request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

    if !state.accepts(presented) {
        tracing::debug!("Rejected admin request with invalid token");
        return Err(ApiError::unauthorized("Invalid token"));
    }

    Ok(next.run(request).await)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn status(State(state): State<Arc<AdminState>>) -> Json<StatusReport> {
    Json(state.service.status())
}

async fn check(
    State(state): State<Arc<AdminState>>,
) -> std::result::Result<Json<CheckSummary>, ApiError> {
    match state.service.check().await {
        CheckOutcome::Completed(summary) => Ok(Json(summary)),
        CheckOutcome::Busy => Err(ApiError::conflict(RelayError::CycleInProgress.to_string())),
        CheckOutcome::Failed => Err(ApiError::internal("Manual check failed, see the logs")),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
