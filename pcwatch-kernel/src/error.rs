//! HTTP error boundary
//!
//! Every failure leaving a handler goes through [`ApiError`], so clients
//! always get a JSON body, never an empty or HTML page.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::any::Any;

use crate::models::RestartResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("status data not available")]
    StatusUnavailable,
    #[error("configuration not available")]
    ConfigUnavailable,
    /// Caller error on the restart endpoint.
    #[error("invalid restart request: {0}")]
    InvalidRestart(String),
    /// The restart ran (or tried to) and did not succeed.
    #[error("{message}: {error}")]
    RemediationFailed { message: String, error: String },
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::StatusUnavailable => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "Status data not available",
                    "message": "Monitoring script may not have run yet",
                })),
            )
                .into_response(),
            ApiError::ConfigUnavailable => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Configuration not available" })),
            )
                .into_response(),
            ApiError::InvalidRestart(message) => (
                StatusCode::BAD_REQUEST,
                Json(RestartResponse { success: false, message, output: None, error: None }),
            )
                .into_response(),
            ApiError::RemediationFailed { message, error } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RestartResponse { success: false, message, output: None, error: Some(error) }),
            )
                .into_response(),
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
            }
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({ "error": "Method not allowed" })),
            )
                .into_response(),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response(),
        }
    }
}

/// Panic handler for `CatchPanicLayer`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");
    ApiError::Internal.into_response()
}
