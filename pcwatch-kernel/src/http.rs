/**
 * PCWATCH HTTP API - dashboard backend
 *
 * ROLE:
 * Exposes the monitor's status/history documents, the advisory intervals
 * from the config, and the RDP restart action.
 *
 * ROUTES:
 * - GET  /api/status       passthrough of status.json, 404 when absent
 * - GET  /api/history      passthrough of history.json, empty history when absent
 * - GET  /api/config       refresh/monitoring intervals
 * - POST /api/restart-rdp  {computerName} -> restart via the remediation gateway
 *
 * Handlers share nothing mutable: config is an immutable Arc, the store
 * re-reads disk on every call, each restart owns its own child process.
 * No authentication: anyone reaching the port can trigger a restart.
 */

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;
use time::UtcOffset;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::DashboardConfig;
use crate::error::{handle_panic, ApiError};
use crate::models::{ConfigView, EmptyHistory, RestartRequest, RestartResponse};
use crate::remediation::{FailureCause, RemediationGateway, RemediationResult};
use crate::store::StateStore;

#[derive(Clone)]
pub struct AppState {
    /// `None` only when the API runs without a loaded config; `/api/config` then answers 404.
    pub config: Option<Arc<DashboardConfig>>,
    pub store: StateStore,
    pub gateway: RemediationGateway,
    /// Offset for timestamps the API synthesizes itself.
    pub utc_offset: UtcOffset,
}

pub fn build_router(app_state: AppState) -> Router {
    let api = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/history", get(get_history))
        .route("/api/config", get(get_config))
        .route("/api/restart-rdp", post(restart_rdp))
        .with_state(app_state);
    with_middleware(api)
}

/// JSON fallbacks, panic recovery and request tracing around `routes`.
fn with_middleware(routes: Router) -> Router {
    routes
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

// GET /api/status
async fn get_status(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    app.store.read_status().await.map(Json).ok_or(ApiError::StatusUnavailable)
}

// GET /api/history (never fails, "no history yet" is a normal state)
async fn get_history(State(app): State<AppState>) -> Json<Value> {
    match app.store.read_history().await {
        Some(history) => Json(history),
        None => Json(serde_json::to_value(EmptyHistory::now(app.utc_offset)).unwrap_or_default()),
    }
}

// GET /api/config
async fn get_config(State(app): State<AppState>) -> Result<Json<ConfigView>, ApiError> {
    let cfg = app.config.as_deref().ok_or(ApiError::ConfigUnavailable)?;
    Ok(Json(ConfigView {
        refresh_interval: cfg.dashboard_settings.refresh_interval_seconds,
        monitoring_interval: cfg.monitoring_interval,
    }))
}

// POST /api/restart-rdp
async fn restart_rdp(
    State(app): State<AppState>,
    payload: Result<Json<RestartRequest>, JsonRejection>,
) -> Result<Json<RestartResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected restart request body");
        ApiError::InvalidRestart("Request body must be a JSON object with a computerName field".into())
    })?;

    let computer_name = req.computer_name.unwrap_or_default();
    let name = computer_name.trim();

    match app.gateway.restart(name).await {
        RemediationResult::Succeeded { output } => Ok(Json(RestartResponse {
            success: true,
            message: format!("RDP service restart initiated on {name}"),
            output: Some(output),
            error: None,
        })),
        RemediationResult::InvalidRequest { .. } => {
            Err(ApiError::InvalidRestart("Computer name is required".into()))
        }
        RemediationResult::Failed { cause: FailureCause::Launch, diagnostics } => {
            Err(ApiError::RemediationFailed {
                message: format!("Failed to launch remediation command for {name}"),
                error: diagnostics,
            })
        }
        RemediationResult::Failed { diagnostics, .. } => Err(ApiError::RemediationFailed {
            message: format!("Failed to restart RDP service on {name}"),
            error: diagnostics,
        }),
        RemediationResult::TimedOut { after } => Err(ApiError::RemediationFailed {
            message: format!("Operation timed out ({} seconds)", after.as_secs()),
            error: "timed out".into(),
        }),
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn explode() -> StatusCode {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_json_500() {
        let app = with_middleware(Router::new().route("/explode", get(explode)));

        let response = app
            .oneshot(Request::builder().uri("/explode").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Internal server error"}));
    }
}
