//! System endpoints: status document and health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::error::ServerError;

/// Status document returned by `GET /`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RootResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Path of the trial streaming WebSocket endpoint.
    pub route: String,
    /// Absolute path of the save directory.
    pub save_dir: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `true` while the server answers.
    pub ok: bool,
}

/// `GET /` — Server status and where data is saved.
///
/// # Errors
///
/// Returns [`ServerError::Io`] if the save directory has disappeared.
#[utoipa::path(
    get,
    path = "/",
    tag = "System",
    summary = "Server status",
    description = "Returns the trial WebSocket route and the absolute save directory.",
    responses(
        (status = 200, description = "Server is running", body = RootResponse),
        (status = 500, description = "Save directory unavailable"),
    )
)]
pub async fn root_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
    let save_dir = state.session_service.store().absolute_root().await?;
    Ok((
        StatusCode::OK,
        Json(RootResponse {
            status: "ok".to_string(),
            route: state.config.ws_route.clone(),
            save_dir: save_dir.display().to_string(),
        }),
    ))
}

/// `GET /health` — Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns `{\"ok\": true}` while the server is up.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { ok: true }))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}
