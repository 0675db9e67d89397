//! Axum WebSocket upgrade handlers.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::{run_monitor_connection, run_trial_connection};
use crate::app_state::AppState;

/// `GET {WS_ROUTE}` — Upgrade a trial streaming client to WebSocket.
pub async fn trials_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let service = std::sync::Arc::clone(&state.session_service);

    // Clients send each array as a single frame.
    let limit = state.config.ws_max_message_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| run_trial_connection(socket, service))
}

/// `GET /monitor` — Upgrade an observer to WebSocket.
pub async fn monitor_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let event_rx = state.event_bus.subscribe();

    ws.on_upgrade(move |socket| run_monitor_connection(socket, event_rx))
}
