//! Application assembly: state construction and router composition.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::ServerConfig;
use crate::domain::EventBus;
use crate::error::ServerError;
use crate::persistence::SessionStore;
use crate::service::SessionService;
use crate::ws::handler::{monitor_handler, trials_handler};

/// Builds the domain, persistence and service layers for `config`.
///
/// # Errors
///
/// Returns [`ServerError::Config`] for an unusable trial route and
/// [`ServerError::Io`] if the save directory cannot be created.
pub async fn build_state(config: ServerConfig) -> Result<AppState, ServerError> {
    config.validate()?;

    // Build persistence + domain layer
    let store = SessionStore::open(&config.save_dir).await?;
    let event_bus = EventBus::new(config.event_bus_capacity);

    // Build service layer
    let session_service = Arc::new(SessionService::new(store, event_bus.clone()));

    Ok(AppState {
        session_service,
        event_bus,
        config: Arc::new(config),
    })
}

/// Builds the full router: HTTP endpoints, the trial route and `/monitor`.
pub fn build_app(state: AppState) -> Router {
    let ws_route = state.config.ws_route.clone();

    Router::new()
        .merge(api::build_router())
        .route(&ws_route, get(trials_handler))
        .route("/monitor", get(monitor_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
