//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::domain::EventBus;
use crate::service::SessionService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session service for all trial frame handling.
    pub session_service: Arc<SessionService>,
    /// Event bus for monitor subscriptions.
    pub event_bus: EventBus,
    /// Configuration the server was started with.
    pub config: Arc<ServerConfig>,
}
