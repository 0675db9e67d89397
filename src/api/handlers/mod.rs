//! REST endpoint handlers.

pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all HTTP routes.
pub fn routes() -> Router<AppState> {
    Router::new().merge(system::routes())
}
