//! Server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ServerError;

/// Default WebSocket route for trial streaming clients.
pub const DEFAULT_WS_ROUTE: &str = "/trials";

/// Top-level server configuration.
///
/// Loaded once at startup via [`ServerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind the HTTP server to (e.g. `127.0.0.1:8765`).
    pub listen_addr: SocketAddr,

    /// Path of the trial streaming WebSocket endpoint.
    pub ws_route: String,

    /// Directory receiving `control_events.jsonl`, `array_headers.jsonl`
    /// and one subdirectory of `.npy` files per array name.
    pub save_dir: PathBuf,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Largest WebSocket message accepted from a client, in bytes.
    pub ws_max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8765)),
            ws_route: DEFAULT_WS_ROUTE.to_string(),
            save_dir: PathBuf::from("./session_data"),
            event_bus_capacity: 1024,
            ws_max_message_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to the [`Default`] values when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if `LISTEN_ADDR` cannot be parsed as
    /// a [`SocketAddr`] or `WS_ROUTE` fails [`ServerConfig::validate`].
    pub fn from_env() -> Result<Self, ServerError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| ServerError::Config(format!("LISTEN_ADDR={raw}: {e}")))?,
            Err(_) => defaults.listen_addr,
        };

        let ws_route = std::env::var("WS_ROUTE").unwrap_or(defaults.ws_route);

        let save_dir = std::env::var("SAVE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.save_dir);

        let event_bus_capacity = parse_env("EVENT_BUS_CAPACITY", defaults.event_bus_capacity);
        let ws_max_message_bytes =
            parse_env("WS_MAX_MESSAGE_BYTES", defaults.ws_max_message_bytes);

        let config = Self {
            listen_addr,
            ws_route,
            save_dir,
            event_bus_capacity: event_bus_capacity.max(1),
            ws_max_message_bytes,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks values that can only be wrong when set by hand.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if `ws_route` is not an absolute
    /// path, contains path parameters or collides with a fixed route.
    pub fn validate(&self) -> Result<(), ServerError> {
        validate_route(&self.ws_route)
    }
}

/// Route paths must be absolute and must not collide with the fixed routes.
fn validate_route(route: &str) -> Result<(), ServerError> {
    if !route.starts_with('/') || route.len() < 2 {
        return Err(ServerError::Config(format!(
            "WS_ROUTE must start with '/' and name a path, got {route:?}"
        )));
    }
    if route.contains(['{', '}', '*']) {
        return Err(ServerError::Config(format!(
            "WS_ROUTE {route:?} must not contain path parameters"
        )));
    }
    if matches!(route, "/health" | "/monitor") || is_docs_route(route) {
        return Err(ServerError::Config(format!(
            "WS_ROUTE {route:?} is reserved"
        )));
    }
    Ok(())
}

/// Paths owned by the Swagger UI router.
#[cfg(feature = "swagger-ui")]
fn is_docs_route(route: &str) -> bool {
    route == "/swagger-ui" || route.starts_with("/swagger-ui/") || route == "/api-docs/openapi.json"
}

#[cfg(not(feature = "swagger-ui"))]
fn is_docs_route(_route: &str) -> bool {
    false
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
