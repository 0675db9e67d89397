//! ebdm-trial-server entry point.
//!
//! Serves the trial WebSocket route, `/monitor` and the status endpoints.

use tracing_subscriber::EnvFilter;

use ebdm_trial_server::config::ServerConfig;
use ebdm_trial_server::server::{build_app, build_state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;
    tracing::info!(
        addr = %config.listen_addr,
        route = %config.ws_route,
        save_dir = %config.save_dir.display(),
        "starting ebdm-trial-server"
    );

    let listen_addr = config.listen_addr;
    let state = build_state(config).await?;
    let save_dir = state.session_service.store().absolute_root().await?;
    tracing::info!(save_dir = %save_dir.display(), "saving session data");
    let app = build_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
