use anyhow::{Context, Result};
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tujali_server::{build_app, logging, spawn_session_sweeper, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    logging::init(&config.logging);

    if let Some(parent) = config.database.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory {}", parent.display()))?;
    }
    let state = AppState::open(&config).context("failed to initialize application state")?;

    spawn_session_sweeper(state.clone(), Duration::from_secs(config.server.sweep_interval_secs.max(1)));
    let app = build_app(state);

    let addr = config.listen_addr().context("invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;
    info!(%addr, "Tujali Health listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
