//! Imprint Server - REST API for image misuse detection
//!
//! Exposes the imprint-core analysis pipeline via HTTP endpoints:
//! - POST /analyze - Fingerprint, search and classify an uploaded image
//! - GET/DELETE /fingerprints - Fingerprint store administration
//! - GET /docs - Swagger UI

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use imprint_core::SqliteFingerprintStore;
use imprint_server::{create_router_with_config, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let store =
        SqliteFingerprintStore::connect(&config.database_url, config.database_max_connections)
            .await
            .with_context(|| {
                format!("Failed to open fingerprint store at {}", config.database_url)
            })?;
    tracing::info!(database = %config.database_url, "Fingerprint store ready");

    let state = AppState::from_config(&config, Arc::new(store))?;
    let app = create_router_with_config(state, &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Imprint server listening on http://{}", addr);
    tracing::info!("API docs available at http://{}/docs", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
