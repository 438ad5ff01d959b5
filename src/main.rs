//! loggamera-bridge - Loggamera telemetry polling bridge
//!
//! Polls organizations, devices and per-device measurements from the
//! Loggamera platform API for each configured account and serves the
//! merged snapshots over HTTP.

mod accounts;
mod api;
mod config;
mod coordinator;
mod error;
mod loggamera;
mod models;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::accounts::AccountManager;
use crate::api::AppState;
use crate::coordinator::WorkerPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loggamera_bridge=info,tower_http=debug".into()),
        )
        .init();

    tracing::info!(
        "Loggamera bridge v{} starting up",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = config::Config::load()?;
    tracing::info!(
        "Configuration loaded ({} accounts, {} workers)",
        config.accounts.len(),
        config.workers
    );

    if config.accounts.is_empty() {
        tracing::warn!("No accounts configured; serving an empty account list");
    }

    let pool = WorkerPool::new(config.workers);
    let account_manager = Arc::new(AccountManager::new(pool));

    // Accounts become available as their setup succeeds
    let retry_delay = Duration::from_secs(config.setup_retry_secs);
    for account in config.accounts {
        let manager = account_manager.clone();
        tokio::spawn(async move {
            manager.setup_until_ready(account, retry_delay).await;
        });
    }

    let state = AppState::new(account_manager.clone());

    let app = api::routes().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight cycles finish before exit
    account_manager.unload_all().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
