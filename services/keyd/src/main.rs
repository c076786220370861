//! keyd — API key pool authority
//!
//! Single-binary service that owns a pool of interchangeable API keys for an
//! external rate-limited service. Callers lease the current usable key over
//! HTTP, report the outcome of each call, and the authority rotates, cools
//! down, and deactivates keys based on those reports.

mod config;
mod events;
mod metrics;
mod service;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use key_authority::{AuthorityConfig, KeyAuthority, SystemClock};
use keystore::FileStore;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::events::ObservedSink;
use crate::service::{AppState, build_router};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting keyd");

    // Install the Prometheus recorder before any metrics are emitted
    let prometheus = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        store_path = %config.keys.store_path.display(),
        cooldown_secs = config.keys.cooldown_secs,
        max_failures = config.keys.max_failures,
        admin_auth = config.server.admin_token.is_some(),
        "configuration loaded"
    );

    let store = FileStore::load(config.keys.store_path.clone())
        .await
        .context("failed to load key store")?;

    let authority = Arc::new(KeyAuthority::new(
        Arc::new(store),
        Arc::new(ObservedSink::new()),
        Arc::new(SystemClock),
        AuthorityConfig {
            cooldown: Duration::from_secs(config.keys.cooldown_secs),
            max_failures: config.keys.max_failures,
        },
    ));

    let state = AppState {
        authority,
        admin_token: config.server.admin_token.map(Arc::new),
        prometheus,
    };

    let app = build_router(state);

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;

    info!(addr = %config.server.listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
