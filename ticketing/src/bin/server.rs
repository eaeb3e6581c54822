//! Ticketing System Server
//!
//! Main server process that runs the ticketing application.
//!
//! This binary:
//! - Loads configuration from the environment (and `.env`)
//! - Connects to `PostgreSQL` and applies migrations
//! - Installs the Prometheus recorder and serves `/metrics`
//! - Starts background maintenance (cooldown purge, transfer expiry)
//! - Serves the HTTP API until Ctrl+C
//!
//! # Usage
//!
//! ```bash
//! # Start PostgreSQL
//! docker compose up -d
//!
//! # Run server
//! cargo run --bin server
//! ```

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use ticketing::metrics::register_business_metrics;
use ticketing::server::{AppState, build_metrics_router, build_router};
use ticketing::{Config, TicketingApp};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnstile_runtime::metrics::MetricsServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticketing=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🎫 Starting Ticketing System Server...");

    // Load configuration
    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(
        bind = %config.bind_address(),
        metrics = %config.metrics_address(),
        service_fee_bps = config.inventory.service_fee_bps,
        cooldown_ms = config.entry.cooldown_ms,
        "Configuration loaded"
    );

    // Metrics
    let metrics_addr: SocketAddr = config
        .metrics_address()
        .parse()
        .context("invalid metrics address")?;
    let mut metrics_server = MetricsServer::new(metrics_addr);
    metrics_server.start().context("failed to install metrics recorder")?;
    register_business_metrics();

    // Application
    let app = TicketingApp::connect(config.clone())
        .await
        .context("failed to initialize application")?;
    tracing::info!("✓ Application initialized");

    let maintenance = app.start();

    let state = AppState::new(app).with_metrics(Arc::new(metrics_server));

    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("failed to bind {metrics_addr}"))?;
    let metrics_router = build_metrics_router(state.clone());
    tokio::spawn(async move {
        if let Err(error) = axum::serve(metrics_listener, metrics_router).await {
            tracing::error!(error = %error, "Metrics server stopped");
        }
    });

    let bind = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!("🎫 Ticketing System Server is running!");
    tracing::info!("  - API: http://{bind}/api");
    tracing::info!("  - Metrics: http://{metrics_addr}/metrics");
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    for task in maintenance {
        task.abort();
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for shutdown signal");
    }
}
