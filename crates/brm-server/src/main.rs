//! BRM - Bounce and throughput rule manager entry point

use anyhow::Result;
use brm_api::{create_router, AppState, Metrics};
use brm_common::config::{Config, LoggingConfig};
use brm_storage::DatabasePool;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting BRM rule manager...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    let metrics = if config.metrics.enabled {
        Some(Arc::new(Metrics::new()?))
    } else {
        info!("Metrics disabled");
        None
    };

    let app = create_router(AppState::new(db_pool.clone(), metrics));

    let addr = config.server.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Starting API server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db_pool.close().await;
    info!("BRM shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_level(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
