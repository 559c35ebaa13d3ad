//! DB Maintenance Service - Main entry point.
//!
//! Runs maintenance routines against SQL database targets over a small JSON
//! REST API, pooling one connection pool per distinct target.

use clap::Parser;
use db_maintenance_service::catalog::TargetCatalog;
use db_maintenance_service::config::Config;
use db_maintenance_service::db::{PoolRegistry, SqlxConnector};
use db_maintenance_service::http::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_tracing(&config);

    config.validate()?;

    let catalog = match &config.catalog {
        Some(path) => TargetCatalog::load(path)?,
        None => {
            info!("No catalog configured, only inline target profiles will be accepted");
            TargetCatalog::empty()
        }
    };

    info!(
        registered_targets = catalog.len(),
        "Starting DB Maintenance Service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let connector = Arc::new(SqlxConnector::new(config.pool_settings()));
    let registry = PoolRegistry::new(connector);

    let state = AppState::new(registry, Arc::new(catalog));

    let addr: SocketAddr = config.http_bind_addr().parse()?;
    http::serve(state, addr).await?;

    info!("Shutdown complete");
    Ok(())
}
