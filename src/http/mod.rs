//! HTTP surface for the maintenance service.
//!
//! Exposes the maintenance operations as a small JSON REST API and owns the
//! server lifecycle, including graceful shutdown with a bounded drain window.

pub mod handlers;

use crate::catalog::TargetCatalog;
use crate::config::SHUTDOWN_GRACE_SECS;
use crate::db::{MaintenanceExecutor, PoolRegistry, StatusQuery};
use crate::error::{MaintenanceError, MaintenanceResult};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PoolRegistry>,
    pub catalog: Arc<TargetCatalog>,
    pub executor: Arc<MaintenanceExecutor>,
    pub status: Arc<StatusQuery>,
}

impl AppState {
    pub fn new(registry: Arc<PoolRegistry>, catalog: Arc<TargetCatalog>) -> Self {
        Self {
            registry,
            catalog,
            executor: Arc::new(MaintenanceExecutor::new()),
            status: Arc::new(StatusQuery::new()),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/maintenance/execute",
            axum::routing::post(handlers::execute_maintenance),
        )
        .route(
            "/api/maintenance/status",
            get(handlers::database_status_get).post(handlers::database_status_post),
        )
        .route("/api/maintenance/servers", get(handlers::list_servers))
        .route("/api/health", get(handlers::health))
        .route("/api/info", get(handlers::service_info))
        .fallback(handlers::not_found)
        .with_state(state)
}

impl IntoResponse for MaintenanceError {
    fn into_response(self) -> Response {
        let status = match &self {
            MaintenanceError::NotFound { .. } => StatusCode::NOT_FOUND,
            MaintenanceError::InvalidProfile { .. } | MaintenanceError::InvalidTask { .. } => {
                StatusCode::BAD_REQUEST
            }
            MaintenanceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            MaintenanceError::Connection { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Serve the API until a shutdown signal arrives, then drain connections
/// within a bounded grace period and close every registry pool.
pub async fn serve(state: AppState, addr: SocketAddr) -> MaintenanceResult<()> {
    let registry = state.registry.clone();
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| MaintenanceError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    info!(%addr, "Maintenance service listening");

    let grace = Duration::from_secs(SHUTDOWN_GRACE_SECS);
    let shutdown_notify = Arc::new(tokio::sync::Notify::new());
    let notify = shutdown_notify.clone();

    let shutdown_signal = async move {
        wait_for_signal().await;
        notify.notify_one();
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

    tokio::select! {
        result = server => {
            match result {
                Ok(()) => info!("HTTP server stopped"),
                Err(e) => {
                    error!(error = %e, "HTTP server error");
                    return Err(MaintenanceError::internal(format!("HTTP server error: {}", e)));
                }
            }
        }
        _ = async {
            shutdown_notify.notified().await;
            info!(
                timeout_secs = grace.as_secs(),
                "Waiting for in-flight requests to finish (send signal again to force exit)"
            );
            tokio::select! {
                _ = tokio::time::sleep(grace) => {
                    warn!("Graceful shutdown timeout, forcing exit");
                }
                _ = wait_for_signal() => {
                    warn!("Received second signal, forcing immediate exit");
                }
            }
        } => {}
    }

    info!("Closing database pools");
    registry.shutdown_all().await;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
