//! Request handlers for the maintenance API.

use crate::http::AppState;
use crate::models::{MaintenanceTask, TargetSelector};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Body of `POST /api/maintenance/execute`. Target fields are inline; an
/// absent `tasks` list runs the default maintenance sequence.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    #[serde(flatten)]
    pub target: TargetSelector,
    pub tasks: Option<Vec<String>>,
}

/// `POST /api/maintenance/execute`
///
/// Resolves the target, runs the task batch, and returns the execution
/// record. A failed execution is still a well-formed record, reported with
/// status 500 and `success: false`.
pub async fn execute_maintenance(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Response {
    let profile = match state.catalog.resolve(&req.target) {
        Ok(profile) => profile,
        Err(e) => return e.into_response(),
    };
    let tasks = match MaintenanceTask::parse_sequence(req.tasks.as_deref()) {
        Ok(tasks) => tasks,
        Err(e) => return e.into_response(),
    };

    info!(
        host = %profile.host,
        database = %profile.database,
        task_count = tasks.len(),
        "Maintenance execution requested"
    );

    let record = state.executor.run(&state.registry, &profile, &tasks).await;
    let code = if record.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, Json(record)).into_response()
}

/// `GET /api/maintenance/status` with the target selector in the query
/// string.
pub async fn database_status_get(
    State(state): State<AppState>,
    Query(selector): Query<TargetSelector>,
) -> Response {
    database_status(state, selector).await
}

/// `POST /api/maintenance/status` with the target selector in the body.
pub async fn database_status_post(
    State(state): State<AppState>,
    Json(selector): Json<TargetSelector>,
) -> Response {
    database_status(state, selector).await
}

async fn database_status(state: AppState, selector: TargetSelector) -> Response {
    let profile = match state.catalog.resolve(&selector) {
        Ok(profile) => profile,
        Err(e) => return e.into_response(),
    };
    match state.status.report(&state.registry, &profile).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /api/maintenance/servers`: the registered-target catalog without
/// credentials.
pub async fn list_servers(State(state): State<AppState>) -> Response {
    Json(json!({
        "success": true,
        "count": state.catalog.len(),
        "servers": state.catalog.summaries(),
    }))
    .into_response()
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "activePools": state.registry.pool_count(),
    }))
    .into_response()
}

/// `GET /api/info`
pub async fn service_info() -> Response {
    Json(json!({
        "service": "db-maintenance-service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "execute": "POST /api/maintenance/execute",
            "status": "GET|POST /api/maintenance/status",
            "servers": "GET /api/maintenance/servers",
            "health": "GET /api/health",
            "info": "GET /api/info",
        },
    }))
    .into_response()
}

/// Fallback for unknown routes.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Endpoint not found",
        })),
    )
        .into_response()
}
