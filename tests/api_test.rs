//! Integration tests for the HTTP API.
//!
//! Exercises request validation, catalog lookup, and the informational
//! endpoints through the router with `tower::ServiceExt::oneshot`. No
//! database server is involved; paths that would connect are covered by the
//! registry tests.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use db_maintenance_service::catalog::{RegisteredTarget, TargetCatalog};
use db_maintenance_service::config::PoolSettings;
use db_maintenance_service::db::{PoolRegistry, SqlxConnector};
use db_maintenance_service::http::{AppState, router};
use db_maintenance_service::models::DatabaseEngine;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn sample_target(id: u32) -> RegisteredTarget {
    RegisteredTarget {
        id,
        name: format!("Server RP{:03}", 200 + id),
        engine: DatabaseEngine::MySql,
        host: format!("192.168.25.{}", 9 + id),
        port: 1433,
        username: "maint".to_string(),
        password: "secret".to_string(),
        database: format!("RP{:03}", 200 + id),
        trust_certificate: false,
        encrypt: false,
        timeout_ms: 900_000,
    }
}

fn test_app(targets: Vec<RegisteredTarget>) -> axum::Router {
    let connector = Arc::new(SqlxConnector::new(PoolSettings::default()));
    let registry = PoolRegistry::new(connector);
    let state = AppState::new(registry, Arc::new(TargetCatalog::new(targets)));
    router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app(vec![]);
    let response = app
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["activePools"], 0);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_info_endpoint_lists_routes() {
    let app = test_app(vec![]);
    let response = app
        .oneshot(Request::get("/api/info").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["service"], "db-maintenance-service");
    assert!(body["endpoints"]["execute"].as_str().unwrap().contains("execute"));
}

#[tokio::test]
async fn test_servers_endpoint_hides_credentials() {
    let app = test_app(vec![sample_target(1), sample_target(2)]);
    let response = app
        .oneshot(
            Request::get("/api/maintenance/servers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    let servers = body["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0]["host"], "192.168.25.10");
    assert!(servers[0].get("password").is_none());
    assert!(servers[0].get("username").is_none());
}

#[tokio::test]
async fn test_execute_unknown_registered_id_is_not_found() {
    let app = test_app(vec![sample_target(1)]);
    let response = app
        .oneshot(post_json(
            "/api/maintenance/execute",
            json!({ "registeredId": 999 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn test_execute_rejects_unknown_task_name() {
    let app = test_app(vec![sample_target(1)]);
    let response = app
        .oneshot(post_json(
            "/api/maintenance/execute",
            json!({
                "registeredId": 1,
                "tasks": ["index-maintenance", "drop-all-tables"],
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("drop-all-tables"));
}

#[tokio::test]
async fn test_execute_rejects_empty_task_list() {
    let app = test_app(vec![sample_target(1)]);
    let response = app
        .oneshot(post_json(
            "/api/maintenance/execute",
            json!({ "registeredId": 1, "tasks": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_execute_rejects_incomplete_inline_profile() {
    let app = test_app(vec![]);
    // Host given but no credentials or database.
    let response = app
        .oneshot(post_json(
            "/api/maintenance/execute",
            json!({ "host": "10.0.0.5" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_execute_rejects_invalid_database_name() {
    let app = test_app(vec![]);
    let response = app
        .oneshot(post_json(
            "/api/maintenance/execute",
            json!({
                "host": "10.0.0.5",
                "username": "maint",
                "password": "secret",
                "database": "orders; DROP TABLE users",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_status_unknown_registered_id_is_not_found() {
    let app = test_app(vec![sample_target(1)]);
    let response = app
        .oneshot(
            Request::get("/api/maintenance/status?registeredId=42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unknown_route_returns_json_not_found() {
    let app = test_app(vec![]);
    let response = app
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Endpoint not found");
}
