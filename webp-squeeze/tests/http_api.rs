//! Integration tests for the JSON API
//!
//! Drives the full router, layers included, with in-memory collaborators.

use axum::{body::Body, Router};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use webp_squeeze::catalog::MemoryLibrary;
use webp_squeeze::config::SqueezeConfig;
use webp_squeeze::handlers;
use webp_squeeze::state::SqueezeState;
use webp_squeeze::store::MemoryStore;

/// Helper to create a test app over `items`
fn test_app(items: &[&str]) -> (MemoryLibrary, MemoryStore, Router) {
    let library = MemoryLibrary::with_items(items.iter().copied());
    let store = MemoryStore::new();
    let state = SqueezeState::new(
        SqueezeConfig::default(),
        Arc::new(store.clone()),
        Arc::new(library.clone()),
        Arc::new(library.clone()),
    );
    (library, store, handlers::router(state))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_create_job_returns_created() {
    let (_library, _store, app) = test_app(&["a.jpg", "b.jpg"]);

    let (status, body) = send(&app, Method::POST, "/jobs", Some(json!({"job_type": "full"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["job"]["total"], 2);
    assert_eq!(body["job"]["status"], "in_progress");
    assert_eq!(body["job"]["job_type"], "full");
}

#[tokio::test]
async fn test_create_job_error_codes() {
    let (library, store, app) = test_app(&["a.jpg"]);

    let (status, body) = send(&app, Method::POST, "/jobs", Some(json!({"type": "partial"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "invalid_job_type");

    let (status, body) = send(&app, Method::POST, "/jobs", Some(json!({"type": "retry"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "no_items_found");
    assert!(store.is_empty());

    let (status, _) = send(&app, Method::POST, "/jobs", Some(json!({"type": "full"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, Method::POST, "/jobs", Some(json!({"type": "full"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "job_already_running");

    store.set_unavailable(true);
    let (status, body) = send(&app, Method::GET, "/jobs/progress", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "store_unavailable");
    assert_eq!(library.calls().len(), 0);
}

#[tokio::test]
async fn test_batch_loop_over_http() {
    let (_library, _store, app) = test_app(&["1", "2", "3", "4", "5"]);
    send(&app, Method::POST, "/jobs", Some(json!({"job_type": "full"}))).await;

    let (status, body) = send(&app, Method::POST, "/jobs/batch?batch_size=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["batch"]["processed"], 2);
    assert_eq!(body["batch"]["remaining"], 3);
    assert_eq!(body["batch"]["status"], "in_progress");

    let (_, body) = send(&app, Method::GET, "/jobs/progress", None).await;
    assert_eq!(body["percent"], 40);
    assert_eq!(body["progress"]["done"], 2);

    send(&app, Method::POST, "/jobs/batch?batch_size=2", None).await;
    let (_, body) = send(&app, Method::POST, "/jobs/batch?batch_size=2", None).await;
    assert_eq!(body["batch"]["status"], "completed");
    assert_eq!(body["batch"]["remaining"], 0);

    // The next request's recovery pass frees the slot.
    let (status, body) = send(&app, Method::POST, "/jobs/batch", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "no_active_job");

    let (status, body) = send(&app, Method::GET, "/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"]["total_entries"], 1);
    assert_eq!(body["history"]["entries"][0]["optimized"], 5);
}

#[tokio::test]
async fn test_cancel_over_http() {
    let (_library, _store, app) = test_app(&["1", "2", "3"]);

    let (status, body) = send(&app, Method::POST, "/jobs/cancel", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "no_active_job");

    send(&app, Method::POST, "/jobs", Some(json!({"job_type": "full"}))).await;
    let (status, body) = send(&app, Method::POST, "/jobs/cancel", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["status"], "cancelled");

    let (status, _) = send(&app, Method::POST, "/jobs/batch", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, Method::GET, "/history?job_type=full", None).await;
    assert_eq!(body["history"]["entries"][0]["outcome"], "cancelled");
}

#[tokio::test]
async fn test_history_filters_and_clear() {
    let (library, _store, app) = test_app(&["a"]);
    library.fail_item("a", "corrupt");
    send(&app, Method::POST, "/jobs", Some(json!({"job_type": "full"}))).await;
    send(&app, Method::POST, "/jobs/batch", None).await;

    library.heal_item("a");
    send(&app, Method::POST, "/jobs", Some(json!({"job_type": "retry"}))).await;
    send(&app, Method::POST, "/jobs/batch", None).await;

    let (_, body) = send(&app, Method::GET, "/history?page=1&page_size=1", None).await;
    assert_eq!(body["history"]["total_entries"], 2);
    assert_eq!(body["history"]["total_pages"], 2);
    assert_eq!(body["history"]["entries"][0]["job_type"], "retry");

    let (_, body) = send(&app, Method::GET, "/history?job_type=full", None).await;
    assert_eq!(body["history"]["total_entries"], 1);
    assert_eq!(body["history"]["entries"][0]["failed"], 1);

    let (status, body) = send(&app, Method::GET, "/history?job_type=weekly", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_job_type");

    let (status, _) = send(&app, Method::DELETE, "/history", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, Method::GET, "/history", None).await;
    assert_eq!(body["history"]["total_entries"], 0);
}

#[tokio::test]
async fn test_dashboard_stats() {
    let (library, _store, app) = test_app(&["a", "b", "c"]);
    library.set_saving("a", 3 * 1024 * 1024);
    library.fail_item("c", "corrupt");

    let (status, body) = send(&app, Method::GET, "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total_items"], 3);
    assert_eq!(body["stats"]["unoptimized_items"], 3);
    assert!(body["stats"]["active_job"].is_null());

    send(&app, Method::POST, "/jobs", Some(json!({"job_type": "full"}))).await;
    send(&app, Method::POST, "/jobs/batch?batch_size=50", None).await;

    let (_, body) = send(&app, Method::GET, "/stats", None).await;
    assert_eq!(body["stats"]["optimized_items"], 2);
    assert_eq!(body["stats"]["failed_items"], 1);
    assert_eq!(body["stats"]["total_saved"], "3.00 MB");
    assert!(body["stats"]["active_job"].is_null());
}
