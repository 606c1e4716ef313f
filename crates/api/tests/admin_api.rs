//! Admin API tests over the in-memory sync store.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, build_test_app, build_test_app_with, get, post_json, put_json, send};
use yachtsync_core::status::SyncState;

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_operator_key_is_rejected() {
    let app = build_test_app();
    let response = send(&app.router, Method::GET, "/api/v1/sync/badge", None, None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn wrong_operator_key_is_rejected() {
    let app = build_test_app();
    let response = send(
        &app.router,
        Method::POST,
        "/api/v1/sync/run",
        Some("guess"),
        Some(serde_json::json!({"content_type": "new"})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.dispatcher.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unconfigured_operator_key_rejects_everything() {
    let app = build_test_app_with(common::unreachable_pool(), None);
    let response = get(&app.router, "/api/v1/sync/badge").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_degraded_without_database() {
    let app = build_test_app();
    let response = send(&app.router, Method::GET, "/health", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["db_healthy"], false);
    assert!(json["version"].is_string());
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn site_run_dispatches_and_marks_synced() {
    let app = build_test_app();
    let response = post_json(
        &app.router,
        "/api/v1/sync/sites/1/run",
        serde_json::json!({"content_type": "new"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["site_id"], 1);
    assert_eq!(json["data"]["imported"], 2);
    assert_eq!(json["data"]["success"], true);
    assert!(json["data"]["error_summary"].is_null());

    assert_eq!(app.store.status(1, 10).state, SyncState::Synced);
    assert_eq!(app.store.status(1, 11).state, SyncState::Synced);
    // The other site is untouched.
    assert_eq!(app.store.status(2, 10).state, SyncState::Pending);
    assert!(app.store.last_result(1).is_some());
}

#[tokio::test]
async fn second_run_sends_nothing_unless_forced() {
    let app = build_test_app();
    let body = serde_json::json!({"content_type": "new"});
    post_json(&app.router, "/api/v1/sync/sites/1/run", body.clone()).await;

    let again = body_json(post_json(&app.router, "/api/v1/sync/sites/1/run", body).await).await;
    assert_eq!(again["data"]["imported"], 0);

    let forced = body_json(
        post_json(
            &app.router,
            "/api/v1/sync/sites/1/run",
            serde_json::json!({"content_type": "new", "force": true}),
        )
        .await,
    )
    .await;
    assert_eq!(forced["data"]["imported"], 2);
    assert_eq!(app.dispatcher.sent.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn inactive_site_run_is_a_conflict() {
    let app = build_test_app();
    let response = post_json(
        &app.router,
        "/api/v1/sync/sites/3/run",
        serde_json::json!({"content_type": "new"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn unknown_site_run_is_not_found() {
    let app = build_test_app();
    let response = post_json(
        &app.router,
        "/api/v1/sync/sites/99/run",
        serde_json::json!({"content_type": "new"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_content_type_is_a_validation_error() {
    let app = build_test_app();
    let response = post_json(
        &app.router,
        "/api/v1/sync/run",
        serde_json::json!({"content_type": "boats"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn run_all_covers_active_sites_in_order() {
    let app = build_test_app();
    let response = post_json(
        &app.router,
        "/api/v1/sync/run",
        serde_json::json!({"content_type": "new"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let reports = json["data"].as_array().unwrap();
    let site_ids: Vec<i64> = reports
        .iter()
        .map(|r| r["site_id"].as_i64().unwrap())
        .collect();
    assert_eq!(site_ids, vec![1, 2]);
    assert_eq!(app.store.status(3, 10).state, SyncState::Pending);
}

// ---------------------------------------------------------------------------
// Badge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn badge_clears_once_every_active_site_is_synced() {
    let app = build_test_app();

    let before = body_json(get(&app.router, "/api/v1/sync/badge").await).await;
    assert_eq!(before["data"]["has_pending"], true);
    assert_eq!(before["data"]["label"], "Needs Sync");

    post_json(
        &app.router,
        "/api/v1/sync/run",
        serde_json::json!({"content_type": "new"}),
    )
    .await;

    let after = body_json(get(&app.router, "/api/v1/sync/badge").await).await;
    assert_eq!(after["data"]["has_pending"], false);
    assert_eq!(after["data"]["label"], "Synced");
}

// ---------------------------------------------------------------------------
// Input validation (rejected before touching the database)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_site_rejects_invalid_url() {
    let app = build_test_app();
    let response = post_json(
        &app.router,
        "/api/v1/sync/sites",
        serde_json::json!({
            "name": "Adria",
            "url": "not a url",
            "default_language": "en",
            "supported_languages": ["en"],
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn restrictions_reject_repeated_brand() {
    let app = build_test_app();
    let response = put_json(
        &app.router,
        "/api/v1/sync/sites/1/restrictions",
        serde_json::json!({
            "restrictions": [
                {"brand_id": 5, "allowed": true},
                {"brand_id": 5, "allowed": false},
            ]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}
