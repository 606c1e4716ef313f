//! Shared fixtures for admin API tests: an in-memory sync store, a
//! dispatcher that accepts everything, and request helpers.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use yachtsync_api::config::ServerConfig;
use yachtsync_api::router::build_app_router;
use yachtsync_api::state::AppState;
use yachtsync_core::language::{LanguageCode, LanguageMap};
use yachtsync_core::media::PublicMediaUrls;
use yachtsync_core::record::{ContentKind, ContentRecord, RecordState};
use yachtsync_core::site::{AuthScheme, SyncSite};
use yachtsync_core::snapshot::SyncEnvelope;
use yachtsync_core::types::DbId;
use yachtsync_dispatch::{DispatchResult, Dispatcher};
use yachtsync_sync::{MemorySyncStore, Orchestrator, SyncConfig};

pub const ADMIN_KEY: &str = "operator-secret";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(admin_key: Option<&str>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 1,
        admin_key: admin_key.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Accepts every envelope and remembers `(site_id, slug)`.
#[derive(Default)]
pub struct AcceptingDispatcher {
    pub sent: Mutex<Vec<(DbId, String)>>,
}

#[async_trait]
impl Dispatcher for AcceptingDispatcher {
    async fn send(&self, site: &SyncSite, envelope: &SyncEnvelope) -> DispatchResult {
        self.sent
            .lock()
            .unwrap()
            .push((site.id, envelope.data.slug.clone()));
        DispatchResult {
            success: true,
            status_code: Some(200),
            body: Some(r#"{"success": true, "warnings": []}"#.into()),
            error: None,
        }
    }
}

pub fn lang(code: &str) -> LanguageCode {
    LanguageCode::parse(code).unwrap()
}

pub fn site(id: DbId, name: &str, is_active: bool) -> SyncSite {
    SyncSite {
        id,
        name: name.to_string(),
        url: format!("https://{}.example", name.to_lowercase()),
        api_key: Some("site-key".into()),
        auth_scheme: AuthScheme::ApiKeyHeader,
        is_active,
        default_language: lang("en"),
        supported_languages: vec![lang("en"), lang("sl")],
        sync_all_brands: true,
        brand_restrictions: Vec::new(),
        sort_order: id as i32,
        last_synced_at: None,
        last_sync_result: None,
    }
}

pub fn record(id: DbId, slug: &str) -> ContentRecord {
    let title: LanguageMap<String> = [(lang("en"), format!("Yacht {slug}"))].into_iter().collect();
    ContentRecord {
        id,
        source_id: uuid::Uuid::now_v7(),
        kind: ContentKind::New,
        slug: slug.to_string(),
        state: RecordState::Published,
        title,
        content: LanguageMap::new(),
        excerpt: LanguageMap::new(),
        custom_fields: Default::default(),
        brand: None,
        model: None,
        location: None,
        media: Default::default(),
        published_at: None,
        updated_at: chrono::Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemorySyncStore>,
    pub dispatcher: Arc<AcceptingDispatcher>,
}

/// Pool that never connects. Requests that reach the repositories fail;
/// everything routed through the orchestrator uses the memory store.
pub fn unreachable_pool() -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(300))
        .connect_lazy("postgres://yachtsync@127.0.0.1:1/yachtsync")
        .unwrap()
}

/// Build the full application router over `pool` and a fresh memory store
/// holding two active sites, one inactive site and two new-yacht records.
pub fn build_test_app_with(pool: PgPool, admin_key: Option<&str>) -> TestApp {
    let store = Arc::new(MemorySyncStore::new());
    store.add_site(site(1, "Adria", true));
    store.add_site(site(2, "Istra", true));
    store.add_site(site(3, "Dormant", false));
    store.add_record(record(10, "galeon-500"));
    store.add_record(record(11, "bavaria-c42"));

    let dispatcher = Arc::new(AcceptingDispatcher::default());
    let orchestrator = Orchestrator::new(
        store.clone(),
        dispatcher.clone(),
        Arc::new(PublicMediaUrls::new("https://media.example")),
        SyncConfig::default(),
    );

    let config = test_config(admin_key);
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        orchestrator: Arc::new(orchestrator),
        shutdown: CancellationToken::new(),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        dispatcher,
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(unreachable_pool(), Some(ADMIN_KEY))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    key: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("x-admin-key", key);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(ADMIN_KEY), None).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(ADMIN_KEY), Some(body)).await
}

pub async fn put_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(ADMIN_KEY), Some(body)).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
