//! HTTP surface of the importer.
//!
//! ```text
//! POST /sync/import?type=         import one record (authenticated)
//! POST /sync/import-legacy?type=  import a suffix-convention payload (authenticated)
//! GET  /sync/status               configuration summary for the sending side
//! GET  /health                    service and storage health
//! ```

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderName, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::SharedSecret;
use crate::error::{ImportError, ImportResult};
use crate::importer::ImportSummary;
use crate::legacy::{self, LegacyRequest};
use crate::payload;
use crate::state::ImporterState;

/// Payloads carry full multilingual content plus media URL lists.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub configured: bool,
    pub api_url: String,
    pub translation_plugin_active: bool,
    pub custom_fields_plugin_active: bool,
    pub translation_backend: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage: &'static str,
    pub db_healthy: bool,
}

/// POST /sync/import
async fn import(
    _auth: SharedSecret,
    State(state): State<ImporterState>,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> ImportResult<Json<ImportSummary>> {
    let job = payload::parse(&body, query.kind.as_deref())?;
    Ok(Json(state.importer.import(job).await))
}

/// POST /sync/import-legacy
async fn import_legacy(
    _auth: SharedSecret,
    State(state): State<ImporterState>,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> ImportResult<Json<ImportSummary>> {
    let legacy: LegacyRequest = serde_json::from_slice(&body)
        .map_err(|e| ImportError::Validation(format!("malformed payload: {e}")))?;
    let request = legacy::to_request(legacy, &state.config.languages)?;
    let job = payload::validate(request, query.kind.as_deref())?;
    Ok(Json(state.importer.import(job).await))
}

/// GET /sync/status
async fn status(State(state): State<ImporterState>) -> Json<StatusResponse> {
    let backend = state.importer.translation_backend();
    Json(StatusResponse {
        configured: state.config.api_key.is_some(),
        api_url: state.config.import_url(),
        translation_plugin_active: backend != crate::translation::BackendKind::None,
        custom_fields_plugin_active: state.importer.custom_fields_enabled(),
        translation_backend: backend.as_str(),
    })
}

/// GET /health
async fn health(State(state): State<ImporterState>) -> Json<HealthResponse> {
    let (storage, db_healthy) = match &state.pool {
        Some(pool) => (
            "postgres",
            sqlx::query("SELECT 1").execute(pool).await.is_ok(),
        ),
        None => ("memory", true),
    };
    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        storage,
        db_healthy,
    })
}

/// Build the importer [`Router`] with its middleware stack.
pub fn build_router(state: ImporterState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/sync/import", post(import))
        .route("/sync/import-legacy", post(import_legacy))
        .route("/sync/status", get(status))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}
