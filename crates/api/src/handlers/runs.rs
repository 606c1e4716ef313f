//! Handlers that trigger sync runs and report the aggregate indicator.
//!
//! Runs execute inside the request: the response carries the finished
//! report. Shutting the server down cancels them between records.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use yachtsync_core::record::ContentKind;
use yachtsync_core::status::{summarize_errors, RunReport, SiteBadge, ERROR_PREVIEW_LIMIT};
use yachtsync_core::types::DbId;
use yachtsync_sync::report;

use crate::error::AppResult;
use crate::middleware::auth::RequireOperator;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of both run endpoints.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub content_type: String,
    /// Re-send records the site already has.
    #[serde(default)]
    pub force: bool,
}

/// A finished run as shown to operators.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    #[serde(flatten)]
    pub report: RunReport,
    pub success: bool,
    pub partial: bool,
    /// First few errors plus a `(+N more)` suffix; `None` without errors.
    pub error_summary: Option<String>,
}

impl From<RunReport> for RunResponse {
    fn from(report: RunReport) -> Self {
        let error_summary = (!report.errors.is_empty())
            .then(|| summarize_errors(&report.errors, ERROR_PREVIEW_LIMIT));
        Self {
            success: report.success(),
            partial: report.is_partial(),
            error_summary,
            report,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BadgeResponse {
    pub has_pending: bool,
    pub label: &'static str,
}

/// POST /api/v1/sync/sites/{id}/run
pub async fn run_site(
    _operator: RequireOperator,
    State(state): State<AppState>,
    Path(site_id): Path<DbId>,
    Json(input): Json<RunRequest>,
) -> AppResult<impl IntoResponse> {
    let content_type = ContentKind::parse(&input.content_type)?;

    let report = state
        .orchestrator
        .run_site(site_id, content_type, input.force, &state.shutdown)
        .await?;

    Ok(Json(DataResponse {
        data: RunResponse::from(report),
    }))
}

/// POST /api/v1/sync/run
///
/// Run every active site. One report per site, in site order.
pub async fn run_all(
    _operator: RequireOperator,
    State(state): State<AppState>,
    Json(input): Json<RunRequest>,
) -> AppResult<impl IntoResponse> {
    let content_type = ContentKind::parse(&input.content_type)?;

    let reports = state
        .orchestrator
        .sync_all(content_type, input.force, &state.shutdown)
        .await?;

    let data: Vec<RunResponse> = reports.into_iter().map(RunResponse::from).collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/sync/badge
///
/// Whether any active site still has records to send.
pub async fn badge(
    _operator: RequireOperator,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let has_pending = report::has_pending(state.orchestrator.store().as_ref()).await?;
    let label = if has_pending {
        SiteBadge::NeedsSync.label()
    } else {
        SiteBadge::Synced.label()
    };

    Ok(Json(DataResponse {
        data: BadgeResponse { has_pending, label },
    }))
}
