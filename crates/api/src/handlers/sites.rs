//! Handlers for the sync site registry.
//!
//! Site settings and brand restrictions are edited here; runs and the
//! aggregate badge live in [`super::runs`]. All endpoints require the
//! operator key.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;
use yachtsync_core::error::CoreError;
use yachtsync_core::site::BrandRestriction;
use yachtsync_core::types::DbId;
use yachtsync_db::models::site::{CreateSyncSite, UpdateSyncSite};
use yachtsync_db::repositories::{SyncSiteRepo, SyncStatusRepo};
use yachtsync_sync::report;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::RequireOperator;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `PUT /sync/sites/{id}/restrictions`.
#[derive(Debug, Deserialize)]
pub struct ReplaceRestrictions {
    pub restrictions: Vec<BrandRestriction>,
}

// ---------------------------------------------------------------------------
// Site CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/sync/sites
///
/// Every site in sort order, with its pending/synced/failed counts and badge.
pub async fn list_sites(
    _operator: RequireOperator,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let sites = SyncSiteRepo::list(&state.pool).await?;
    let overviews = report::overview(state.orchestrator.store().as_ref(), sites).await?;

    Ok(Json(DataResponse { data: overviews }))
}

/// POST /api/v1/sync/sites
pub async fn create_site(
    _operator: RequireOperator,
    State(state): State<AppState>,
    Json(input): Json<CreateSyncSite>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let site = SyncSiteRepo::create(&state.pool, &input).await?;

    tracing::info!(site_id = site.id, name = %site.name, "Sync site created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: site })))
}

/// PUT /api/v1/sync/sites/{id}
///
/// Partial update. An omitted `api_key` keeps the stored one.
pub async fn update_site(
    _operator: RequireOperator,
    State(state): State<AppState>,
    Path(site_id): Path<DbId>,
    Json(input): Json<UpdateSyncSite>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let site = SyncSiteRepo::update(&state.pool, site_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "SyncSite",
            id: site_id,
        }))?;

    tracing::info!(site_id, is_active = site.is_active, "Sync site updated");

    Ok(Json(DataResponse { data: site }))
}

// ---------------------------------------------------------------------------
// Brand restrictions
// ---------------------------------------------------------------------------

/// PUT /api/v1/sync/sites/{id}/restrictions
///
/// Replace the site's brand restrictions. Takes effect on the next run;
/// restrictions are only consulted when `sync_all_brands` is off.
pub async fn replace_restrictions(
    _operator: RequireOperator,
    State(state): State<AppState>,
    Path(site_id): Path<DbId>,
    Json(input): Json<ReplaceRestrictions>,
) -> AppResult<impl IntoResponse> {
    validate_restrictions(&input.restrictions)?;
    ensure_site(&state, site_id).await?;

    let saved = SyncSiteRepo::replace_restrictions(&state.pool, site_id, &input.restrictions).await?;

    tracing::info!(site_id, count = saved.len(), "Brand restrictions replaced");

    Ok(Json(DataResponse { data: saved }))
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// GET /api/v1/sync/sites/{id}/statuses
///
/// Per-record status rows of one site, most recent attempt first.
pub async fn list_statuses(
    _operator: RequireOperator,
    State(state): State<AppState>,
    Path(site_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_site(&state, site_id).await?;

    let statuses = SyncStatusRepo::list_for_site(&state.pool, site_id).await?;

    Ok(Json(DataResponse { data: statuses }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn ensure_site(state: &AppState, site_id: DbId) -> AppResult<()> {
    SyncSiteRepo::find_by_id(&state.pool, site_id)
        .await?
        .map(|_| ())
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "SyncSite",
            id: site_id,
        }))
}

/// One restriction per brand and one rule per model. Model rules are kept
/// in `all_models` mode so switching modes back does not lose them.
pub fn validate_restrictions(restrictions: &[BrandRestriction]) -> AppResult<()> {
    let mut brands = std::collections::HashSet::new();
    for restriction in restrictions {
        if !brands.insert(restriction.brand_id) {
            return Err(AppError::BadRequest(format!(
                "Duplicate restriction for brand {}",
                restriction.brand_id
            )));
        }
        let mut models = std::collections::HashSet::new();
        if let Some(rule) = restriction
            .model_rules
            .iter()
            .find(|rule| !models.insert(rule.model_id))
        {
            return Err(AppError::BadRequest(format!(
                "Duplicate rule for model {} under brand {}",
                rule.model_id, restriction.brand_id
            )));
        }
    }
    Ok(())
}
