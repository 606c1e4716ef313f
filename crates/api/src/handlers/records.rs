//! Handlers for content record hooks.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use yachtsync_core::error::CoreError;
use yachtsync_core::types::DbId;
use yachtsync_db::repositories::ContentRecordRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::RequireOperator;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MarkPendingResponse {
    pub record_id: DbId,
    /// Sites whose status row was reset.
    pub sites: u64,
}

/// POST /api/v1/records/{id}/mark-pending
///
/// Called after a record is edited: every site gets it again on its next
/// run, including sites that already had it.
pub async fn mark_pending(
    _operator: RequireOperator,
    State(state): State<AppState>,
    Path(record_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !ContentRecordRepo::touch(&state.pool, record_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "ContentRecord",
            id: record_id,
        }));
    }

    let sites = state.orchestrator.mark_record_pending(record_id).await?;

    Ok(Json(DataResponse {
        data: MarkPendingResponse { record_id, sites },
    }))
}
