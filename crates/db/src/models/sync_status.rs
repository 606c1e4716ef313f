//! Per-(site, record) sync status rows (`sync_statuses`).

use serde::Serialize;
use sqlx::FromRow;
use yachtsync_core::types::{DbId, Timestamp};

/// A row from the `sync_statuses` table joined with the record slug.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncStatusRow {
    pub id: DbId,
    pub site_id: DbId,
    pub record_id: DbId,
    pub slug: String,
    pub status: String,
    pub last_attempt_at: Option<Timestamp>,
    pub last_error: Option<String>,
    #[serde(skip)]
    pub claim_token: Option<uuid::Uuid>,
    pub claimed_at: Option<Timestamp>,
    pub marked_pending_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
