//! Repository for the `sync_statuses` table.
//!
//! A (site, record) pair without a row is pending. Runs claim a row with a
//! compare-and-swap on `claim_token` before dispatching, so two concurrent
//! runs never send the same record to the same site.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;
use yachtsync_core::status::SyncState;
use yachtsync_core::types::DbId;

use crate::models::sync_status::SyncStatusRow;
use crate::DbError;

const STATUS_COLUMNS: &str = "\
    s.id, s.site_id, s.record_id, r.slug, s.status, s.last_attempt_at, \
    s.last_error, s.claim_token, s.claimed_at, s.marked_pending_at, \
    s.created_at, s.updated_at";

pub struct SyncStatusRepo;

impl SyncStatusRepo {
    /// Status rows of one site, newest attempt first.
    pub async fn list_for_site(
        pool: &PgPool,
        site_id: DbId,
    ) -> Result<Vec<SyncStatusRow>, sqlx::Error> {
        let query = format!(
            "SELECT {STATUS_COLUMNS} FROM sync_statuses s \
             JOIN content_records r ON r.id = s.record_id \
             WHERE s.site_id = $1 \
             ORDER BY s.last_attempt_at DESC NULLS LAST, s.record_id"
        );
        sqlx::query_as::<_, SyncStatusRow>(&query)
            .bind(site_id)
            .fetch_all(pool)
            .await
    }

    /// Record id to state for every row of a site.
    pub async fn status_map(
        pool: &PgPool,
        site_id: DbId,
    ) -> Result<HashMap<DbId, SyncState>, DbError> {
        let rows: Vec<(DbId, String)> =
            sqlx::query_as("SELECT record_id, status FROM sync_statuses WHERE site_id = $1")
                .bind(site_id)
                .fetch_all(pool)
                .await?;
        rows.into_iter()
            .map(|(record_id, status)| Ok((record_id, SyncState::parse(&status)?)))
            .collect()
    }

    /// Try to claim a (site, record) pair for dispatch.
    ///
    /// Succeeds when the row is unclaimed or its claim is older than
    /// `stale_after_secs`. Unless `force` is set, a row that became `synced`
    /// since the caller read it is not claimed. Returns `None` when another
    /// run owns the pair.
    pub async fn claim(
        pool: &PgPool,
        site_id: DbId,
        record_id: DbId,
        force: bool,
        stale_after_secs: i64,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let token = Uuid::new_v4();
        let claimed: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO sync_statuses (site_id, record_id, status, claim_token, claimed_at) \
             VALUES ($1, $2, 'pending', $3, NOW()) \
             ON CONFLICT ON CONSTRAINT uq_sync_statuses_site_record DO UPDATE SET \
                 claim_token = EXCLUDED.claim_token, \
                 claimed_at = EXCLUDED.claimed_at, \
                 updated_at = NOW() \
             WHERE (sync_statuses.claim_token IS NULL \
                    OR sync_statuses.claimed_at < NOW() - make_interval(secs => $4)) \
               AND ($5 OR sync_statuses.status <> 'synced') \
             RETURNING claim_token",
        )
        .bind(site_id)
        .bind(record_id)
        .bind(token)
        .bind(stale_after_secs as f64)
        .bind(force)
        .fetch_optional(pool)
        .await?;
        Ok(claimed)
    }

    /// Write the outcome of a dispatch and release the claim.
    ///
    /// A success stays `pending` when the record was marked dirty after the
    /// claim was taken. Returns `false` when the claim was lost.
    pub async fn complete(
        pool: &PgPool,
        site_id: DbId,
        record_id: DbId,
        token: Uuid,
        outcome: Result<(), &str>,
    ) -> Result<bool, sqlx::Error> {
        let (status, error) = match outcome {
            Ok(()) => (SyncState::Synced, None),
            Err(message) => (SyncState::Failed, Some(message)),
        };
        let result = sqlx::query(
            "UPDATE sync_statuses SET \
                 status = CASE \
                     WHEN $4 = 'synced' AND marked_pending_at > claimed_at THEN 'pending' \
                     ELSE $4 END, \
                 last_error = $5, \
                 last_attempt_at = NOW(), \
                 claim_token = NULL, \
                 claimed_at = NULL, \
                 updated_at = NOW() \
             WHERE site_id = $1 AND record_id = $2 AND claim_token = $3",
        )
        .bind(site_id)
        .bind(record_id)
        .bind(token)
        .bind(status.as_str())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a record dirty for every site. Returns the number of rows touched.
    pub async fn mark_record_pending(pool: &PgPool, record_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO sync_statuses (site_id, record_id, status, marked_pending_at) \
             SELECT id, $1, 'pending', NOW() FROM sync_sites \
             ON CONFLICT ON CONSTRAINT uq_sync_statuses_site_record DO UPDATE SET \
                 status = 'pending', \
                 marked_pending_at = NOW(), \
                 updated_at = NOW()",
        )
        .bind(record_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
