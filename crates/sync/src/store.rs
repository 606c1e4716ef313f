//! Storage seam of the orchestrator.
//!
//! [`PgSyncStore`] backs production runs with the `yachtsync-db`
//! repositories; [`MemorySyncStore`] keeps everything in process for tests
//! and local tooling.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;
use yachtsync_core::field::{EntityType, FieldConfiguration};
use yachtsync_core::record::{ContentKind, ContentRecord};
use yachtsync_core::site::SyncSite;
use yachtsync_core::status::SyncState;
use yachtsync_core::types::DbId;
use yachtsync_db::repositories::{
    ContentRecordRepo, FieldConfigRepo, SyncSiteRepo, SyncStatusRepo,
};
use yachtsync_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(DbError::Sqlx(err))
    }
}

#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn find_site(&self, site_id: DbId) -> Result<Option<SyncSite>, StoreError>;

    /// Active sites ordered by `sort_order`, then id.
    async fn active_sites(&self) -> Result<Vec<SyncSite>, StoreError>;

    /// Published records of a kind in stable id order.
    async fn published_records(&self, kind: ContentKind)
        -> Result<Vec<ContentRecord>, StoreError>;

    async fn field_configs(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<FieldConfiguration>, StoreError>;

    /// State of every (site, record) row of a site. Absent records are pending.
    async fn status_map(&self, site_id: DbId) -> Result<HashMap<DbId, SyncState>, StoreError>;

    /// Compare-and-swap claim of a (site, record) pair. `None` when another
    /// run holds it, or when it became synced and `force` is off.
    async fn claim(
        &self,
        site_id: DbId,
        record_id: DbId,
        force: bool,
    ) -> Result<Option<Uuid>, StoreError>;

    /// Record a dispatch outcome and release the claim. Returns `false`
    /// when the claim was no longer held.
    async fn complete(
        &self,
        site_id: DbId,
        record_id: DbId,
        token: Uuid,
        outcome: Result<(), &str>,
    ) -> Result<bool, StoreError>;

    async fn record_sync_result(
        &self,
        site_id: DbId,
        result: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Mark a record pending for every site.
    async fn mark_record_pending(&self, record_id: DbId) -> Result<u64, StoreError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

pub struct PgSyncStore {
    pool: PgPool,
    claim_stale_secs: i64,
}

impl PgSyncStore {
    pub fn new(pool: PgPool, claim_stale_secs: i64) -> Self {
        Self {
            pool,
            claim_stale_secs,
        }
    }
}

#[async_trait]
impl SyncStore for PgSyncStore {
    async fn find_site(&self, site_id: DbId) -> Result<Option<SyncSite>, StoreError> {
        Ok(SyncSiteRepo::find_by_id(&self.pool, site_id).await?)
    }

    async fn active_sites(&self) -> Result<Vec<SyncSite>, StoreError> {
        Ok(SyncSiteRepo::list_active(&self.pool).await?)
    }

    async fn published_records(
        &self,
        kind: ContentKind,
    ) -> Result<Vec<ContentRecord>, StoreError> {
        Ok(ContentRecordRepo::list_published_by_kind(&self.pool, kind).await?)
    }

    async fn field_configs(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<FieldConfiguration>, StoreError> {
        Ok(FieldConfigRepo::list_for_entity(&self.pool, entity_type).await?)
    }

    async fn status_map(&self, site_id: DbId) -> Result<HashMap<DbId, SyncState>, StoreError> {
        Ok(SyncStatusRepo::status_map(&self.pool, site_id).await?)
    }

    async fn claim(
        &self,
        site_id: DbId,
        record_id: DbId,
        force: bool,
    ) -> Result<Option<Uuid>, StoreError> {
        Ok(SyncStatusRepo::claim(&self.pool, site_id, record_id, force, self.claim_stale_secs).await?)
    }

    async fn complete(
        &self,
        site_id: DbId,
        record_id: DbId,
        token: Uuid,
        outcome: Result<(), &str>,
    ) -> Result<bool, StoreError> {
        Ok(SyncStatusRepo::complete(&self.pool, site_id, record_id, token, outcome).await?)
    }

    async fn record_sync_result(
        &self,
        site_id: DbId,
        result: &serde_json::Value,
    ) -> Result<(), StoreError> {
        Ok(SyncSiteRepo::record_sync_result(&self.pool, site_id, result).await?)
    }

    async fn mark_record_pending(&self, record_id: DbId) -> Result<u64, StoreError> {
        Ok(SyncStatusRepo::mark_record_pending(&self.pool, record_id).await?)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryStatus {
    pub state: SyncState,
    pub last_error: Option<String>,
    pub attempts: u32,
    claim: Option<Uuid>,
    dirty_since_claim: bool,
}

#[derive(Default)]
struct MemoryInner {
    sites: Vec<SyncSite>,
    records: Vec<ContentRecord>,
    configs: Vec<FieldConfiguration>,
    statuses: HashMap<(DbId, DbId), MemoryStatus>,
    results: HashMap<DbId, serde_json::Value>,
    #[cfg(any(test, feature = "test-util"))]
    fail_record_fetch: bool,
}

/// Process-local store. All state sits behind one mutex, so claims are
/// atomic the way the database compare-and-swap is.
#[derive(Default)]
pub struct MemorySyncStore {
    inner: Mutex<MemoryInner>,
}

impl MemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_site(&self, site: SyncSite) {
        self.lock().sites.push(site);
    }

    pub fn add_record(&self, record: ContentRecord) {
        let mut inner = self.lock();
        inner.records.push(record);
        inner.records.sort_by_key(|r| r.id);
    }

    pub fn add_field(&self, config: FieldConfiguration) {
        self.lock().configs.push(config);
    }

    pub fn set_state(&self, site_id: DbId, record_id: DbId, state: SyncState) {
        self.lock()
            .statuses
            .entry((site_id, record_id))
            .or_default()
            .state = state;
    }

    /// Claim a pair on behalf of a simulated concurrent run.
    #[cfg(any(test, feature = "test-util"))]
    pub fn hold_claim(&self, site_id: DbId, record_id: DbId) -> Uuid {
        let token = Uuid::new_v4();
        self.lock()
            .statuses
            .entry((site_id, record_id))
            .or_default()
            .claim = Some(token);
        token
    }

    /// Make record fetches fail until reset.
    #[cfg(any(test, feature = "test-util"))]
    pub fn fail_record_fetch(&self, fail: bool) {
        self.lock().fail_record_fetch = fail;
    }

    pub fn status(&self, site_id: DbId, record_id: DbId) -> MemoryStatus {
        self.lock()
            .statuses
            .get(&(site_id, record_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn last_result(&self, site_id: DbId) -> Option<serde_json::Value> {
        self.lock().results.get(&site_id).cloned()
    }

    pub fn site(&self, site_id: DbId) -> Option<SyncSite> {
        self.lock().sites.iter().find(|s| s.id == site_id).cloned()
    }
}

#[async_trait]
impl SyncStore for MemorySyncStore {
    async fn find_site(&self, site_id: DbId) -> Result<Option<SyncSite>, StoreError> {
        Ok(self.site(site_id))
    }

    async fn active_sites(&self) -> Result<Vec<SyncSite>, StoreError> {
        Ok(yachtsync_core::site::active_sites(self.lock().sites.clone()))
    }

    async fn published_records(
        &self,
        kind: ContentKind,
    ) -> Result<Vec<ContentRecord>, StoreError> {
        let inner = self.lock();
        #[cfg(any(test, feature = "test-util"))]
        if inner.fail_record_fetch {
            return Err(StoreError::Unavailable("record fetch disabled".into()));
        }
        Ok(inner
            .records
            .iter()
            .filter(|r| r.kind == kind && r.is_published())
            .cloned()
            .collect())
    }

    async fn field_configs(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<FieldConfiguration>, StoreError> {
        Ok(self
            .lock()
            .configs
            .iter()
            .filter(|c| c.entity_type == entity_type)
            .cloned()
            .collect())
    }

    async fn status_map(&self, site_id: DbId) -> Result<HashMap<DbId, SyncState>, StoreError> {
        Ok(self
            .lock()
            .statuses
            .iter()
            .filter(|((s, _), _)| *s == site_id)
            .map(|((_, record_id), status)| (*record_id, status.state))
            .collect())
    }

    async fn claim(
        &self,
        site_id: DbId,
        record_id: DbId,
        force: bool,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut inner = self.lock();
        let status = inner.statuses.entry((site_id, record_id)).or_default();
        if status.claim.is_some() || (!force && status.state == SyncState::Synced) {
            return Ok(None);
        }
        let token = Uuid::new_v4();
        status.claim = Some(token);
        status.dirty_since_claim = false;
        Ok(Some(token))
    }

    async fn complete(
        &self,
        site_id: DbId,
        record_id: DbId,
        token: Uuid,
        outcome: Result<(), &str>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let Some(status) = inner.statuses.get_mut(&(site_id, record_id)) else {
            return Ok(false);
        };
        if status.claim != Some(token) {
            return Ok(false);
        }
        status.claim = None;
        status.attempts += 1;
        match outcome {
            Ok(()) => {
                status.state = if status.dirty_since_claim {
                    SyncState::Pending
                } else {
                    SyncState::Synced
                };
                status.last_error = None;
            }
            Err(message) => {
                status.state = SyncState::Failed;
                status.last_error = Some(message.to_string());
            }
        }
        Ok(true)
    }

    async fn record_sync_result(
        &self,
        site_id: DbId,
        result: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.results.insert(site_id, result.clone());
        if let Some(site) = inner.sites.iter_mut().find(|s| s.id == site_id) {
            site.last_synced_at = Some(chrono::Utc::now());
            site.last_sync_result = Some(result.clone());
        }
        Ok(())
    }

    async fn mark_record_pending(&self, record_id: DbId) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        let site_ids: Vec<DbId> = inner.sites.iter().map(|s| s.id).collect();
        for site_id in &site_ids {
            let status = inner.statuses.entry((*site_id, record_id)).or_default();
            status.state = SyncState::Pending;
            if status.claim.is_some() {
                status.dirty_since_claim = true;
            }
        }
        Ok(site_ids.len() as u64)
    }
}
