//! Status aggregation for operators: per-site counts, badges and the
//! global "needs sync" indicator.

use serde::Serialize;
use yachtsync_core::record::ContentKind;
use yachtsync_core::site::SyncSite;
use yachtsync_core::status::{SiteBadge, StatusCounts, SyncState};

use crate::store::{StoreError, SyncStore};

/// A site with its aggregate status.
#[derive(Debug, Clone, Serialize)]
pub struct SiteOverview {
    #[serde(flatten)]
    pub site: SyncSite,
    pub pending: i64,
    pub synced: i64,
    pub failed: i64,
    pub badge: SiteBadge,
}

impl SiteOverview {
    pub fn counts(&self) -> StatusCounts {
        StatusCounts {
            pending: self.pending,
            synced: self.synced,
            failed: self.failed,
        }
    }
}

/// Status counts over every published record the site is eligible for, of
/// every content type. Records without a status row count as pending.
pub async fn site_counts(store: &dyn SyncStore, site: &SyncSite) -> Result<StatusCounts, StoreError> {
    let statuses = store.status_map(site.id).await?;
    let mut counts = StatusCounts::default();

    for kind in ContentKind::ALL {
        for record in store.published_records(kind).await? {
            if !site.is_eligible(record.brand_id(), record.model_id()) {
                continue;
            }
            match statuses.get(&record.id).copied().unwrap_or_default() {
                SyncState::Pending => counts.pending += 1,
                SyncState::Synced => counts.synced += 1,
                SyncState::Failed => counts.failed += 1,
            }
        }
    }
    Ok(counts)
}

pub async fn site_overview(store: &dyn SyncStore, site: SyncSite) -> Result<SiteOverview, StoreError> {
    let counts = site_counts(store, &site).await?;
    Ok(SiteOverview {
        site,
        pending: counts.pending,
        synced: counts.synced,
        failed: counts.failed,
        badge: counts.badge(),
    })
}

/// Overviews of every given site, in order.
pub async fn overview(
    store: &dyn SyncStore,
    sites: Vec<SyncSite>,
) -> Result<Vec<SiteOverview>, StoreError> {
    let mut overviews = Vec::with_capacity(sites.len());
    for site in sites {
        overviews.push(site_overview(store, site).await?);
    }
    Ok(overviews)
}

/// Whether any active site has records waiting to be synced.
pub async fn has_pending(store: &dyn SyncStore) -> Result<bool, StoreError> {
    let sites = store.active_sites().await?;
    let overviews = overview(store, sites).await?;
    let counts: Vec<StatusCounts> = overviews.iter().map(SiteOverview::counts).collect();
    Ok(yachtsync_core::status::has_pending(&counts))
}
