//! Sync runs: one (site, content type) pair at a time, or every active
//! site at once.
//!
//! A run fetches the published records of the content type, keeps the ones
//! the site is eligible for (and, unless forced, not yet synced), then for
//! each record claims its status row, builds the site's snapshot,
//! dispatches it and writes the outcome back. Per-record failures never
//! abort the run; the aggregated [`RunReport`] is persisted on the site
//! whether or not the run got past fetching.

use std::sync::Arc;

use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use yachtsync_core::field::FieldConfiguration;
use yachtsync_core::media::MediaUrlResolver;
use yachtsync_core::record::{ContentKind, ContentRecord};
use yachtsync_core::site::SyncSite;
use yachtsync_core::snapshot::{self, SyncEnvelope};
use yachtsync_core::status::{RunReport, SyncState};
use yachtsync_core::translate::Translator;
use yachtsync_core::types::DbId;
use yachtsync_dispatch::Dispatcher;

use crate::config::SyncConfig;
use crate::gaps::fill_translation_gaps;
use crate::store::{StoreError, SyncStore};

#[derive(Debug, thiserror::Error)]
pub enum SyncRunError {
    #[error("Sync site {0} not found")]
    SiteNotFound(DbId),

    #[error("Sync site {0} is inactive")]
    SiteInactive(DbId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one record inside a run.
#[derive(Debug)]
enum RecordOutcome {
    Imported { warnings: Vec<String> },
    Skipped,
    Failed(String),
    Cancelled,
}

pub struct Orchestrator {
    store: Arc<dyn SyncStore>,
    dispatcher: Arc<dyn Dispatcher>,
    media: Arc<dyn MediaUrlResolver>,
    translator: Option<Arc<dyn Translator>>,
    config: SyncConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SyncStore>,
        dispatcher: Arc<dyn Dispatcher>,
        media: Arc<dyn MediaUrlResolver>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            media,
            translator: None,
            config,
        }
    }

    /// Fill translation gaps through `translator` when `translate_gaps` is on.
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.store
    }

    /// Run one site by id.
    pub async fn run_site(
        &self,
        site_id: DbId,
        content_type: ContentKind,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<RunReport, SyncRunError> {
        let site = self
            .store
            .find_site(site_id)
            .await?
            .ok_or(SyncRunError::SiteNotFound(site_id))?;
        if !site.is_active {
            return Err(SyncRunError::SiteInactive(site_id));
        }
        Ok(self.run(&site, content_type, force, cancel).await)
    }

    /// Run every active site, several at a time. One site's failure is
    /// recorded in its own report and never affects the others. Reports
    /// come back in site order.
    pub async fn sync_all(
        &self,
        content_type: ContentKind,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<RunReport>, StoreError> {
        let sites = self.store.active_sites().await?;
        tracing::info!(
            sites = sites.len(),
            content_type = %content_type,
            force,
            "Starting multi-site sync",
        );

        let runs: Vec<_> = sites
            .iter()
            .map(|site| self.run(site, content_type, force, cancel).boxed())
            .collect();
        let reports = stream::iter(runs)
            .buffered(self.config.site_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;
        Ok(reports)
    }

    /// Mark a record dirty for every site after it was created or edited.
    pub async fn mark_record_pending(&self, record_id: DbId) -> Result<u64, StoreError> {
        let touched = self.store.mark_record_pending(record_id).await?;
        tracing::info!(record_id, sites = touched, "Record marked pending");
        Ok(touched)
    }

    /// Run one loaded site. Always returns a report, persisted on the site.
    pub async fn run(
        &self,
        site: &SyncSite,
        content_type: ContentKind,
        force: bool,
        cancel: &CancellationToken,
    ) -> RunReport {
        let mut report = RunReport::new(site.id, content_type, force);
        tracing::info!(
            site_id = site.id,
            site = %site.name,
            content_type = %content_type,
            force,
            "Sync run started",
        );

        match self.fetch_eligible(site, content_type, force).await {
            Ok((records, configs)) => {
                self.process_records(site, records, &configs, force, cancel, &mut report)
                    .await;
            }
            Err(e) => {
                tracing::error!(site_id = site.id, error = %e, "Failed to load records for sync");
                report.record_error("fetch", &e);
            }
        }

        report.finish();
        if let Err(e) = self
            .store
            .record_sync_result(site.id, &report.to_result_blob())
            .await
        {
            tracing::error!(site_id = site.id, error = %e, "Failed to persist sync result");
        }

        tracing::info!(
            site_id = site.id,
            imported = report.imported,
            skipped = report.skipped,
            errors = report.errors.len(),
            success = report.success(),
            "Sync run finished",
        );
        report
    }

    async fn fetch_eligible(
        &self,
        site: &SyncSite,
        content_type: ContentKind,
        force: bool,
    ) -> Result<(Vec<ContentRecord>, Vec<FieldConfiguration>), StoreError> {
        let records = self.store.published_records(content_type).await?;
        let configs = self.store.field_configs(content_type.entity_type()).await?;
        let statuses = self.store.status_map(site.id).await?;

        let eligible = records
            .into_iter()
            .filter(|r| site.is_eligible(r.brand_id(), r.model_id()))
            .filter(|r| {
                statuses
                    .get(&r.id)
                    .copied()
                    .unwrap_or(SyncState::Pending)
                    .needs_dispatch(force)
            })
            .collect();
        Ok((eligible, configs))
    }

    async fn process_records(
        &self,
        site: &SyncSite,
        records: Vec<ContentRecord>,
        configs: &[FieldConfiguration],
        force: bool,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) {
        let pending: Vec<_> = records
            .iter()
            .map(|record| {
                async move {
                    let outcome = self.process_record(site, record, configs, force, cancel).await;
                    (record, outcome)
                }
                .boxed()
            })
            .collect();
        let mut outcomes = stream::iter(pending)
            .buffered(self.config.record_concurrency.max(1));

        let mut cancelled = 0usize;
        while let Some((record, outcome)) = outcomes.next().await {
            match outcome {
                RecordOutcome::Imported { warnings } => {
                    report.imported += 1;
                    report
                        .warnings
                        .extend(warnings.into_iter().map(|w| format!("{}: {w}", record.slug)));
                }
                RecordOutcome::Skipped => report.skipped += 1,
                RecordOutcome::Failed(message) => report.record_error(&record.slug, message),
                RecordOutcome::Cancelled => cancelled += 1,
            }
        }

        if cancelled > 0 {
            tracing::warn!(site_id = site.id, remaining = cancelled, "Sync run cancelled");
            report
                .warnings
                .push(format!("run cancelled, {cancelled} record(s) left pending"));
        }
    }

    async fn process_record(
        &self,
        site: &SyncSite,
        record: &ContentRecord,
        configs: &[FieldConfiguration],
        force: bool,
        cancel: &CancellationToken,
    ) -> RecordOutcome {
        if cancel.is_cancelled() {
            return RecordOutcome::Cancelled;
        }

        let token = match self.store.claim(site.id, record.id, force).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!(site_id = site.id, record_id = record.id, "Record claimed elsewhere, skipping");
                return RecordOutcome::Skipped;
            }
            Err(e) => return RecordOutcome::Failed(format!("claim failed: {e}")),
        };

        let result = self.build_and_send(site, record, configs).await;

        let stored = match &result {
            Ok(_) => self.store.complete(site.id, record.id, token, Ok(())).await,
            Err(message) => {
                self.store
                    .complete(site.id, record.id, token, Err(message.as_str()))
                    .await
            }
        };
        match stored {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                site_id = site.id,
                record_id = record.id,
                "Claim lost before status write-back",
            ),
            Err(e) => {
                tracing::error!(site_id = site.id, record_id = record.id, error = %e, "Failed to store sync status");
            }
        }

        match result {
            Ok(warnings) => RecordOutcome::Imported { warnings },
            Err(message) => RecordOutcome::Failed(message),
        }
    }

    /// Build the snapshot and dispatch it. Returns the target's warnings.
    async fn build_and_send(
        &self,
        site: &SyncSite,
        record: &ContentRecord,
        configs: &[FieldConfiguration],
    ) -> Result<Vec<String>, String> {
        let record = match (&self.translator, self.config.translate_gaps) {
            (Some(translator), true) => {
                let (filled, count) =
                    fill_translation_gaps(record, configs, site, translator.as_ref()).await;
                if count > 0 {
                    tracing::debug!(record_id = record.id, filled = count, "Translated missing fields");
                }
                std::borrow::Cow::Owned(filled)
            }
            _ => std::borrow::Cow::Borrowed(record),
        };

        let snapshot = snapshot::build(&record, site, configs, self.media.as_ref())
            .map_err(|e| yachtsync_core::error::SyncError::from(e).to_string())?;
        let envelope = SyncEnvelope::new(snapshot, self.config.import_media);

        let result = self.dispatcher.send(site, &envelope).await;
        if result.success {
            Ok(response_warnings(result.json()))
        } else {
            Err(result
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "dispatch failed".into()))
        }
    }
}

/// `warnings` array of an importer response.
fn response_warnings(body: Option<serde_json::Value>) -> Vec<String> {
    body.as_ref()
        .and_then(|b| b.get("warnings"))
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
