//! Orchestrator runs against the in-memory store and a recording dispatcher.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use yachtsync_core::error::SyncError;
use yachtsync_core::field::{EntityType, FieldConfiguration, FieldKind};
use yachtsync_core::language::{LanguageCode, LanguageMap};
use yachtsync_core::media::PublicMediaUrls;
use yachtsync_core::record::{BrandRef, ContentKind, ContentRecord, ModelRef, RecordState};
use yachtsync_core::site::{AuthScheme, BrandRestriction, FilterMode, ModelRule, SyncSite};
use yachtsync_core::snapshot::SyncEnvelope;
use yachtsync_core::status::{SiteBadge, SyncState};
use yachtsync_core::types::DbId;
use yachtsync_dispatch::{DispatchResult, Dispatcher};
use yachtsync_sync::report as reporter;
use yachtsync_sync::{MemorySyncStore, Orchestrator, SyncConfig, SyncRunError};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingDispatcher {
    sent: Mutex<Vec<(DbId, SyncEnvelope)>>,
    failing_slugs: HashSet<String>,
    failing_site: Option<DbId>,
}

impl RecordingDispatcher {
    fn failing(slugs: &[&str]) -> Self {
        Self {
            failing_slugs: slugs.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn sent_slugs(&self, site_id: DbId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == site_id)
            .map(|(_, e)| e.data.slug.clone())
            .collect()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(&self, site: &SyncSite, envelope: &SyncEnvelope) -> DispatchResult {
        self.sent.lock().unwrap().push((site.id, envelope.clone()));
        if self.failing_site == Some(site.id) || self.failing_slugs.contains(&envelope.data.slug) {
            return DispatchResult {
                success: false,
                status_code: Some(500),
                body: Some("boom".into()),
                error: Some(SyncError::Remote {
                    status: 500,
                    message: "boom".into(),
                }),
            };
        }
        DispatchResult {
            success: true,
            status_code: Some(200),
            body: Some(r#"{"success": true, "warnings": []}"#.into()),
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn lang(code: &str) -> LanguageCode {
    LanguageCode::parse(code).unwrap()
}

fn site(id: DbId) -> SyncSite {
    SyncSite {
        id,
        name: format!("site-{id}"),
        url: format!("https://site-{id}.example"),
        api_key: Some("key".into()),
        auth_scheme: AuthScheme::ApiKeyHeader,
        is_active: true,
        default_language: lang("en"),
        supported_languages: vec![lang("en"), lang("sl")],
        sync_all_brands: true,
        brand_restrictions: Vec::new(),
        sort_order: id as i32,
        last_synced_at: None,
        last_sync_result: None,
    }
}

fn record(id: DbId, brand: Option<(DbId, DbId)>) -> ContentRecord {
    let mut title = LanguageMap::new();
    title.insert(lang("en"), format!("Yacht {id}"));
    ContentRecord {
        id,
        source_id: uuid::Uuid::now_v7(),
        kind: ContentKind::New,
        slug: format!("yacht-{id}"),
        state: RecordState::Published,
        title,
        content: LanguageMap::new(),
        excerpt: LanguageMap::new(),
        custom_fields: [("length".to_string(), serde_json::json!(15.2))]
            .into_iter()
            .collect(),
        brand: brand.map(|(b, _)| BrandRef {
            id: b,
            name: format!("Brand {b}"),
        }),
        model: brand.map(|(_, m)| ModelRef {
            id: m,
            name: format!("Model {m}"),
        }),
        location: None,
        media: Default::default(),
        published_at: None,
        updated_at: chrono::Utc::now(),
    }
}

fn length_field() -> FieldConfiguration {
    FieldConfiguration {
        id: 1,
        entity_type: EntityType::Yacht,
        field_key: "length".into(),
        kind: FieldKind::Number,
        is_multilingual: false,
        is_required: false,
        group: None,
        order: 0,
    }
}

fn store_with_records(count: DbId) -> Arc<MemorySyncStore> {
    let store = Arc::new(MemorySyncStore::new());
    store.add_site(site(1));
    store.add_field(length_field());
    for id in 1..=count {
        store.add_record(record(id, None));
    }
    store
}

fn orchestrator(store: Arc<MemorySyncStore>, dispatcher: Arc<RecordingDispatcher>) -> Orchestrator {
    Orchestrator::new(
        store,
        dispatcher,
        Arc::new(PublicMediaUrls::new("https://cdn.example/media")),
        SyncConfig::default(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn partial_failure_is_isolated_per_record() {
    let store = store_with_records(5);
    let dispatcher = Arc::new(RecordingDispatcher::failing(&["yacht-3"]));
    let orch = orchestrator(store.clone(), dispatcher.clone());

    let report = orch
        .run_site(1, ContentKind::New, false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.imported, 4);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("yacht-3: "), "{:?}", report.errors);
    assert!(!report.success());
    assert!(report.is_partial());

    assert_eq!(store.status(1, 3).state, SyncState::Failed);
    assert!(store.status(1, 3).last_error.unwrap().contains("boom"));
    assert_eq!(store.status(1, 4).state, SyncState::Synced);

    let site = store.site(1).unwrap();
    assert!(site.last_synced_at.is_some());
    let blob = store.last_result(1).unwrap();
    assert_eq!(blob["imported"], 4);
    assert_eq!(blob["error_count"], 1);
    assert_eq!(blob["partial"], true);
}

#[tokio::test]
async fn records_are_dispatched_in_id_order() {
    let store = store_with_records(5);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let orch = orchestrator(store, dispatcher.clone());

    orch.run_site(1, ContentKind::New, false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        dispatcher.sent_slugs(1),
        vec!["yacht-1", "yacht-2", "yacht-3", "yacht-4", "yacht-5"]
    );
}

#[tokio::test]
async fn differential_run_skips_synced_and_force_resends() {
    let store = store_with_records(3);
    store.set_state(1, 2, SyncState::Synced);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let orch = orchestrator(store.clone(), dispatcher.clone());
    let cancel = CancellationToken::new();

    let first = orch.run_site(1, ContentKind::New, false, &cancel).await.unwrap();
    assert_eq!(first.imported, 2);
    assert_eq!(dispatcher.sent_slugs(1), vec!["yacht-1", "yacht-3"]);

    let second = orch.run_site(1, ContentKind::New, false, &cancel).await.unwrap();
    assert_eq!(second.imported, 0);
    assert!(second.success());

    let forced = orch.run_site(1, ContentKind::New, true, &cancel).await.unwrap();
    assert_eq!(forced.imported, 3);
}

#[tokio::test]
async fn repeated_dispatch_sends_identical_payloads() {
    let store = store_with_records(1);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let orch = orchestrator(store, dispatcher.clone());
    let cancel = CancellationToken::new();

    orch.run_site(1, ContentKind::New, true, &cancel).await.unwrap();
    orch.run_site(1, ContentKind::New, true, &cancel).await.unwrap();

    let sent = dispatcher.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].1, sent[1].1);
}

#[tokio::test]
async fn marking_pending_requeues_only_that_record() {
    let store = store_with_records(3);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let orch = orchestrator(store.clone(), dispatcher.clone());
    let cancel = CancellationToken::new();

    orch.run_site(1, ContentKind::New, false, &cancel).await.unwrap();
    assert_eq!(orch.mark_record_pending(2).await.unwrap(), 1);

    let rerun = orch.run_site(1, ContentKind::New, false, &cancel).await.unwrap();
    assert_eq!(rerun.imported, 1);
    assert_eq!(dispatcher.sent_slugs(1).last().map(String::as_str), Some("yacht-2"));
}

#[tokio::test]
async fn records_claimed_by_another_run_are_skipped() {
    let store = store_with_records(2);
    store.hold_claim(1, 1);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let orch = orchestrator(store.clone(), dispatcher.clone());

    let report = orch
        .run_site(1, ContentKind::New, false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.imported, 1);
    assert_eq!(dispatcher.sent_slugs(1), vec!["yacht-2"]);
    assert_eq!(store.status(1, 1).state, SyncState::Pending);
}

#[tokio::test]
async fn ineligible_records_are_not_dispatched() {
    let store = Arc::new(MemorySyncStore::new());
    let mut restricted = site(1);
    restricted.sync_all_brands = false;
    restricted.brand_restrictions = vec![BrandRestriction {
        brand_id: 10,
        allowed: true,
        filter_mode: FilterMode::AllModels,
        model_rules: vec![ModelRule {
            model_id: 101,
            allowed: false,
        }],
    }];
    store.add_site(restricted);
    store.add_field(length_field());
    store.add_record(record(1, Some((10, 100))));
    store.add_record(record(2, Some((10, 101))));
    store.add_record(record(3, Some((20, 200))));
    store.add_record(record(4, None));

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let orch = orchestrator(store.clone(), dispatcher.clone());
    orch.run_site(1, ContentKind::New, false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(dispatcher.sent_slugs(1), vec!["yacht-1", "yacht-4"]);

    let counts = reporter::site_counts(store.as_ref(), &store.site(1).unwrap())
        .await
        .unwrap();
    assert_eq!(counts.synced, 2);
    assert_eq!(counts.pending, 0);
}

#[tokio::test]
async fn fetch_failure_still_records_site_result() {
    let store = store_with_records(2);
    store.fail_record_fetch(true);
    let orch = orchestrator(store.clone(), Arc::new(RecordingDispatcher::default()));

    let report = orch
        .run_site(1, ContentKind::New, false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.imported, 0);
    assert!(report.errors[0].starts_with("fetch: "));
    assert!(store.site(1).unwrap().last_synced_at.is_some());
    assert_eq!(store.last_result(1).unwrap()["success"], false);
}

#[tokio::test]
async fn snapshot_errors_fail_the_record_without_dispatch() {
    let store = store_with_records(1);
    let mut untitled = record(2, None);
    untitled.title = LanguageMap::new();
    untitled.title.insert(lang("de"), "Nur Deutsch".into());
    store.add_record(untitled);

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let orch = orchestrator(store.clone(), dispatcher.clone());
    let report = orch
        .run_site(1, ContentKind::New, false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.imported, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("yacht-2: Validation error"));
    assert_eq!(dispatcher.sent_slugs(1), vec!["yacht-1"]);
    assert_eq!(store.status(1, 2).state, SyncState::Failed);
}

#[tokio::test]
async fn one_failing_site_does_not_affect_others() {
    let store = store_with_records(2);
    store.add_site(site(2));
    let dispatcher = Arc::new(RecordingDispatcher {
        failing_site: Some(2),
        ..Default::default()
    });
    let orch = orchestrator(store.clone(), dispatcher.clone());

    let reports = orch
        .sync_all(ContentKind::New, false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].site_id, 1);
    assert!(reports[0].success());
    assert_eq!(reports[0].imported, 2);
    assert_eq!(reports[1].site_id, 2);
    assert_eq!(reports[1].errors.len(), 2);

    let overviews = reporter::overview(store.as_ref(), vec![store.site(1).unwrap(), store.site(2).unwrap()])
        .await
        .unwrap();
    assert_eq!(overviews[0].badge, SiteBadge::Synced);
    assert_eq!(overviews[1].badge, SiteBadge::Error);
}

#[tokio::test]
async fn cancelled_run_leaves_records_pending() {
    let store = store_with_records(3);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let orch = orchestrator(store.clone(), dispatcher.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = orch.run_site(1, ContentKind::New, false, &cancel).await.unwrap();

    assert_eq!(report.imported, 0);
    assert!(dispatcher.sent_slugs(1).is_empty());
    assert!(report.warnings.iter().any(|w| w.contains("cancelled")));
    assert_eq!(store.status(1, 1).state, SyncState::Pending);
    assert!(reporter::has_pending(store.as_ref()).await.unwrap());
}

#[tokio::test]
async fn cancelled_run_holds_no_claims() {
    let store = store_with_records(3);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let orch = orchestrator(store.clone(), dispatcher.clone());
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    orch.run_site(1, ContentKind::New, false, &cancelled).await.unwrap();
    assert_eq!(store.status(1, 1).attempts, 0);

    let report = orch
        .run_site(1, ContentKind::New, false, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.imported, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(dispatcher.sent_slugs(1), vec!["yacht-1", "yacht-2", "yacht-3"]);
}

#[tokio::test]
async fn inactive_or_unknown_sites_are_rejected() {
    let store = store_with_records(1);
    let mut inactive = site(2);
    inactive.is_active = false;
    store.add_site(inactive);
    let orch = orchestrator(store, Arc::new(RecordingDispatcher::default()));
    let cancel = CancellationToken::new();

    assert_matches!(
        orch.run_site(2, ContentKind::New, false, &cancel).await,
        Err(SyncRunError::SiteInactive(2))
    );
    assert_matches!(
        orch.run_site(99, ContentKind::New, false, &cancel).await,
        Err(SyncRunError::SiteNotFound(99))
    );
}
