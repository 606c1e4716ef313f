//! Integration tests for the sync repositories.
//!
//! Require a PostgreSQL server reachable through `DATABASE_URL`; run with
//! `cargo test -p yachtsync-db -- --ignored`.

use sqlx::PgPool;
use yachtsync_core::language::{LanguageCode, LanguageMap};
use yachtsync_core::record::{ContentKind, RecordState};
use yachtsync_core::site::{BrandRestriction, FilterMode, ModelRule};
use yachtsync_core::status::SyncState;
use yachtsync_db::models::record::CreateContentRecord;
use yachtsync_db::models::site::{CreateSyncSite, UpdateSyncSite};
use yachtsync_db::repositories::{CatalogRepo, ContentRecordRepo, SyncSiteRepo, SyncStatusRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_site(name: &str, url: &str) -> CreateSyncSite {
    CreateSyncSite {
        name: name.to_string(),
        url: url.to_string(),
        api_key: Some("secret".to_string()),
        auth_scheme: None,
        is_active: None,
        default_language: "en".to_string(),
        supported_languages: vec!["en".to_string(), "sl".to_string()],
        sync_all_brands: None,
        sort_order: None,
    }
}

fn new_record(slug: &str, brand_id: Option<i64>) -> CreateContentRecord {
    let mut title = LanguageMap::new();
    title.insert(LanguageCode::parse("en").unwrap(), format!("Title {slug}"));
    CreateContentRecord {
        kind: ContentKind::New,
        slug: slug.to_string(),
        state: RecordState::Published,
        title,
        content: LanguageMap::new(),
        excerpt: LanguageMap::new(),
        custom_fields: serde_json::Map::new(),
        brand_id,
        model_id: None,
        location: None,
        media: serde_json::Map::new(),
        published_at: None,
    }
}

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_create_and_update_site(pool: PgPool) {
    let site = SyncSiteRepo::create(&pool, &new_site("Adria", "https://adria.example/"))
        .await
        .unwrap();
    assert_eq!(site.url, "https://adria.example");
    assert!(site.is_active);
    assert!(site.sync_all_brands);

    let updated = SyncSiteRepo::update(
        &pool,
        site.id,
        &UpdateSyncSite {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert!(!updated.is_active);
    assert_eq!(updated.name, "Adria");

    let active = SyncSiteRepo::list_active(&pool).await.unwrap();
    assert!(active.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_site_url_rejected(pool: PgPool) {
    SyncSiteRepo::create(&pool, &new_site("A", "https://dup.example"))
        .await
        .unwrap();
    let result = SyncSiteRepo::create(&pool, &new_site("B", "https://dup.example")).await;
    assert!(result.is_err(), "Duplicate site URL should fail");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_replace_restrictions_round_trips_model_rules(pool: PgPool) {
    let brand = CatalogRepo::upsert_brand(&pool, "Galeon").await.unwrap();
    let model = CatalogRepo::upsert_model(&pool, brand, "500 Fly").await.unwrap();
    let site = SyncSiteRepo::create(&pool, &new_site("Adria", "https://adria.example"))
        .await
        .unwrap();

    SyncSiteRepo::replace_restrictions(
        &pool,
        site.id,
        &[BrandRestriction {
            brand_id: brand,
            allowed: true,
            filter_mode: FilterMode::SelectedModels,
            model_rules: vec![ModelRule { model_id: model, allowed: true }],
        }],
    )
    .await
    .unwrap();

    let loaded = SyncSiteRepo::find_by_id(&pool, site.id).await.unwrap().unwrap();
    assert_eq!(loaded.brand_restrictions.len(), 1);
    assert_eq!(loaded.brand_restrictions[0].filter_mode, FilterMode::SelectedModels);
    assert_eq!(loaded.brand_restrictions[0].model_rules[0].model_id, model);
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_claim_is_exclusive(pool: PgPool) {
    let site = SyncSiteRepo::create(&pool, &new_site("Adria", "https://adria.example"))
        .await
        .unwrap();
    let record = ContentRecordRepo::create(&pool, &new_record("yacht-1", None))
        .await
        .unwrap();

    let first = SyncStatusRepo::claim(&pool, site.id, record.id, false, 600)
        .await
        .unwrap();
    let second = SyncStatusRepo::claim(&pool, site.id, record.id, false, 600)
        .await
        .unwrap();
    assert!(first.is_some());
    assert!(second.is_none(), "A claimed pair must not be claimed twice");

    let done = SyncStatusRepo::complete(&pool, site.id, record.id, first.unwrap(), Ok(()))
        .await
        .unwrap();
    assert!(done);

    let map = SyncStatusRepo::status_map(&pool, site.id).await.unwrap();
    assert_eq!(map.get(&record.id), Some(&SyncState::Synced));

    // A synced row is only claimable again under force.
    assert!(SyncStatusRepo::claim(&pool, site.id, record.id, false, 600)
        .await
        .unwrap()
        .is_none());
    assert!(SyncStatusRepo::claim(&pool, site.id, record.id, true, 600)
        .await
        .unwrap()
        .is_some());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_mark_pending_during_dispatch_keeps_row_dirty(pool: PgPool) {
    let site = SyncSiteRepo::create(&pool, &new_site("Adria", "https://adria.example"))
        .await
        .unwrap();
    let record = ContentRecordRepo::create(&pool, &new_record("yacht-2", None))
        .await
        .unwrap();

    let token = SyncStatusRepo::claim(&pool, site.id, record.id, false, 600)
        .await
        .unwrap()
        .unwrap();
    SyncStatusRepo::mark_record_pending(&pool, record.id)
        .await
        .unwrap();
    SyncStatusRepo::complete(&pool, site.id, record.id, token, Ok(()))
        .await
        .unwrap();

    let map = SyncStatusRepo::status_map(&pool, site.id).await.unwrap();
    assert_eq!(map.get(&record.id), Some(&SyncState::Pending));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_failed_dispatch_records_error(pool: PgPool) {
    let site = SyncSiteRepo::create(&pool, &new_site("Adria", "https://adria.example"))
        .await
        .unwrap();
    let record = ContentRecordRepo::create(&pool, &new_record("yacht-3", None))
        .await
        .unwrap();

    let token = SyncStatusRepo::claim(&pool, site.id, record.id, false, 600)
        .await
        .unwrap()
        .unwrap();
    SyncStatusRepo::complete(&pool, site.id, record.id, token, Err("HTTP 500"))
        .await
        .unwrap();

    let rows = SyncStatusRepo::list_for_site(&pool, site.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "failed");
    assert_eq!(rows[0].last_error.as_deref(), Some("HTTP 500"));
    assert_eq!(rows[0].slug, "yacht-3");
}
