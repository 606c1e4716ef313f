//! Repository for the `sync_sites` and `sync_site_brand_restrictions` tables.

use sqlx::PgPool;
use yachtsync_core::language::{parse_codes, LanguageCode};
use yachtsync_core::site::{BrandRestriction, SyncSite};
use yachtsync_core::types::DbId;

use crate::models::site::{BrandRestrictionRow, CreateSyncSite, SyncSiteRow, UpdateSyncSite};
use crate::DbError;

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const SITE_COLUMNS: &str = "\
    id, name, url, api_key, auth_scheme, is_active, default_language, \
    supported_languages, sync_all_brands, sort_order, last_synced_at, \
    last_sync_result, created_at, updated_at";

const RESTRICTION_COLUMNS: &str = "id, site_id, brand_id, allowed, filter_mode, model_rules";

/// Site registry persistence. Every read returns sites with their brand
/// restrictions attached.
pub struct SyncSiteRepo;

impl SyncSiteRepo {
    /// All sites ordered by `sort_order`, then id.
    pub async fn list(pool: &PgPool) -> Result<Vec<SyncSite>, DbError> {
        let query = format!("SELECT {SITE_COLUMNS} FROM sync_sites ORDER BY sort_order, id");
        let rows = sqlx::query_as::<_, SyncSiteRow>(&query)
            .fetch_all(pool)
            .await?;
        Self::attach_restrictions(pool, rows).await
    }

    /// Active sites ordered by `sort_order`, then id.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<SyncSite>, DbError> {
        let query = format!(
            "SELECT {SITE_COLUMNS} FROM sync_sites WHERE is_active \
             ORDER BY sort_order, id"
        );
        let rows = sqlx::query_as::<_, SyncSiteRow>(&query)
            .fetch_all(pool)
            .await?;
        Self::attach_restrictions(pool, rows).await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SyncSite>, DbError> {
        let query = format!("SELECT {SITE_COLUMNS} FROM sync_sites WHERE id = $1");
        let row = sqlx::query_as::<_, SyncSiteRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        match row {
            Some(row) => {
                let restrictions = Self::restriction_rows(pool, &[row.id]).await?;
                Ok(Some(row.into_site(restrictions)?))
            }
            None => Ok(None),
        }
    }

    /// Create a site. Language codes are validated before the insert.
    pub async fn create(pool: &PgPool, input: &CreateSyncSite) -> Result<SyncSite, DbError> {
        let default_language = LanguageCode::parse(&input.default_language)?;
        let supported = codes_to_strings(parse_codes(&input.supported_languages)?);

        let query = format!(
            "INSERT INTO sync_sites \
                 (name, url, api_key, auth_scheme, is_active, default_language, \
                  supported_languages, sync_all_brands, sort_order) \
             VALUES ($1, $2, $3, COALESCE($4, 'api_key_header'), COALESCE($5, TRUE), $6, $7, \
                     COALESCE($8, TRUE), COALESCE($9, 0)) \
             RETURNING {SITE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SyncSiteRow>(&query)
            .bind(&input.name)
            .bind(input.url.trim_end_matches('/'))
            .bind(&input.api_key)
            .bind(input.auth_scheme.map(|s| s.as_str()))
            .bind(input.is_active)
            .bind(default_language.as_str())
            .bind(&supported)
            .bind(input.sync_all_brands)
            .bind(input.sort_order)
            .fetch_one(pool)
            .await?;
        Ok(row.into_site(Vec::new())?)
    }

    /// Update a site's settings. Returns `None` when the site does not exist.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateSyncSite,
    ) -> Result<Option<SyncSite>, DbError> {
        let default_language = input
            .default_language
            .as_deref()
            .map(LanguageCode::parse)
            .transpose()?;
        let supported = input
            .supported_languages
            .as_deref()
            .map(parse_codes)
            .transpose()?
            .map(codes_to_strings);

        let query = format!(
            "UPDATE sync_sites SET \
                 name = COALESCE($2, name), \
                 url = COALESCE($3, url), \
                 api_key = COALESCE($4, api_key), \
                 auth_scheme = COALESCE($5, auth_scheme), \
                 is_active = COALESCE($6, is_active), \
                 default_language = COALESCE($7, default_language), \
                 supported_languages = COALESCE($8, supported_languages), \
                 sync_all_brands = COALESCE($9, sync_all_brands), \
                 sort_order = COALESCE($10, sort_order), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {SITE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SyncSiteRow>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(input.url.as_deref().map(|u| u.trim_end_matches('/')))
            .bind(&input.api_key)
            .bind(input.auth_scheme.map(|s| s.as_str()))
            .bind(input.is_active)
            .bind(default_language.as_ref().map(LanguageCode::as_str))
            .bind(&supported)
            .bind(input.sync_all_brands)
            .bind(input.sort_order)
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => {
                let restrictions = Self::restriction_rows(pool, &[row.id]).await?;
                Ok(Some(row.into_site(restrictions)?))
            }
            None => Ok(None),
        }
    }

    /// Replace every brand restriction of a site in one transaction.
    pub async fn replace_restrictions(
        pool: &PgPool,
        site_id: DbId,
        restrictions: &[BrandRestriction],
    ) -> Result<Vec<BrandRestriction>, DbError> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM sync_site_brand_restrictions WHERE site_id = $1")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO sync_site_brand_restrictions \
                 (site_id, brand_id, allowed, filter_mode, model_rules) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {RESTRICTION_COLUMNS}"
        );
        let mut saved = Vec::with_capacity(restrictions.len());
        for restriction in restrictions {
            let model_rules = serde_json::to_value(&restriction.model_rules)
                .map_err(|e| yachtsync_core::error::CoreError::Internal(e.to_string()))?;
            let row = sqlx::query_as::<_, BrandRestrictionRow>(&query)
                .bind(site_id)
                .bind(restriction.brand_id)
                .bind(restriction.allowed)
                .bind(restriction.filter_mode.as_str())
                .bind(model_rules)
                .fetch_one(&mut *tx)
                .await?;
            saved.push(BrandRestriction::try_from(row)?);
        }

        tx.commit().await?;
        Ok(saved)
    }

    /// Persist the outcome of a run. Always stamps `last_synced_at`.
    pub async fn record_sync_result(
        pool: &PgPool,
        site_id: DbId,
        result: &serde_json::Value,
    ) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE sync_sites SET last_synced_at = NOW(), last_sync_result = $2, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(site_id)
        .bind(result)
        .execute(pool)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn restriction_rows(
        pool: &PgPool,
        site_ids: &[DbId],
    ) -> Result<Vec<BrandRestrictionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {RESTRICTION_COLUMNS} FROM sync_site_brand_restrictions \
             WHERE site_id = ANY($1) ORDER BY site_id, brand_id"
        );
        sqlx::query_as::<_, BrandRestrictionRow>(&query)
            .bind(site_ids)
            .fetch_all(pool)
            .await
    }

    async fn attach_restrictions(
        pool: &PgPool,
        rows: Vec<SyncSiteRow>,
    ) -> Result<Vec<SyncSite>, DbError> {
        let ids: Vec<DbId> = rows.iter().map(|r| r.id).collect();
        let restrictions = Self::restriction_rows(pool, &ids).await?;
        rows.into_iter()
            .map(|row| {
                let own = restrictions
                    .iter()
                    .filter(|r| r.site_id == row.id)
                    .cloned()
                    .collect();
                row.into_site(own).map_err(DbError::from)
            })
            .collect()
    }
}

fn codes_to_strings(codes: Vec<LanguageCode>) -> Vec<String> {
    codes.into_iter().map(String::from).collect()
}
