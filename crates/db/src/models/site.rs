//! Sync site and brand restriction rows (`sync_sites`,
//! `sync_site_brand_restrictions`).

use serde::Deserialize;
use sqlx::FromRow;
use validator::Validate;
use yachtsync_core::error::CoreError;
use yachtsync_core::language::{parse_codes, LanguageCode};
use yachtsync_core::site::{AuthScheme, BrandRestriction, FilterMode, SyncSite};
use yachtsync_core::types::{DbId, Timestamp};

use super::decode_json;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `sync_sites` table.
#[derive(Debug, Clone, FromRow)]
pub struct SyncSiteRow {
    pub id: DbId,
    pub name: String,
    pub url: String,
    pub api_key: Option<String>,
    pub auth_scheme: String,
    pub is_active: bool,
    pub default_language: String,
    pub supported_languages: Vec<String>,
    pub sync_all_brands: bool,
    pub sort_order: i32,
    pub last_synced_at: Option<Timestamp>,
    pub last_sync_result: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `sync_site_brand_restrictions` table.
#[derive(Debug, Clone, FromRow)]
pub struct BrandRestrictionRow {
    pub id: DbId,
    pub site_id: DbId,
    pub brand_id: DbId,
    pub allowed: bool,
    pub filter_mode: String,
    pub model_rules: serde_json::Value,
}

impl TryFrom<BrandRestrictionRow> for BrandRestriction {
    type Error = CoreError;

    fn try_from(row: BrandRestrictionRow) -> Result<Self, Self::Error> {
        Ok(BrandRestriction {
            brand_id: row.brand_id,
            allowed: row.allowed,
            filter_mode: FilterMode::parse(&row.filter_mode)?,
            model_rules: decode_json("model_rules", row.model_rules)?,
        })
    }
}

impl SyncSiteRow {
    /// Combine the row with its restriction rows into a domain site.
    pub fn into_site(self, restrictions: Vec<BrandRestrictionRow>) -> Result<SyncSite, CoreError> {
        let brand_restrictions = restrictions
            .into_iter()
            .filter(|r| r.site_id == self.id)
            .map(BrandRestriction::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SyncSite {
            id: self.id,
            name: self.name,
            url: self.url,
            api_key: self.api_key,
            auth_scheme: AuthScheme::parse(&self.auth_scheme)?,
            is_active: self.is_active,
            default_language: LanguageCode::parse(&self.default_language)?,
            supported_languages: parse_codes(&self.supported_languages)?,
            sync_all_brands: self.sync_all_brands,
            brand_restrictions,
            sort_order: self.sort_order,
            last_synced_at: self.last_synced_at,
            last_sync_result: self.last_sync_result,
        })
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating a sync site.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSyncSite {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(url)]
    pub url: String,
    pub api_key: Option<String>,
    pub auth_scheme: Option<AuthScheme>,
    pub is_active: Option<bool>,
    pub default_language: String,
    #[validate(length(min = 1))]
    pub supported_languages: Vec<String>,
    pub sync_all_brands: Option<bool>,
    pub sort_order: Option<i32>,
}

// ---------------------------------------------------------------------------
// Update DTO
// ---------------------------------------------------------------------------

/// Input for updating a sync site. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSyncSite {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(url)]
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub auth_scheme: Option<AuthScheme>,
    pub is_active: Option<bool>,
    pub default_language: Option<String>,
    pub supported_languages: Option<Vec<String>>,
    pub sync_all_brands: Option<bool>,
    pub sort_order: Option<i32>,
}
