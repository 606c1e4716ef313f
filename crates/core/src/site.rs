//! Target site configuration and brand/model eligibility.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::language::LanguageCode;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// AuthScheme
// ---------------------------------------------------------------------------

/// How the API key is presented to the target site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `X-API-Key: <key>`
    #[default]
    ApiKeyHeader,
    /// `Authorization: Bearer <key>`
    Bearer,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKeyHeader => "api_key_header",
            Self::Bearer => "bearer",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "api_key_header" => Ok(Self::ApiKeyHeader),
            "bearer" => Ok(Self::Bearer),
            other => Err(CoreError::Validation(format!(
                "Unknown auth scheme '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Brand restrictions
// ---------------------------------------------------------------------------

/// Whether a brand restriction covers every model of the brand or only the
/// models listed in its model rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    AllModels,
    SelectedModels,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllModels => "all_models",
            Self::SelectedModels => "selected_models",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "all_models" => Ok(Self::AllModels),
            "selected_models" => Ok(Self::SelectedModels),
            other => Err(CoreError::Validation(format!(
                "Unknown filter mode '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRule {
    pub model_id: DbId,
    pub allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandRestriction {
    pub brand_id: DbId,
    pub allowed: bool,
    #[serde(default)]
    pub filter_mode: FilterMode,
    #[serde(default)]
    pub model_rules: Vec<ModelRule>,
}

// ---------------------------------------------------------------------------
// SyncSite
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSite {
    pub id: DbId,
    pub name: String,
    /// Base URL of the site's importer, without trailing slash.
    pub url: String,
    /// Site-specific key; `None` falls back to the process-wide default.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub auth_scheme: AuthScheme,
    pub is_active: bool,
    pub default_language: LanguageCode,
    pub supported_languages: Vec<LanguageCode>,
    pub sync_all_brands: bool,
    pub brand_restrictions: Vec<BrandRestriction>,
    pub sort_order: i32,
    pub last_synced_at: Option<Timestamp>,
    pub last_sync_result: Option<serde_json::Value>,
}

impl SyncSite {
    /// Site key when set and non-blank, else `default_key`.
    pub fn resolve_api_key<'a>(&'a self, default_key: Option<&'a str>) -> Option<&'a str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| default_key.map(str::trim).filter(|k| !k.is_empty()))
    }

    /// Whether a record with this brand/model pair may be sent to the site.
    ///
    /// Precedence: all-brands flag, then brandless records, then a model
    /// rule inside the brand's restriction, then the brand's own flag when it
    /// covers all models. Everything else is denied.
    pub fn is_eligible(&self, brand_id: Option<DbId>, model_id: Option<DbId>) -> bool {
        if self.sync_all_brands {
            return true;
        }
        let Some(brand_id) = brand_id else {
            return true;
        };
        let Some(restriction) = self
            .brand_restrictions
            .iter()
            .find(|r| r.brand_id == brand_id)
        else {
            return false;
        };

        if let Some(model_id) = model_id {
            if let Some(rule) = restriction
                .model_rules
                .iter()
                .find(|rule| rule.model_id == model_id)
            {
                return rule.allowed;
            }
        }

        match restriction.filter_mode {
            FilterMode::AllModels => restriction.allowed,
            FilterMode::SelectedModels => false,
        }
    }

    /// Endpoint receiving import payloads.
    pub fn import_url(&self) -> String {
        format!("{}/sync/import", self.url.trim_end_matches('/'))
    }
}

/// Active sites ordered by `sort_order`, then id.
pub fn active_sites(mut sites: Vec<SyncSite>) -> Vec<SyncSite> {
    sites.retain(|s| s.is_active);
    sites.sort_by_key(|s| (s.sort_order, s.id));
    sites
}
