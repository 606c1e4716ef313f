//! Import request parsing and payload-level validation.
//!
//! Everything here runs before the store is touched: a payload that fails
//! validation produces no side effects at all.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use yachtsync_core::language::LanguageCode;
use yachtsync_core::record::ContentKind;
use yachtsync_core::snapshot::{LanguageBundle, TaxonomyPayload};
use yachtsync_core::types::Timestamp;

use crate::error::{ImportError, ImportResult};

/// Request body of `POST /sync/import`.
///
/// The default-language bundle may come as `defaultData` or as flat
/// `title`/`content`/`excerpt` keys on `data`.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default = "default_true")]
    pub import_media: bool,
    pub data: Option<ImportData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportData {
    pub source_id: Option<String>,
    pub slug: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub default_language: Option<String>,
    pub published_at: Option<Timestamp>,
    #[serde(rename = "defaultData")]
    pub default_data: Option<LanguageBundle>,
    pub title: Option<String>,
    #[serde(alias = "description")]
    pub content: Option<String>,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub translations: BTreeMap<String, LanguageBundle>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub media: BTreeMap<String, Value>,
    #[serde(default)]
    pub taxonomies: Vec<TaxonomyPayload>,
    pub featured_image: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Local post type a content type is stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostType {
    Yacht,
    News,
}

impl PostType {
    pub fn for_kind(kind: ContentKind) -> Self {
        match kind {
            ContentKind::New | ContentKind::Used => Self::Yacht,
            ContentKind::News => Self::News,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yacht => "yacht",
            Self::News => "news",
        }
    }
}

/// A validated import: every language bundle keyed by a parsed code, the
/// default language first.
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub source_id: String,
    pub slug: String,
    pub kind: ContentKind,
    pub default_language: LanguageCode,
    pub published_at: Option<Timestamp>,
    pub languages: Vec<(LanguageCode, LanguageBundle)>,
    pub custom_fields: BTreeMap<String, Value>,
    pub media: BTreeMap<String, Value>,
    pub taxonomies: Vec<TaxonomyPayload>,
    pub featured_image: Option<String>,
    pub import_media: bool,
}

impl ImportJob {
    pub fn post_type(&self) -> PostType {
        PostType::for_kind(self.kind)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_kind(raw: &str) -> ImportResult<ContentKind> {
    ContentKind::parse(raw)
        .map_err(|_| ImportError::Validation(format!("unknown content type '{raw}'")))
}

/// Parse and validate a raw request body. `query_type` is the `?type=`
/// parameter, which must agree with any type given in the body.
pub fn parse(body: &[u8], query_type: Option<&str>) -> ImportResult<ImportJob> {
    let request: ImportRequest = serde_json::from_slice(body)
        .map_err(|e| ImportError::Validation(format!("malformed payload: {e}")))?;
    validate(request, query_type)
}

pub fn validate(request: ImportRequest, query_type: Option<&str>) -> ImportResult<ImportJob> {
    let data = request
        .data
        .ok_or_else(|| ImportError::Validation("payload has no data".into()))?;

    let mut kind = None;
    for raw in [query_type.map(str::to_string), request.kind, data.kind.clone()]
        .into_iter()
        .flatten()
        .filter(|raw| !raw.trim().is_empty())
    {
        let parsed = parse_kind(raw.trim())?;
        match kind {
            Some(existing) if existing != parsed => {
                return Err(ImportError::Validation(format!(
                    "conflicting content types '{existing}' and '{parsed}'"
                )));
            }
            _ => kind = Some(parsed),
        }
    }
    let kind = kind.ok_or_else(|| ImportError::Validation("payload has no type".into()))?;

    let slug = non_blank(data.slug)
        .ok_or_else(|| ImportError::Validation("payload has no slug".into()))?;
    let source_id = non_blank(data.source_id)
        .ok_or_else(|| ImportError::Validation("payload has no source_id".into()))?;

    let mut translations = BTreeMap::new();
    for (code, bundle) in data.translations {
        let lang = LanguageCode::parse(&code).map_err(|e| ImportError::Validation(e.to_string()))?;
        translations.insert(lang, bundle);
    }

    let default_language = match non_blank(data.default_language) {
        Some(code) => LanguageCode::parse(&code).map_err(|e| ImportError::Validation(e.to_string()))?,
        None => translations
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| ImportError::Validation("payload has no default_language".into()))?,
    };

    let flat = LanguageBundle {
        title: data.title,
        content: data.content,
        excerpt: data.excerpt,
        custom_fields: BTreeMap::new(),
    };
    let default_bundle = translations
        .remove(&default_language)
        .or(data.default_data)
        .unwrap_or(flat);

    if non_blank(default_bundle.title.clone()).is_none() {
        return Err(ImportError::Validation(format!(
            "payload has no title in default language '{default_language}'"
        )));
    }

    let mut languages = Vec::with_capacity(translations.len() + 1);
    languages.push((default_language.clone(), default_bundle));
    languages.extend(translations);

    Ok(ImportJob {
        source_id,
        slug,
        kind,
        default_language,
        published_at: data.published_at,
        languages,
        custom_fields: data.custom_fields,
        media: data.media,
        taxonomies: data.taxonomies,
        featured_image: non_blank(data.featured_image),
        import_media: request.import_media,
    })
}
