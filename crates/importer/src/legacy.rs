//! Adapter for flat payloads that spell languages as key suffixes
//! (`title_en`, `title_sl`, `sub_title_en`) instead of language maps.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use yachtsync_core::language::LanguageCode;
use yachtsync_core::snapshot::{LanguageBundle, TaxonomyPayload};

use crate::error::{ImportError, ImportResult};
use crate::payload::{ImportData, ImportRequest};

const CORE_FIELDS: [&str; 4] = ["title", "content", "description", "excerpt"];

/// Request body of `POST /sync/import-legacy`.
#[derive(Debug, Deserialize)]
pub struct LegacyRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default = "default_true")]
    pub import_media: bool,
    /// Languages to look for; the importer's configured set when absent.
    pub languages: Option<Vec<String>>,
    pub default_language: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

/// Split `key` into its base and language when it ends in `_{lang}`.
/// Hyphenated codes match with either separator (`_pt-br`, `_pt_br`).
fn split_suffix<'a>(key: &'a str, languages: &[LanguageCode]) -> Option<(&'a str, LanguageCode)> {
    languages
        .iter()
        .filter_map(|lang| {
            let dashed = format!("_{}", lang.as_str());
            let underscored = format!("_{}", lang.as_str().replace('-', "_"));
            key.strip_suffix(&dashed)
                .or_else(|| key.strip_suffix(&underscored))
                .filter(|base| !base.is_empty())
                .map(|base| (base, lang.clone()))
        })
        // Longest language code first, so `_pt_br` is not read as `_br`.
        .max_by_key(|(base, _)| std::cmp::Reverse(base.len()))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn set_core(bundle: &mut LanguageBundle, field: &str, value: &Value) {
    let text = as_text(value);
    match field {
        "title" => bundle.title = text,
        "content" | "description" => bundle.content = text,
        _ => bundle.excerpt = text,
    }
}

fn parse_languages(raw: &[String]) -> ImportResult<Vec<LanguageCode>> {
    raw.iter()
        .map(|code| LanguageCode::parse(code).map_err(|e| ImportError::Validation(e.to_string())))
        .collect()
}

/// Convert a legacy body into a regular [`ImportRequest`].
///
/// Suffixed keys become per-language values, unsuffixed keys are shared.
/// A missing `source_id` is derived from the slug.
pub fn to_request(legacy: LegacyRequest, configured: &[LanguageCode]) -> ImportResult<ImportRequest> {
    let languages = match &legacy.languages {
        Some(raw) => parse_languages(raw)?,
        None => configured.to_vec(),
    };

    let mut data = ImportData {
        default_language: legacy.default_language.clone(),
        ..ImportData::default()
    };
    let mut bundles: BTreeMap<LanguageCode, LanguageBundle> = BTreeMap::new();

    for (key, value) in legacy.data {
        match key.as_str() {
            "source_id" => data.source_id = as_text(&value),
            "slug" => data.slug = as_text(&value),
            "type" => data.kind = as_text(&value),
            "default_language" => data.default_language = as_text(&value),
            "featured_image" => data.featured_image = as_text(&value),
            "published_at" => {
                data.published_at = serde_json::from_value(value)
                    .map_err(|e| ImportError::Validation(format!("invalid published_at: {e}")))?;
            }
            "media" => {
                data.media = serde_json::from_value(value)
                    .map_err(|e| ImportError::Validation(format!("invalid media: {e}")))?;
            }
            "taxonomies" => {
                data.taxonomies = serde_json::from_value::<Vec<TaxonomyPayload>>(value)
                    .map_err(|e| ImportError::Validation(format!("invalid taxonomies: {e}")))?;
            }
            "custom_fields" => {
                let Value::Object(fields) = value else {
                    return Err(ImportError::Validation("custom_fields must be an object".into()));
                };
                for (field, field_value) in fields {
                    match split_suffix(&field, &languages) {
                        Some((base, lang)) => {
                            bundles
                                .entry(lang)
                                .or_default()
                                .custom_fields
                                .insert(base.to_string(), field_value);
                        }
                        None => {
                            data.custom_fields.insert(field, field_value);
                        }
                    }
                }
            }
            "title" => data.title = as_text(&value),
            "content" | "description" => data.content = as_text(&value),
            "excerpt" => data.excerpt = as_text(&value),
            _ => match split_suffix(&key, &languages) {
                Some((base, lang)) if CORE_FIELDS.contains(&base) => {
                    set_core(bundles.entry(lang).or_default(), base, &value);
                }
                Some((base, lang)) => {
                    bundles
                        .entry(lang)
                        .or_default()
                        .custom_fields
                        .insert(base.to_string(), value);
                }
                None => {
                    data.custom_fields.insert(key, value);
                }
            },
        }
    }

    if data.source_id.is_none() {
        data.source_id = data.slug.as_ref().map(|slug| format!("legacy:{slug}"));
    }
    if data.default_language.is_none() {
        // Prefer the first requested language that has a suffixed title.
        data.default_language = languages
            .iter()
            .find(|lang| bundles.get(*lang).is_some_and(|b| b.title.is_some()))
            .map(|lang| lang.to_string());
    }

    // Languages that only carry custom fields still need core fields to
    // become posts; fall back to the unsuffixed values.
    for bundle in bundles.values_mut() {
        if bundle.title.is_none() {
            bundle.title = data.title.clone();
        }
    }

    data.translations = bundles
        .into_iter()
        .map(|(lang, bundle)| (lang.to_string(), bundle))
        .collect();

    Ok(ImportRequest {
        kind: legacy.kind,
        import_media: legacy.import_media,
        data: Some(data),
    })
}
