//! Site-specific snapshot assembly.
//!
//! [`build`] turns one [`ContentRecord`] into the payload sent to one
//! [`SyncSite`]: the default-language bundle, one translation bundle per
//! applicable language, shared (non-multilingual) fields, media URLs and
//! taxonomy term assignments.
//!
//! Media and shared fields are emitted exactly once at the top level and
//! never duplicated into language bundles.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;
use crate::field::{FieldConfiguration, FieldKind, SelectOption};
use crate::language::{LanguageCode, LanguageMap};
use crate::media::MediaUrlResolver;
use crate::record::{ContentKind, ContentRecord, COVER_COLLECTION};
use crate::site::SyncSite;
use crate::types::{SourceId, Timestamp};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("record has no slug")]
    MissingSlug,

    #[error("record has no title in '{language}'")]
    MissingTitle { language: String },

    #[error("no content in any of the site's languages ({supported})")]
    NoApplicableLanguage { supported: String },
}

impl From<SnapshotError> for SyncError {
    fn from(err: SnapshotError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// Core fields and language-dependent custom fields in one language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageBundle {
    pub title: Option<String>,
    #[serde(alias = "description")]
    pub content: Option<String>,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermPayload {
    pub slug: String,
    pub label: String,
    /// Slug of the parent term, if the taxonomy is hierarchical.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub translations: LanguageMap<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyPayload {
    pub taxonomy: String,
    pub field_key: String,
    pub terms: Vec<TermPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source_id: SourceId,
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub default_language: LanguageCode,
    pub published_at: Option<Timestamp>,
    #[serde(rename = "defaultData")]
    pub default_data: LanguageBundle,
    pub translations: LanguageMap<LanguageBundle>,
    /// Fields shared by every language.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Value>,
    /// Media fields: a URL (or `null`) for image/file, a URL list for gallery.
    #[serde(default)]
    pub media: BTreeMap<String, Value>,
    #[serde(default)]
    pub taxonomies: Vec<TaxonomyPayload>,
    pub featured_image: Option<String>,
}

/// Request body sent to a site's importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Whether the target should download media during the request.
    #[serde(default = "default_true")]
    pub import_media: bool,
    pub data: Snapshot,
}

fn default_true() -> bool {
    true
}

impl SyncEnvelope {
    pub fn new(data: Snapshot, import_media: bool) -> Self {
        Self {
            kind: data.kind,
            import_media,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Fields whose resolved value depends on the language.
fn is_language_dependent(config: &FieldConfiguration) -> bool {
    !config.kind.is_media() && (config.is_multilingual || config.kind.taxonomy_options().is_some())
}

/// Languages the record has any content for.
fn record_languages(record: &ContentRecord, configs: &[&FieldConfiguration]) -> HashSet<LanguageCode> {
    let mut langs: HashSet<LanguageCode> = record
        .title
        .filled_languages()
        .chain(record.content.filled_languages())
        .chain(record.excerpt.filled_languages())
        .cloned()
        .collect();

    for config in configs.iter().filter(|c| c.is_multilingual) {
        if let Some(Value::Object(values)) = record.custom_fields.get(&config.field_key) {
            for (code, value) in values {
                if value.is_null() {
                    continue;
                }
                if let Ok(lang) = LanguageCode::parse(code) {
                    langs.insert(lang);
                }
            }
        }
    }
    langs
}

/// Build the snapshot of `record` for `site`.
///
/// `field_configs` may contain configurations for any entity type; only the
/// ones matching the record's entity type are used, in `order`.
pub fn build(
    record: &ContentRecord,
    site: &SyncSite,
    field_configs: &[FieldConfiguration],
    media: &dyn MediaUrlResolver,
) -> Result<Snapshot, SnapshotError> {
    if record.slug.trim().is_empty() {
        return Err(SnapshotError::MissingSlug);
    }

    let entity_type = record.kind.entity_type();
    let mut configs: Vec<&FieldConfiguration> = field_configs
        .iter()
        .filter(|c| c.entity_type == entity_type)
        .collect();
    configs.sort_by_key(|c| (c.order, c.id));

    let available = record_languages(record, &configs);
    let languages: Vec<LanguageCode> = site
        .supported_languages
        .iter()
        .filter(|lang| available.contains(lang))
        .cloned()
        .collect();

    let Some(first) = languages.first() else {
        return Err(SnapshotError::NoApplicableLanguage {
            supported: site
                .supported_languages
                .iter()
                .map(LanguageCode::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        });
    };

    let default_language = if languages.contains(&site.default_language) {
        site.default_language.clone()
    } else {
        first.clone()
    };

    if record.title.text(&default_language).is_none() {
        return Err(SnapshotError::MissingTitle {
            language: default_language.to_string(),
        });
    }

    let bundle_for = |lang: &LanguageCode| -> LanguageBundle {
        let custom_fields = configs
            .iter()
            .filter(|c| is_language_dependent(c))
            .map(|c| {
                let value = resolve_field_value(record, c, lang, &default_language, media);
                (c.field_key.clone(), value.unwrap_or(Value::Null))
            })
            .collect();
        LanguageBundle {
            title: record.title.text(lang).map(str::to_string),
            content: record.content.text(lang).map(str::to_string),
            excerpt: record.excerpt.text(lang).map(str::to_string),
            custom_fields,
        }
    };

    // The receiver cannot create a post without a title.
    let languages: Vec<LanguageCode> = languages
        .into_iter()
        .filter(|lang| record.title.text(lang).is_some())
        .collect();

    let default_data = bundle_for(&default_language);
    let translations: LanguageMap<LanguageBundle> = languages
        .iter()
        .map(|lang| (lang.clone(), bundle_for(lang)))
        .collect();

    let mut custom_fields = BTreeMap::new();
    let mut media_fields = BTreeMap::new();
    for config in &configs {
        if is_language_dependent(config) {
            continue;
        }
        let value = resolve_field_value(record, config, &default_language, &default_language, media)
            .unwrap_or(Value::Null);
        if config.kind.is_media() {
            media_fields.insert(config.field_key.clone(), value);
        } else {
            custom_fields.insert(config.field_key.clone(), value);
        }
    }

    let taxonomies = configs
        .iter()
        .filter_map(|c| taxonomy_payload(record, c, &languages))
        .collect();

    Ok(Snapshot {
        source_id: record.source_id,
        slug: record.slug.trim().to_string(),
        kind: record.kind,
        default_language,
        published_at: record.published_at,
        default_data,
        translations,
        custom_fields,
        media: media_fields,
        taxonomies,
        featured_image: media.url_for(record, COVER_COLLECTION),
    })
}

// ---------------------------------------------------------------------------
// Field resolution
// ---------------------------------------------------------------------------

fn plain_value(record: &ContentRecord, config: &FieldConfiguration, lang: &LanguageCode) -> Option<Value> {
    if config.is_multilingual {
        record.field_in(&config.field_key, lang).cloned()
    } else {
        record
            .custom_fields
            .get(&config.field_key)
            .filter(|v| !v.is_null())
            .cloned()
    }
}

fn option_label(options: &[SelectOption], raw: &Value, lang: &LanguageCode) -> Value {
    let Some(raw_str) = raw.as_str() else {
        return raw.clone();
    };
    options
        .iter()
        .find(|o| o.value == raw_str)
        .map(|o| Value::String(o.label_for(lang).to_string()))
        .unwrap_or_else(|| raw.clone())
}

/// Resolve one configured field for one language.
///
/// Returns `None` when the value is absent. Media fields only resolve for
/// the default language since media is shared across translations.
pub fn resolve_field_value(
    record: &ContentRecord,
    config: &FieldConfiguration,
    lang: &LanguageCode,
    default_language: &LanguageCode,
    media: &dyn MediaUrlResolver,
) -> Option<Value> {
    let key = config.field_key.as_str();
    match &config.kind {
        FieldKind::Image | FieldKind::File => {
            if lang != default_language {
                return None;
            }
            media.url_for(record, key).map(Value::String)
        }
        FieldKind::Gallery => {
            if lang != default_language {
                return None;
            }
            let urls = media.urls_for(record, key);
            (!urls.is_empty()).then(|| Value::Array(urls.into_iter().map(Value::String).collect()))
        }
        FieldKind::Select {
            options,
            sync_as_taxonomy: true,
            ..
        } => plain_value(record, config, lang).map(|raw| option_label(options, &raw, lang)),
        FieldKind::Checkbox {
            options,
            sync_as_taxonomy: true,
            ..
        } => plain_value(record, config, lang).map(|raw| match raw {
            Value::Array(items) => Value::Array(
                items.iter().map(|item| option_label(options, item, lang)).collect(),
            ),
            single => option_label(options, &single, lang),
        }),
        FieldKind::BrandRef => plain_value(record, config, lang)
            .or_else(|| record.brand.as_ref().map(|b| Value::String(b.name.clone()))),
        FieldKind::ModelRef => plain_value(record, config, lang)
            .or_else(|| record.model.as_ref().map(|m| Value::String(m.name.clone()))),
        FieldKind::Text
        | FieldKind::Textarea
        | FieldKind::RichText
        | FieldKind::Number
        | FieldKind::Date
        | FieldKind::Select { .. }
        | FieldKind::Checkbox { .. }
        | FieldKind::Repeater => plain_value(record, config, lang),
    }
}

/// Selected option values of a taxonomy field (single value or list).
fn selected_values(record: &ContentRecord, config: &FieldConfiguration, lang: &LanguageCode) -> Vec<String> {
    match plain_value(record, config, lang) {
        Some(Value::String(s)) if !s.is_empty() => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn taxonomy_payload(
    record: &ContentRecord,
    config: &FieldConfiguration,
    languages: &[LanguageCode],
) -> Option<TaxonomyPayload> {
    let (options, _) = config.kind.taxonomy_options()?;
    let taxonomy = config.taxonomy_name()?.to_string();

    // Taxonomy values are stored language-neutral; read through the first
    // language for multilingual configurations.
    let lang = languages.first()?;
    let mut wanted: Vec<String> = selected_values(record, config, lang);
    if wanted.is_empty() {
        return None;
    }

    // Pull in ancestors so the receiver can create parents first.
    let mut seen: HashSet<String> = wanted.iter().cloned().collect();
    let mut i = 0;
    while i < wanted.len() {
        let parent = options
            .iter()
            .find(|o| o.value == wanted[i])
            .and_then(|o| o.parent.clone());
        if let Some(parent) = parent {
            if seen.insert(parent.clone()) {
                wanted.push(parent);
            }
        }
        i += 1;
    }

    let terms = wanted
        .iter()
        .map(|value| match options.iter().find(|o| &o.value == value) {
            Some(option) => TermPayload {
                slug: option.value.clone(),
                label: option.label.clone(),
                parent: option.parent.clone(),
                translations: languages
                    .iter()
                    .map(|l| (l.clone(), option.label_for(l).to_string()))
                    .collect(),
            },
            None => TermPayload {
                slug: value.clone(),
                label: value.clone(),
                parent: None,
                translations: LanguageMap::new(),
            },
        })
        .collect();

    Some(TaxonomyPayload {
        taxonomy,
        field_key: config.field_key.clone(),
        terms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::EntityType;
    use crate::media::PublicMediaUrls;
    use crate::record::{BrandRef, MediaRef, RecordState};
    use crate::site::AuthScheme;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::parse(code).unwrap()
    }

    fn text_map(pairs: &[(&str, &str)]) -> LanguageMap<String> {
        pairs.iter().map(|(l, v)| (lang(l), v.to_string())).collect()
    }

    fn config(id: i64, key: &str, kind: FieldKind, multilingual: bool) -> FieldConfiguration {
        FieldConfiguration {
            id,
            entity_type: EntityType::Yacht,
            field_key: key.into(),
            kind,
            is_multilingual: multilingual,
            is_required: false,
            group: None,
            order: id as i32,
        }
    }

    fn hull_options() -> Vec<SelectOption> {
        vec![
            SelectOption {
                value: "motor".into(),
                label: "Motor".into(),
                translations: text_map(&[("sl", "Motorna")]),
                parent: None,
            },
            SelectOption {
                value: "flybridge".into(),
                label: "Flybridge".into(),
                translations: LanguageMap::new(),
                parent: Some("motor".into()),
            },
        ]
    }

    fn configs() -> Vec<FieldConfiguration> {
        vec![
            config(1, "sub_title", FieldKind::Text, true),
            config(2, "brand", FieldKind::Text, false),
            config(3, "gallery", FieldKind::Gallery, false),
            config(
                4,
                "hull",
                FieldKind::Select {
                    options: hull_options(),
                    sync_as_taxonomy: true,
                    taxonomy: Some("yacht_type".into()),
                },
                false,
            ),
            config(5, "length", FieldKind::Number, false),
        ]
    }

    fn site() -> SyncSite {
        SyncSite {
            id: 1,
            name: "S".into(),
            url: "https://s.example.com".into(),
            api_key: None,
            auth_scheme: AuthScheme::ApiKeyHeader,
            is_active: true,
            default_language: lang("sl"),
            supported_languages: vec![lang("en"), lang("sl")],
            sync_all_brands: true,
            brand_restrictions: vec![],
            sort_order: 0,
            last_synced_at: None,
            last_sync_result: None,
        }
    }

    fn record() -> ContentRecord {
        ContentRecord {
            id: 7,
            source_id: uuid::Uuid::nil(),
            kind: ContentKind::New,
            slug: "galeon-500-fly".into(),
            state: RecordState::Published,
            title: text_map(&[("en", "Galeon 500 Fly"), ("sl", "Galeon 500 Fly")]),
            content: text_map(&[("sl", "Opis")]),
            excerpt: LanguageMap::new(),
            custom_fields: [
                ("sub_title".to_string(), json!({"en": "Fast", "sl": "Hitra"})),
                ("brand".to_string(), json!("Galeon")),
                ("hull".to_string(), json!("flybridge")),
                ("unconfigured".to_string(), json!("ignored")),
            ]
            .into_iter()
            .collect(),
            brand: Some(BrandRef { id: 3, name: "Galeon".into() }),
            model: None,
            location: None,
            media: [
                (
                    "cover".to_string(),
                    vec![MediaRef { file_name: "cover.jpg".into(), mime_type: None }],
                ),
                (
                    "gallery".to_string(),
                    vec![MediaRef { file_name: "g1.jpg".into(), mime_type: None }],
                ),
            ]
            .into_iter()
            .collect(),
            published_at: None,
            updated_at: chrono::Utc::now(),
        }
    }

    fn media() -> PublicMediaUrls {
        PublicMediaUrls::new("https://cdn.example.com")
    }

    #[test]
    fn multilingual_and_shared_fields_are_split() {
        let snapshot = build(&record(), &site(), &configs(), &media()).unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["defaultData"]["custom_fields"]["sub_title"], "Hitra");
        assert_eq!(json["translations"]["en"]["custom_fields"]["sub_title"], "Fast");
        assert_eq!(json["translations"]["sl"]["custom_fields"]["sub_title"], "Hitra");
        assert_eq!(json["custom_fields"]["brand"], "Galeon");
        assert!(json["translations"]["en"]["custom_fields"].get("brand").is_none());
        assert!(json["defaultData"]["custom_fields"].get("brand").is_none());
    }

    #[test]
    fn unconfigured_keys_are_ignored() {
        let snapshot = build(&record(), &site(), &configs(), &media()).unwrap();
        assert!(!snapshot.custom_fields.contains_key("unconfigured"));
    }

    #[test]
    fn missing_values_are_null_not_empty() {
        let snapshot = build(&record(), &site(), &configs(), &media()).unwrap();
        assert_eq!(snapshot.custom_fields["length"], Value::Null);
        assert_eq!(snapshot.translations.get(&lang("en")).unwrap().content, None);
    }

    #[test]
    fn media_only_emitted_once_at_top_level() {
        let snapshot = build(&record(), &site(), &configs(), &media()).unwrap();
        assert_eq!(
            snapshot.media["gallery"],
            json!(["https://cdn.example.com/00000000-0000-0000-0000-000000000000/gallery/g1.jpg"])
        );
        for (_, bundle) in snapshot.translations.iter() {
            assert!(!bundle.custom_fields.contains_key("gallery"));
        }
        assert!(snapshot.featured_image.unwrap().ends_with("/cover/cover.jpg"));
    }

    #[test]
    fn media_fields_are_null_outside_default_language() {
        let rec = record();
        let cfg = config(3, "gallery", FieldKind::Gallery, false);
        let value = resolve_field_value(&rec, &cfg, &lang("en"), &lang("sl"), &media());
        assert_eq!(value, None);
        let value = resolve_field_value(&rec, &cfg, &lang("sl"), &lang("sl"), &media());
        assert!(value.is_some());
    }

    #[test]
    fn taxonomy_select_resolves_label_per_language() {
        let mut rec = record();
        rec.custom_fields.insert("hull".into(), json!("motor"));
        let snapshot = build(&rec, &site(), &configs(), &media()).unwrap();
        assert_eq!(snapshot.default_data.custom_fields["hull"], "Motorna");
        assert_eq!(
            snapshot.translations.get(&lang("en")).unwrap().custom_fields["hull"],
            "Motor"
        );
    }

    #[test]
    fn taxonomy_payload_includes_parent_terms() {
        let snapshot = build(&record(), &site(), &configs(), &media()).unwrap();
        assert_eq!(snapshot.taxonomies.len(), 1);
        let tax = &snapshot.taxonomies[0];
        assert_eq!(tax.taxonomy, "yacht_type");
        let slugs: Vec<_> = tax.terms.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["flybridge", "motor"]);
        assert_eq!(tax.terms[0].parent.as_deref(), Some("motor"));
        assert_eq!(tax.terms[1].translations.get(&lang("sl")).unwrap(), "Motorna");
    }

    #[test]
    fn no_applicable_language_fails() {
        let mut s = site();
        s.supported_languages = vec![lang("de")];
        s.default_language = lang("de");
        let err = build(&record(), &s, &configs(), &media()).unwrap_err();
        assert_matches!(err, SnapshotError::NoApplicableLanguage { .. });
    }

    #[test]
    fn default_falls_back_to_first_available_language() {
        let mut rec = record();
        rec.title = text_map(&[("en", "Only English")]);
        rec.content = LanguageMap::new();
        rec.custom_fields.insert("sub_title".into(), json!({"en": "Fast"}));
        let snapshot = build(&rec, &site(), &configs(), &media()).unwrap();
        assert_eq!(snapshot.default_language, lang("en"));
        assert_eq!(snapshot.translations.len(), 1);
    }

    #[test]
    fn missing_slug_fails() {
        let mut rec = record();
        rec.slug = " ".into();
        assert_eq!(
            build(&rec, &site(), &configs(), &media()).unwrap_err(),
            SnapshotError::MissingSlug
        );
    }

    #[test]
    fn missing_title_in_default_language_fails() {
        let mut rec = record();
        rec.title = text_map(&[("en", "Galeon")]);
        let err = build(&rec, &site(), &configs(), &media()).unwrap_err();
        assert_matches!(err, SnapshotError::MissingTitle { language } if language == "sl");
    }

    #[test]
    fn language_without_title_is_left_out_of_translations() {
        let mut rec = record();
        rec.title = text_map(&[("sl", "Galeon 500 Fly")]);
        rec.excerpt = text_map(&[("en", "Fast cruiser")]);
        let snapshot = build(&rec, &site(), &configs(), &media()).unwrap();
        assert_eq!(snapshot.default_language, lang("sl"));
        assert_eq!(snapshot.translations.len(), 1);
        assert!(snapshot.translations.get(&lang("en")).is_none());
        assert!(snapshot.translations.iter().all(|(_, b)| b.title.is_some()));
    }

    #[test]
    fn brand_ref_falls_back_to_record_brand() {
        let rec = record();
        let cfg = config(9, "maker", FieldKind::BrandRef, false);
        let value = resolve_field_value(&rec, &cfg, &lang("sl"), &lang("sl"), &media());
        assert_eq!(value, Some(json!("Galeon")));
    }

    #[test]
    fn envelope_carries_type_and_data() {
        let snapshot = build(&record(), &site(), &configs(), &media()).unwrap();
        let envelope = SyncEnvelope::new(snapshot, true);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "new");
        assert_eq!(json["data"]["slug"], "galeon-500-fly");
        assert_eq!(json["data"]["default_language"], "sl");
    }
}
