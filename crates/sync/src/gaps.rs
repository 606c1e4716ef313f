//! Machine translation of missing multilingual text before dispatch.

use serde_json::Value;
use yachtsync_core::field::{FieldConfiguration, FieldKind};
use yachtsync_core::language::LanguageCode;
use yachtsync_core::record::ContentRecord;
use yachtsync_core::site::SyncSite;
use yachtsync_core::translate::Translator;

fn is_text(kind: &FieldKind) -> bool {
    matches!(kind, FieldKind::Text | FieldKind::Textarea | FieldKind::RichText)
}

fn text_in<'a>(record: &'a ContentRecord, key: &str, lang: &LanguageCode) -> Option<&'a str> {
    record
        .field_in(key, lang)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Copy of `record` where multilingual text fields missing in one of the
/// site's content languages are translated from the source language.
///
/// Content languages are the site languages the record has a title in. The
/// source is the site default when the record has it, else the first
/// content language. A `None` from the translator leaves the gap. Returns
/// the record and the number of values filled.
pub async fn fill_translation_gaps(
    record: &ContentRecord,
    configs: &[FieldConfiguration],
    site: &SyncSite,
    translator: &dyn Translator,
) -> (ContentRecord, usize) {
    let content_languages: Vec<&LanguageCode> = site
        .supported_languages
        .iter()
        .filter(|lang| record.title.text(lang).is_some())
        .collect();
    let Some(first) = content_languages.first() else {
        return (record.clone(), 0);
    };
    let source = if content_languages.contains(&&site.default_language) {
        &site.default_language
    } else {
        *first
    };

    let entity_type = record.kind.entity_type();
    let mut filled = record.clone();
    let mut count = 0;

    for config in configs
        .iter()
        .filter(|c| c.entity_type == entity_type && c.is_multilingual && is_text(&c.kind))
    {
        let Some(source_text) = text_in(record, &config.field_key, source) else {
            continue;
        };
        for target in content_languages.iter().filter(|l| **l != source) {
            if text_in(record, &config.field_key, target).is_some() {
                continue;
            }
            let Some(translated) = translator.translate(source_text, target, source).await else {
                tracing::debug!(
                    record_id = record.id,
                    field = %config.field_key,
                    target = %target,
                    "Translator returned nothing, leaving field untranslated"
                );
                continue;
            };

            let entry = filled
                .custom_fields
                .entry(config.field_key.clone())
                .or_insert_with(|| Value::Object(Default::default()));
            if !entry.is_object() {
                *entry = Value::Object(Default::default());
            }
            if let Value::Object(map) = entry {
                map.insert(target.to_string(), Value::String(translated));
                count += 1;
            }
        }
    }

    (filled, count)
}
