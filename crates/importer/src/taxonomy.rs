//! Phased term import: parents before children.

use std::collections::HashMap;

use yachtsync_core::error::SyncError;
use yachtsync_core::language::LanguageCode;
use yachtsync_core::snapshot::{TaxonomyPayload, TermPayload};
use yachtsync_core::types::DbId;

use crate::store::{ImportStore, StoreError, TermInput};

#[derive(Debug, Default)]
pub struct TaxonomyOutcome {
    /// Local term ids in payload order.
    pub term_ids: Vec<DbId>,
    pub warnings: Vec<String>,
}

fn label_in(term: &TermPayload, language: &LanguageCode) -> String {
    term.translations
        .text(language)
        .unwrap_or(&term.label)
        .to_string()
}

/// Import the terms of one taxonomy in one language.
///
/// Terms without a parent go first. Children are then created as soon as
/// their parent slug resolves, among this payload's terms or the terms
/// already stored. A child whose parent never resolves is created without
/// a parent and reported as a warning.
pub async fn import_terms(
    store: &dyn ImportStore,
    taxonomy: &TaxonomyPayload,
    language: &LanguageCode,
) -> Result<TaxonomyOutcome, StoreError> {
    let mut resolved: HashMap<&str, DbId> = HashMap::new();
    let mut outcome = TaxonomyOutcome::default();

    let upsert = |term: &TermPayload, parent_id: Option<DbId>| TermInput {
        taxonomy: taxonomy.taxonomy.clone(),
        slug: term.slug.clone(),
        language: language.clone(),
        label: label_in(term, language),
        parent_id,
    };

    let (roots, mut children): (Vec<&TermPayload>, Vec<&TermPayload>) = taxonomy
        .terms
        .iter()
        .partition(|t| t.parent.as_deref().is_none_or(|p| p.is_empty() || p == t.slug));

    for term in roots {
        let stored = store.upsert_term(&upsert(term, None)).await?;
        resolved.insert(term.slug.as_str(), stored.id);
    }

    while !children.is_empty() {
        let (ready, waiting): (Vec<&TermPayload>, Vec<&TermPayload>) = children
            .into_iter()
            .partition(|t| t.parent.as_deref().is_some_and(|p| resolved.contains_key(p)));
        children = waiting;

        if !ready.is_empty() {
            for term in ready {
                let parent_id = term.parent.as_deref().and_then(|p| resolved.get(p)).copied();
                let stored = store.upsert_term(&upsert(term, parent_id)).await?;
                resolved.insert(term.slug.as_str(), stored.id);
            }
            continue;
        }

        // No child became ready: settle the first one against stored terms.
        let term = children.remove(0);
        let parent_slug = term.parent.as_deref().unwrap_or_default();
        let parent_id = store
            .find_term(&taxonomy.taxonomy, parent_slug, language)
            .await?
            .map(|t| t.id);
        if parent_id.is_none() {
            let warning = SyncError::TaxonomyParentUnresolved {
                term: term.slug.clone(),
                parent: parent_slug.to_string(),
            };
            tracing::warn!(
                taxonomy = %taxonomy.taxonomy,
                language = %language,
                term = %term.slug,
                parent = parent_slug,
                "Parent term not found, creating term without parent",
            );
            outcome.warnings.push(format!("{}: {warning}", taxonomy.taxonomy));
        }
        let stored = store.upsert_term(&upsert(term, parent_id)).await?;
        resolved.insert(term.slug.as_str(), stored.id);
    }

    outcome.term_ids = taxonomy
        .terms
        .iter()
        .filter_map(|t| resolved.get(t.slug.as_str()).copied())
        .fold(Vec::new(), |mut ids, id| {
            if !ids.contains(&id) {
                ids.push(id);
            }
            ids
        });
    Ok(outcome)
}
