//! Translation groups: which local posts are versions of the same record.
//!
//! Two storage layouts are supported. The Polylang layout writes the full
//! language map onto every post of the group. The Falang layout keeps the
//! map on the canonical (default-language) post and gives every
//! translation a reference back to it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use yachtsync_core::language::LanguageCode;
use yachtsync_core::types::DbId;

use crate::store::{ImportStore, StoreError};

/// Language -> local post id.
pub type TranslationGroup = BTreeMap<LanguageCode, DbId>;

pub const POLYLANG_MAP_KEY: &str = "_translations";
pub const FALANG_MAP_KEY: &str = "_falang_translations";
pub const FALANG_ORIGINAL_KEY: &str = "_falang_original";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Polylang,
    Falang,
    /// No translation plugin: posts are left unlinked.
    None,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Polylang => "polylang",
            Self::Falang => "falang",
            Self::None => "none",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polylang" => Ok(Self::Polylang),
            "falang" => Ok(Self::Falang),
            "none" | "" => Ok(Self::None),
            other => Err(format!("unknown translation backend '{other}'")),
        }
    }
}

#[async_trait]
pub trait TranslationLinkBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// The group any of `post_ids` already belongs to.
    async fn load_group(
        &self,
        store: &dyn ImportStore,
        post_ids: &[DbId],
    ) -> Result<TranslationGroup, StoreError>;

    /// Persist `group`; `canonical` is the default-language post.
    async fn save_group(
        &self,
        store: &dyn ImportStore,
        group: &TranslationGroup,
        canonical: DbId,
    ) -> Result<(), StoreError>;
}

/// Backend for a configured kind, `None` when linking is off.
pub fn backend_for(kind: BackendKind) -> Option<Arc<dyn TranslationLinkBackend>> {
    match kind {
        BackendKind::Polylang => Some(Arc::new(PolylangBackend)),
        BackendKind::Falang => Some(Arc::new(FalangBackend)),
        BackendKind::None => None,
    }
}

fn group_to_value(group: &TranslationGroup) -> Value {
    Value::Object(
        group
            .iter()
            .map(|(lang, id)| (lang.to_string(), Value::from(*id)))
            .collect::<Map<_, _>>(),
    )
}

/// Entries of a stored map; unreadable entries are skipped.
fn group_from_value(value: Option<&Value>) -> TranslationGroup {
    let Some(Value::Object(map)) = value else {
        return TranslationGroup::new();
    };
    map.iter()
        .filter_map(|(code, id)| Some((LanguageCode::parse(code).ok()?, id.as_i64()?)))
        .collect()
}

/// Union the stored group with `new`, persist and return it.
///
/// The group is keyed by `source_id`: every stored language post of the
/// record joins it, also when the current payload no longer carries that
/// language. New ids win for languages present in both.
pub async fn link(
    store: &dyn ImportStore,
    backend: &dyn TranslationLinkBackend,
    source_id: &str,
    new: &TranslationGroup,
    canonical: DbId,
) -> Result<TranslationGroup, StoreError> {
    let siblings = store.posts_by_source(source_id).await?;
    let mut ids: Vec<DbId> = siblings.iter().map(|p| p.id).collect();
    ids.extend(new.values().copied());
    ids.sort_unstable();
    ids.dedup();

    let mut group = backend.load_group(store, &ids).await?;
    group.extend(siblings.into_iter().map(|p| (p.language, p.id)));
    group.extend(new.iter().map(|(lang, id)| (lang.clone(), *id)));
    backend.save_group(store, &group, canonical).await?;
    tracing::debug!(
        backend = backend.kind().as_str(),
        source_id,
        canonical,
        languages = group.len(),
        "Translation group saved",
    );
    Ok(group)
}

// ---------------------------------------------------------------------------
// Polylang
// ---------------------------------------------------------------------------

pub struct PolylangBackend;

#[async_trait]
impl TranslationLinkBackend for PolylangBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Polylang
    }

    async fn load_group(
        &self,
        store: &dyn ImportStore,
        post_ids: &[DbId],
    ) -> Result<TranslationGroup, StoreError> {
        let mut group = TranslationGroup::new();
        for id in post_ids {
            if let Some(post) = store.get_post(*id).await? {
                group.extend(group_from_value(post.meta.get(POLYLANG_MAP_KEY)));
            }
        }
        Ok(group)
    }

    async fn save_group(
        &self,
        store: &dyn ImportStore,
        group: &TranslationGroup,
        _canonical: DbId,
    ) -> Result<(), StoreError> {
        let value = group_to_value(group);
        for id in group.values() {
            store.set_meta(*id, POLYLANG_MAP_KEY, value.clone()).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Falang
// ---------------------------------------------------------------------------

pub struct FalangBackend;

#[async_trait]
impl TranslationLinkBackend for FalangBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Falang
    }

    async fn load_group(
        &self,
        store: &dyn ImportStore,
        post_ids: &[DbId],
    ) -> Result<TranslationGroup, StoreError> {
        let mut group = TranslationGroup::new();
        for id in post_ids {
            let Some(post) = store.get_post(*id).await? else {
                continue;
            };
            let original = post.meta.get(FALANG_ORIGINAL_KEY).and_then(Value::as_i64);
            let holder = match original {
                Some(original_id) if original_id != post.id => store.get_post(original_id).await?,
                _ => Some(post),
            };
            if let Some(holder) = holder {
                group.extend(group_from_value(holder.meta.get(FALANG_MAP_KEY)));
            }
        }
        Ok(group)
    }

    async fn save_group(
        &self,
        store: &dyn ImportStore,
        group: &TranslationGroup,
        canonical: DbId,
    ) -> Result<(), StoreError> {
        store
            .set_meta(canonical, FALANG_MAP_KEY, group_to_value(group))
            .await?;
        store.set_meta(canonical, FALANG_ORIGINAL_KEY, Value::Null).await?;
        for id in group.values().filter(|id| **id != canonical) {
            store.set_meta(*id, FALANG_ORIGINAL_KEY, Value::from(canonical)).await?;
            store.set_meta(*id, FALANG_MAP_KEY, Value::Null).await?;
        }
        Ok(())
    }
}
