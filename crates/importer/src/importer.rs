//! The import pipeline.
//!
//! For each language of a validated [`ImportJob`]: resolve the local post
//! by (source_id, language), write core fields, custom fields, media and
//! taxonomy terms. Then link the language posts into one translation
//! group. A failing language is reported and never stops its siblings.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use yachtsync_core::error::SyncError;
use yachtsync_core::language::LanguageCode;
use yachtsync_core::record::ContentKind;
use yachtsync_core::snapshot::LanguageBundle;
use yachtsync_core::types::DbId;

use crate::media::{self, MediaFetcher, ResolvedMedia};
use crate::payload::{ImportJob, PostType};
use crate::store::{ImportStore, Post, PostInput, StoreError};
use crate::taxonomy;
use crate::translation::{self, BackendKind, TranslationGroup, TranslationLinkBackend};

/// Meta key holding the yacht condition (`new` / `used`).
pub const CONDITION_META_KEY: &str = "_condition";

/// Response body of an import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub success: bool,
    /// Post id in the default language, else the first imported one.
    pub id: Option<DbId>,
    /// Languages imported.
    pub imported: usize,
    /// Languages for which a new post was created.
    pub created: usize,
    pub posts: BTreeMap<String, DbId>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
enum LanguageError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

struct LanguageOutcome {
    post: Post,
    created: bool,
    warnings: Vec<String>,
}

#[derive(Clone)]
pub struct Importer {
    store: Arc<dyn ImportStore>,
    fetcher: Arc<dyn MediaFetcher>,
    links: Option<Arc<dyn TranslationLinkBackend>>,
    custom_fields_enabled: bool,
}

impl Importer {
    pub fn new(store: Arc<dyn ImportStore>, fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self {
            store,
            fetcher,
            links: None,
            custom_fields_enabled: true,
        }
    }

    pub fn with_translation_backend(mut self, backend: Option<Arc<dyn TranslationLinkBackend>>) -> Self {
        self.links = backend;
        self
    }

    pub fn with_custom_fields(mut self, enabled: bool) -> Self {
        self.custom_fields_enabled = enabled;
        self
    }

    pub fn store(&self) -> &Arc<dyn ImportStore> {
        &self.store
    }

    pub fn translation_backend(&self) -> BackendKind {
        self.links
            .as_ref()
            .map_or(BackendKind::None, |backend| backend.kind())
    }

    pub fn custom_fields_enabled(&self) -> bool {
        self.custom_fields_enabled
    }

    /// Run `job`. Media is imported inline when the job asks for it and in
    /// a background task otherwise.
    pub async fn import(&self, job: ImportJob) -> ImportSummary {
        tracing::info!(
            source_id = %job.source_id,
            slug = %job.slug,
            content_type = %job.kind,
            languages = job.languages.len(),
            "Import started",
        );

        let media = if job.import_media {
            Some(media::resolve(self.store.as_ref(), self.fetcher.as_ref(), &job).await)
        } else {
            None
        };

        let mut summary = ImportSummary::default();
        let mut group = TranslationGroup::new();

        for (language, bundle) in &job.languages {
            match self.import_language(&job, language, bundle, media.as_ref()).await {
                Ok(outcome) => {
                    summary.imported += 1;
                    summary.created += usize::from(outcome.created);
                    summary.posts.insert(language.to_string(), outcome.post.id);
                    summary
                        .warnings
                        .extend(outcome.warnings.into_iter().map(|w| format!("{language}: {w}")));
                    group.insert(language.clone(), outcome.post.id);
                }
                Err(e) => {
                    tracing::warn!(
                        source_id = %job.source_id,
                        language = %language,
                        error = %e,
                        "Language import failed",
                    );
                    summary.errors.push(format!("{language}: {e}"));
                }
            }
        }

        if let Some(warning) = media.as_ref().and_then(ResolvedMedia::warning) {
            summary.warnings.push(warning.to_string());
        }

        summary.id = group
            .get(&job.default_language)
            .or_else(|| group.values().next())
            .copied();

        if let (Some(backend), Some(canonical)) = (&self.links, summary.id) {
            let linked = translation::link(
                self.store.as_ref(),
                backend.as_ref(),
                &job.source_id,
                &group,
                canonical,
            )
            .await;
            if let Err(e) = linked {
                tracing::error!(source_id = %job.source_id, error = %e, "Translation linking failed");
                summary.errors.push(format!("translations: {e}"));
            }
        }

        if !job.import_media && !group.is_empty() {
            self.spawn_media_import(job.clone(), group.values().copied().collect());
        }

        summary.success = summary.errors.is_empty();
        tracing::info!(
            source_id = %job.source_id,
            imported = summary.imported,
            created = summary.created,
            errors = summary.errors.len(),
            warnings = summary.warnings.len(),
            "Import finished",
        );
        summary
    }

    async fn import_language(
        &self,
        job: &ImportJob,
        language: &LanguageCode,
        bundle: &LanguageBundle,
        media: Option<&ResolvedMedia>,
    ) -> Result<LanguageOutcome, LanguageError> {
        let (post, created) = self.resolve_identity(job, language, bundle).await?;
        let mut warnings = Vec::new();

        if job.post_type() == PostType::Yacht {
            self.store
                .set_meta(post.id, CONDITION_META_KEY, Value::from(condition(job.kind)))
                .await?;
        }

        if self.custom_fields_enabled {
            let mut fields = job.custom_fields.clone();
            fields.extend(bundle.custom_fields.clone());
            for (key, value) in fields {
                self.store.set_meta(post.id, &key, value).await?;
            }
        }

        if let Some(media) = media {
            let deleted = media::apply(self.store.as_ref(), &post, media).await?;
            if deleted > 0 {
                tracing::debug!(post_id = post.id, deleted, "Removed media reconciled");
            }
        }

        for taxonomy in &job.taxonomies {
            let outcome = taxonomy::import_terms(self.store.as_ref(), taxonomy, language).await?;
            self.store
                .set_post_terms(post.id, &taxonomy.taxonomy, &outcome.term_ids)
                .await?;
            warnings.extend(outcome.warnings);
        }

        Ok(LanguageOutcome {
            post,
            created,
            warnings,
        })
    }

    /// Find the post for (source_id, language) and update it, or create it.
    /// A concurrent create of the same pair falls back to the update path.
    async fn resolve_identity(
        &self,
        job: &ImportJob,
        language: &LanguageCode,
        bundle: &LanguageBundle,
    ) -> Result<(Post, bool), LanguageError> {
        let title = bundle
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::Validation("missing title".into()))?;

        let input = PostInput {
            post_type: job.post_type().as_str().to_string(),
            source_id: job.source_id.clone(),
            language: language.clone(),
            slug: job.slug.clone(),
            title: title.to_string(),
            content: bundle.content.clone(),
            excerpt: bundle.excerpt.clone(),
            published_at: job.published_at,
        };

        if let Some(existing) = self.store.find_post(&job.source_id, language).await? {
            return Ok((self.store.update_post(existing.id, &input).await?, false));
        }

        match self.store.insert_post(&input).await {
            Ok(post) => Ok((post, true)),
            Err(StoreError::Duplicate { .. }) => {
                tracing::info!(
                    source_id = %job.source_id,
                    language = %language,
                    "Post created concurrently, updating instead",
                );
                let existing = self
                    .store
                    .find_post(&job.source_id, language)
                    .await?
                    .ok_or_else(|| SyncError::IdentityConflict {
                        source_id: job.source_id.clone(),
                        language: language.to_string(),
                    })?;
                Ok((self.store.update_post(existing.id, &input).await?, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn spawn_media_import(&self, job: ImportJob, post_ids: Vec<DbId>) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.import_media(&job, &post_ids).await {
                tracing::error!(source_id = %job.source_id, error = %e, "Deferred media import failed");
            }
        });
    }

    /// Resolve and apply the job's media to already imported posts.
    pub async fn import_media(&self, job: &ImportJob, post_ids: &[DbId]) -> Result<ResolvedMedia, StoreError> {
        let media = media::resolve(self.store.as_ref(), self.fetcher.as_ref(), job).await;
        for id in post_ids {
            let post = self
                .store
                .get_post(*id)
                .await?
                .ok_or(StoreError::PostNotFound(*id))?;
            media::apply(self.store.as_ref(), &post, &media).await?;
        }
        tracing::info!(
            source_id = %job.source_id,
            posts = post_ids.len(),
            downloaded = media.downloaded,
            failed = media.failed,
            "Deferred media imported",
        );
        Ok(media)
    }
}

fn condition(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Used => "used",
        ContentKind::New | ContentKind::News => "new",
    }
}
