use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use yachtsync_core::language::LanguageCode;
use yachtsync_core::types::DbId;

use super::{
    Attachment, ImportStore, NewAttachment, Post, PostInput, StoreError, Term, TermInput,
};

#[derive(Default)]
struct Inner {
    next_id: DbId,
    posts: BTreeMap<DbId, Post>,
    attachments: BTreeMap<DbId, Attachment>,
    /// (post, field) -> attachment ids in position order.
    post_media: BTreeMap<(DbId, String), Vec<DbId>>,
    terms: BTreeMap<DbId, Term>,
    /// (post, taxonomy) -> term ids.
    post_terms: HashMap<(DbId, String), Vec<DbId>>,
    #[cfg(any(test, feature = "test-util"))]
    faults: Faults,
}

/// Failures scripted by tests.
#[cfg(any(test, feature = "test-util"))]
#[derive(Default)]
struct Faults {
    failing_languages: std::collections::HashSet<String>,
    /// (source_id, language) pairs for which a concurrent writer wins the
    /// next insert.
    racing_inserts: std::collections::HashSet<(String, String)>,
}

impl Inner {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn create_post(&mut self, input: &PostInput) -> Post {
        let now = chrono::Utc::now();
        let post = Post {
            id: self.next_id(),
            post_type: input.post_type.clone(),
            source_id: input.source_id.clone(),
            language: input.language.clone(),
            slug: input.slug.clone(),
            title: input.title.clone(),
            content: input.content.clone(),
            excerpt: input.excerpt.clone(),
            status: "publish".into(),
            published_at: input.published_at,
            meta: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };
        self.posts.insert(post.id, post.clone());
        post
    }

    fn find_post(&self, source_id: &str, language: &LanguageCode) -> Option<&Post> {
        self.posts
            .values()
            .find(|p| p.source_id == source_id && &p.language == language)
    }
}

/// In-process [`ImportStore`] for tests and single-node setups without a
/// database. Every operation runs under one lock, so the
/// (source_id, language) key check and the insert are atomic.
#[derive(Default)]
pub struct MemoryImportStore {
    inner: Mutex<Inner>,
}

impl MemoryImportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every post write in `language` fail.
    #[cfg(any(test, feature = "test-util"))]
    pub fn fail_language(&self, language: &str) {
        self.lock().faults.failing_languages.insert(language.to_string());
    }

    /// Let a concurrent writer create the (source_id, language) post right
    /// before the next insert for it.
    #[cfg(any(test, feature = "test-util"))]
    pub fn race_next_insert(&self, source_id: &str, language: &str) {
        self.lock()
            .faults
            .racing_inserts
            .insert((source_id.to_string(), language.to_string()));
    }

    pub fn posts(&self) -> Vec<Post> {
        self.lock().posts.values().cloned().collect()
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        self.lock().attachments.values().cloned().collect()
    }

    pub fn terms(&self) -> Vec<Term> {
        self.lock().terms.values().cloned().collect()
    }

    #[cfg(any(test, feature = "test-util"))]
    fn check_language(inner: &Inner, language: &LanguageCode) -> Result<(), StoreError> {
        if inner.faults.failing_languages.contains(language.as_str()) {
            return Err(StoreError::Decode(format!(
                "injected failure for language {language}"
            )));
        }
        Ok(())
    }

    #[cfg(not(any(test, feature = "test-util")))]
    fn check_language(_inner: &Inner, _language: &LanguageCode) -> Result<(), StoreError> {
        Ok(())
    }

    #[cfg(any(test, feature = "test-util"))]
    fn run_scripted_race(inner: &mut Inner, input: &PostInput) {
        let key = (input.source_id.clone(), input.language.to_string());
        if inner.faults.racing_inserts.remove(&key) {
            let mut rival = input.clone();
            rival.title = format!("{} (concurrent)", input.title);
            inner.create_post(&rival);
        }
    }
}

#[async_trait]
impl ImportStore for MemoryImportStore {
    async fn find_post(
        &self,
        source_id: &str,
        language: &LanguageCode,
    ) -> Result<Option<Post>, StoreError> {
        Ok(self.lock().find_post(source_id, language).cloned())
    }

    async fn get_post(&self, id: DbId) -> Result<Option<Post>, StoreError> {
        Ok(self.lock().posts.get(&id).cloned())
    }

    async fn posts_by_source(&self, source_id: &str) -> Result<Vec<Post>, StoreError> {
        Ok(self
            .lock()
            .posts
            .values()
            .filter(|p| p.source_id == source_id)
            .cloned()
            .collect())
    }

    async fn insert_post(&self, input: &PostInput) -> Result<Post, StoreError> {
        let mut inner = self.lock();
        Self::check_language(&inner, &input.language)?;
        #[cfg(any(test, feature = "test-util"))]
        Self::run_scripted_race(&mut inner, input);

        if inner.find_post(&input.source_id, &input.language).is_some() {
            return Err(StoreError::Duplicate {
                source_id: input.source_id.clone(),
                language: input.language.to_string(),
            });
        }
        Ok(inner.create_post(input))
    }

    async fn update_post(&self, id: DbId, input: &PostInput) -> Result<Post, StoreError> {
        let mut inner = self.lock();
        Self::check_language(&inner, &input.language)?;
        let post = inner.posts.get_mut(&id).ok_or(StoreError::PostNotFound(id))?;
        post.post_type = input.post_type.clone();
        post.slug = input.slug.clone();
        post.title = input.title.clone();
        post.content = input.content.clone();
        post.excerpt = input.excerpt.clone();
        post.published_at = input.published_at;
        post.updated_at = chrono::Utc::now();
        Ok(post.clone())
    }

    async fn set_meta(&self, post_id: DbId, key: &str, value: Value) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let post = inner
            .posts
            .get_mut(&post_id)
            .ok_or(StoreError::PostNotFound(post_id))?;
        if value.is_null() {
            post.meta.remove(key);
        } else {
            post.meta.insert(key.to_string(), value);
        }
        Ok(())
    }

    async fn find_attachment_by_url(&self, url: &str) -> Result<Option<Attachment>, StoreError> {
        Ok(self
            .lock()
            .attachments
            .values()
            .find(|a| a.source_url == url)
            .cloned())
    }

    async fn insert_attachment(&self, input: &NewAttachment) -> Result<Attachment, StoreError> {
        let mut inner = self.lock();
        if let Some(existing) = inner
            .attachments
            .values()
            .find(|a| a.source_url == input.source_url)
        {
            return Ok(existing.clone());
        }
        let attachment = Attachment {
            id: inner.next_id(),
            source_url: input.source_url.clone(),
            file_path: input.file_path.clone(),
            mime_type: input.mime_type.clone(),
            size_bytes: input.size_bytes,
        };
        inner.attachments.insert(attachment.id, attachment.clone());
        Ok(attachment)
    }

    async fn delete_attachment(&self, id: DbId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.attachments.remove(&id);
        for ids in inner.post_media.values_mut() {
            ids.retain(|a| *a != id);
        }
        inner.post_media.retain(|_, ids| !ids.is_empty());
        Ok(())
    }

    async fn post_media(&self, post_id: DbId) -> Result<BTreeMap<String, Vec<DbId>>, StoreError> {
        Ok(self
            .lock()
            .post_media
            .iter()
            .filter(|((post, _), _)| *post == post_id)
            .map(|((_, field), ids)| (field.clone(), ids.clone()))
            .collect())
    }

    async fn set_post_media(
        &self,
        post_id: DbId,
        field_key: &str,
        attachment_ids: &[DbId],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let key = (post_id, field_key.to_string());
        if attachment_ids.is_empty() {
            inner.post_media.remove(&key);
        } else {
            inner.post_media.insert(key, attachment_ids.to_vec());
        }
        Ok(())
    }

    async fn attachment_in_use(&self, attachment_id: DbId) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .post_media
            .values()
            .any(|ids| ids.contains(&attachment_id)))
    }

    async fn find_term(
        &self,
        taxonomy: &str,
        slug: &str,
        language: &LanguageCode,
    ) -> Result<Option<Term>, StoreError> {
        Ok(self
            .lock()
            .terms
            .values()
            .find(|t| t.taxonomy == taxonomy && t.slug == slug && &t.language == language)
            .cloned())
    }

    async fn upsert_term(&self, input: &TermInput) -> Result<Term, StoreError> {
        let mut inner = self.lock();
        if let Some(term) = inner.terms.values_mut().find(|t| {
            t.taxonomy == input.taxonomy && t.slug == input.slug && t.language == input.language
        }) {
            term.label = input.label.clone();
            term.parent_id = input.parent_id;
            return Ok(term.clone());
        }
        let term = Term {
            id: inner.next_id(),
            taxonomy: input.taxonomy.clone(),
            slug: input.slug.clone(),
            language: input.language.clone(),
            label: input.label.clone(),
            parent_id: input.parent_id,
        };
        inner.terms.insert(term.id, term.clone());
        Ok(term)
    }

    async fn set_post_terms(
        &self,
        post_id: DbId,
        taxonomy: &str,
        term_ids: &[DbId],
    ) -> Result<(), StoreError> {
        self.lock()
            .post_terms
            .insert((post_id, taxonomy.to_string()), term_ids.to_vec());
        Ok(())
    }

    async fn post_terms(&self, post_id: DbId, taxonomy: &str) -> Result<Vec<DbId>, StoreError> {
        Ok(self
            .lock()
            .post_terms
            .get(&(post_id, taxonomy.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
