//! Receiving-side storage seam.
//!
//! Posts are keyed by (source_id, language); attachments by their exact
//! source URL; terms by (taxonomy, slug, language). Both implementations
//! enforce those keys themselves, so concurrent imports of the same
//! record cannot create duplicates.

mod memory;
mod postgres;

pub use memory::MemoryImportStore;
pub use postgres::PgImportStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use yachtsync_core::language::LanguageCode;
use yachtsync_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another writer created the (source_id, language) post first.
    #[error("Post for {source_id} ({language}) already exists")]
    Duplicate { source_id: String, language: String },

    #[error("Post {0} not found")]
    PostNotFound(DbId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored value could not be decoded: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: DbId,
    pub post_type: String,
    pub source_id: String,
    pub language: LanguageCode,
    pub slug: String,
    pub title: String,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub status: String,
    pub published_at: Option<Timestamp>,
    pub meta: BTreeMap<String, Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Core fields written by an import.
#[derive(Debug, Clone, PartialEq)]
pub struct PostInput {
    pub post_type: String,
    pub source_id: String,
    pub language: LanguageCode,
    pub slug: String,
    pub title: String,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub published_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub id: DbId,
    pub source_url: String,
    pub file_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAttachment {
    pub source_url: String,
    pub file_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Term {
    pub id: DbId,
    pub taxonomy: String,
    pub slug: String,
    pub language: LanguageCode,
    pub label: String,
    pub parent_id: Option<DbId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermInput {
    pub taxonomy: String,
    pub slug: String,
    pub language: LanguageCode,
    pub label: String,
    pub parent_id: Option<DbId>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn find_post(
        &self,
        source_id: &str,
        language: &LanguageCode,
    ) -> Result<Option<Post>, StoreError>;

    async fn get_post(&self, id: DbId) -> Result<Option<Post>, StoreError>;

    /// Every language post of one source record, ordered by id.
    async fn posts_by_source(&self, source_id: &str) -> Result<Vec<Post>, StoreError>;

    /// Create a post. Fails with [`StoreError::Duplicate`] when the
    /// (source_id, language) pair already exists.
    async fn insert_post(&self, input: &PostInput) -> Result<Post, StoreError>;

    async fn update_post(&self, id: DbId, input: &PostInput) -> Result<Post, StoreError>;

    /// Set one meta value; `Value::Null` removes the key.
    async fn set_meta(&self, post_id: DbId, key: &str, value: Value) -> Result<(), StoreError>;

    async fn find_attachment_by_url(&self, url: &str) -> Result<Option<Attachment>, StoreError>;

    /// Insert an attachment, or return the existing one for the same URL.
    async fn insert_attachment(&self, input: &NewAttachment) -> Result<Attachment, StoreError>;

    async fn delete_attachment(&self, id: DbId) -> Result<(), StoreError>;

    /// Attachment ids per media field of a post, in position order.
    async fn post_media(&self, post_id: DbId) -> Result<BTreeMap<String, Vec<DbId>>, StoreError>;

    /// Replace one media field. An empty list detaches the field.
    async fn set_post_media(
        &self,
        post_id: DbId,
        field_key: &str,
        attachment_ids: &[DbId],
    ) -> Result<(), StoreError>;

    /// Whether any media field of any post, of any post type, still uses
    /// the attachment.
    async fn attachment_in_use(&self, attachment_id: DbId) -> Result<bool, StoreError>;

    async fn find_term(
        &self,
        taxonomy: &str,
        slug: &str,
        language: &LanguageCode,
    ) -> Result<Option<Term>, StoreError>;

    /// Create or update the term with the same (taxonomy, slug, language).
    async fn upsert_term(&self, input: &TermInput) -> Result<Term, StoreError>;

    /// Replace the post's terms of one taxonomy.
    async fn set_post_terms(
        &self,
        post_id: DbId,
        taxonomy: &str,
        term_ids: &[DbId],
    ) -> Result<(), StoreError>;

    async fn post_terms(&self, post_id: DbId, taxonomy: &str) -> Result<Vec<DbId>, StoreError>;
}
