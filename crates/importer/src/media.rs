//! Media download, deduplication by source URL, and per-post field
//! reconciliation.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use yachtsync_core::error::SyncError;
use yachtsync_core::types::DbId;

use crate::payload::ImportJob;
use crate::store::{ImportStore, NewAttachment, Post, StoreError};

/// Media field the featured image is stored under.
pub const FEATURED_IMAGE_FIELD: &str = "_thumbnail";

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("download returned HTTP {0}")]
    Status(u16),

    #[error("could not write media file: {0}")]
    Io(#[from] std::io::Error),
}

/// A downloaded file, ready to be recorded as an attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMedia {
    pub file_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, MediaError>;
}

/// Downloads media over HTTP into a local directory.
///
/// Files are named after a hash of their source URL. The MIME type is
/// sniffed from the content for images and taken from `Content-Type`
/// otherwise.
pub struct HttpMediaFetcher {
    client: reqwest::Client,
    dir: PathBuf,
}

impl HttpMediaFetcher {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            dir: dir.into(),
        })
    }
}

fn file_stem(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest.iter().take(12).map(|b| format!("{b:02x}")).collect()
}

/// Extension from the last path segment of `url`, if it looks like one.
fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, MediaError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Status(status.as_u16()));
        }
        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let bytes = response.bytes().await?;

        let sniffed = image::guess_format(&bytes).ok();
        let mime_type = sniffed
            .map(|format| format.to_mime_type().to_string())
            .or(header_mime);
        let extension = sniffed
            .and_then(|format| format.extensions_str().first().map(|e| e.to_string()))
            .or_else(|| url_extension(url))
            .unwrap_or_else(|| "bin".into());

        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = format!("{}.{extension}", file_stem(url));
        tokio::fs::write(self.dir.join(&file_name), &bytes).await?;

        tracing::debug!(url, file = %file_name, bytes = bytes.len(), "Media downloaded");
        Ok(FetchedMedia {
            file_path: file_name,
            mime_type,
            size_bytes: bytes.len() as i64,
        })
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Attachments resolved for one media field of the payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMedia {
    /// Image or file. `None` when the download failed.
    Single(Option<DbId>),
    /// Gallery in payload order, with the number of URLs requested.
    Gallery { ids: Vec<DbId>, requested: usize },
    /// Explicit `null`: the field has no media.
    Cleared,
}

/// Every media field of a payload resolved to local attachments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedMedia {
    pub fields: BTreeMap<String, FieldMedia>,
    /// Distinct URLs referenced by the payload.
    pub total: usize,
    pub failed: usize,
    /// URLs that were downloaded rather than found locally.
    pub downloaded: usize,
}

impl ResolvedMedia {
    pub fn warning(&self) -> Option<SyncError> {
        (self.failed > 0).then_some(SyncError::PartialMedia {
            failed: self.failed,
            total: self.total,
        })
    }
}

struct Resolver<'a> {
    store: &'a dyn ImportStore,
    fetcher: &'a dyn MediaFetcher,
    seen: HashMap<String, Option<DbId>>,
    resolved: ResolvedMedia,
}

impl Resolver<'_> {
    /// Existing attachment for `url`, else download it. URLs are only
    /// looked at once per payload.
    async fn attachment_for(&mut self, url: &str) -> Option<DbId> {
        if let Some(known) = self.seen.get(url) {
            return *known;
        }
        self.resolved.total += 1;
        let id = match self.lookup_or_download(url).await {
            Ok(id) => Some(id),
            Err(message) => {
                tracing::warn!(url, error = %message, "Media could not be imported");
                self.resolved.failed += 1;
                None
            }
        };
        self.seen.insert(url.to_string(), id);
        id
    }

    async fn lookup_or_download(&mut self, url: &str) -> Result<DbId, String> {
        if let Some(existing) = self
            .store
            .find_attachment_by_url(url)
            .await
            .map_err(|e| e.to_string())?
        {
            return Ok(existing.id);
        }
        let fetched = self.fetcher.fetch(url).await.map_err(|e| e.to_string())?;
        let attachment = self
            .store
            .insert_attachment(&NewAttachment {
                source_url: url.to_string(),
                file_path: fetched.file_path,
                mime_type: fetched.mime_type,
                size_bytes: fetched.size_bytes,
            })
            .await
            .map_err(|e| e.to_string())?;
        self.resolved.downloaded += 1;
        Ok(attachment.id)
    }

    async fn field(&mut self, value: &Value) -> FieldMedia {
        match value {
            Value::String(url) if !url.trim().is_empty() => {
                FieldMedia::Single(self.attachment_for(url.trim()).await)
            }
            Value::Array(items) => {
                let urls: Vec<&str> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .collect();
                let mut ids = Vec::with_capacity(urls.len());
                for url in &urls {
                    if let Some(id) = self.attachment_for(url).await {
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                }
                FieldMedia::Gallery {
                    ids,
                    requested: urls.len(),
                }
            }
            _ => FieldMedia::Cleared,
        }
    }
}

/// Resolve every media field and the featured image of `job`.
pub async fn resolve(
    store: &dyn ImportStore,
    fetcher: &dyn MediaFetcher,
    job: &ImportJob,
) -> ResolvedMedia {
    let mut resolver = Resolver {
        store,
        fetcher,
        seen: HashMap::new(),
        resolved: ResolvedMedia::default(),
    };

    for (field, value) in &job.media {
        let media = resolver.field(value).await;
        resolver.resolved.fields.insert(field.clone(), media);
    }
    let featured = match &job.featured_image {
        Some(url) => FieldMedia::Single(resolver.attachment_for(url).await),
        None => FieldMedia::Cleared,
    };
    resolver
        .resolved
        .fields
        .insert(FEATURED_IMAGE_FIELD.to_string(), featured);

    resolver.resolved
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Delete an attachment already detached from `post`, unless some post of
/// any type still uses it. Returns whether it was deleted.
async fn release(store: &dyn ImportStore, attachment_id: DbId, post: &Post) -> Result<bool, StoreError> {
    if store.attachment_in_use(attachment_id).await? {
        return Ok(false);
    }
    store.delete_attachment(attachment_id).await?;
    tracing::info!(attachment_id, post_id = post.id, "Unreferenced attachment deleted");
    Ok(true)
}

/// Write resolved media onto `post` and reconcile fields the payload no
/// longer carries.
///
/// Failed downloads keep whatever the field held before. A single-image
/// field that is gone or `null` is detached and its attachment deleted if
/// nothing else references it; galleries are only detached. Returns the
/// number of deleted attachments.
pub async fn apply(
    store: &dyn ImportStore,
    post: &Post,
    media: &ResolvedMedia,
) -> Result<usize, StoreError> {
    let previous = store.post_media(post.id).await?;
    let mut deleted = 0;

    for (field, value) in &media.fields {
        match value {
            FieldMedia::Single(Some(id)) => {
                store.set_post_media(post.id, field, &[*id]).await?;
                store.set_meta(post.id, field, json!(id)).await?;
            }
            FieldMedia::Gallery { ids, requested } if !ids.is_empty() || *requested == 0 => {
                store.set_post_media(post.id, field, ids).await?;
                store.set_meta(post.id, field, json!(ids)).await?;
            }
            FieldMedia::Single(None) | FieldMedia::Gallery { .. } | FieldMedia::Cleared => {}
        }
    }

    for (field, old_ids) in previous {
        let was_single = post.meta.get(&field).is_some_and(Value::is_number);
        match media.fields.get(&field) {
            Some(FieldMedia::Single(Some(new_id))) => {
                if was_single {
                    for old in old_ids.iter().filter(|old| *old != new_id) {
                        deleted += usize::from(release(store, *old, post).await?);
                    }
                }
            }
            Some(FieldMedia::Single(None)) | Some(FieldMedia::Gallery { .. }) => {}
            Some(FieldMedia::Cleared) | None => {
                store.set_post_media(post.id, &field, &[]).await?;
                store.set_meta(post.id, &field, Value::Null).await?;
                if was_single {
                    for old in &old_ids {
                        deleted += usize::from(release(store, *old, post).await?);
                    }
                }
            }
        }
    }

    Ok(deleted)
}
