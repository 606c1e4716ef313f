//! Media URL resolution for outgoing snapshots.
//!
//! Storage and transformation of media files live outside this workspace;
//! the sync engine only needs "a URL for this record's media bucket".

use crate::record::ContentRecord;

/// Produces absolute URLs for a record's stored media.
pub trait MediaUrlResolver: Send + Sync {
    /// All URLs of a media bucket, in stored order.
    fn urls_for(&self, record: &ContentRecord, collection: &str) -> Vec<String>;

    /// First URL of a media bucket.
    fn url_for(&self, record: &ContentRecord, collection: &str) -> Option<String> {
        self.urls_for(record, collection).into_iter().next()
    }
}

/// Media served from a public base URL laid out as
/// `{base}/{source_id}/{collection}/{file_name}`.
#[derive(Debug, Clone)]
pub struct PublicMediaUrls {
    base_url: String,
}

impl PublicMediaUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }
}

impl MediaUrlResolver for PublicMediaUrls {
    fn urls_for(&self, record: &ContentRecord, collection: &str) -> Vec<String> {
        record
            .media
            .get(collection)
            .map(|files| {
                files
                    .iter()
                    .filter(|f| !f.file_name.trim().is_empty())
                    .map(|f| {
                        format!(
                            "{}/{}/{}/{}",
                            self.base_url, record.source_id, collection, f.file_name
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
