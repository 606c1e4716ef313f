//! Content record rows (`content_records` joined with brand and model names).

use serde::Deserialize;
use sqlx::FromRow;
use yachtsync_core::error::CoreError;
use yachtsync_core::language::LanguageMap;
use yachtsync_core::record::{BrandRef, ContentKind, ContentRecord, ModelRef, RecordState};
use yachtsync_core::types::{DbId, SourceId, Timestamp};

use super::decode_json;

/// A content record row with its brand and model names resolved.
#[derive(Debug, Clone, FromRow)]
pub struct ContentRecordRow {
    pub id: DbId,
    pub source_id: SourceId,
    pub kind: String,
    pub slug: String,
    pub state: String,
    pub title: serde_json::Value,
    pub content: serde_json::Value,
    pub excerpt: serde_json::Value,
    pub custom_fields: serde_json::Value,
    pub brand_id: Option<DbId>,
    pub brand_name: Option<String>,
    pub model_id: Option<DbId>,
    pub model_name: Option<String>,
    pub location: Option<String>,
    pub media: serde_json::Value,
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<ContentRecordRow> for ContentRecord {
    type Error = CoreError;

    fn try_from(row: ContentRecordRow) -> Result<Self, Self::Error> {
        let brand = match (row.brand_id, row.brand_name) {
            (Some(id), Some(name)) => Some(BrandRef { id, name }),
            _ => None,
        };
        let model = match (row.model_id, row.model_name) {
            (Some(id), Some(name)) => Some(ModelRef { id, name }),
            _ => None,
        };

        Ok(ContentRecord {
            id: row.id,
            source_id: row.source_id,
            kind: ContentKind::parse(&row.kind)?,
            slug: row.slug,
            state: RecordState::parse(&row.state)?,
            title: decode_json::<LanguageMap<String>>("title", row.title)?,
            content: decode_json("content", row.content)?,
            excerpt: decode_json("excerpt", row.excerpt)?,
            custom_fields: decode_json("custom_fields", row.custom_fields)?,
            brand,
            model,
            location: row.location,
            media: decode_json("media", row.media)?,
            published_at: row.published_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for creating a content record.
///
/// Editorial CRUD lives outside this workspace; this DTO exists for
/// seeding and for the importer-side pull flow.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContentRecord {
    pub kind: ContentKind,
    pub slug: String,
    pub state: RecordState,
    pub title: LanguageMap<String>,
    #[serde(default)]
    pub content: LanguageMap<String>,
    #[serde(default)]
    pub excerpt: LanguageMap<String>,
    #[serde(default)]
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
    pub brand_id: Option<DbId>,
    pub model_id: Option<DbId>,
    pub location: Option<String>,
    #[serde(default)]
    pub media: serde_json::Map<String, serde_json::Value>,
    pub published_at: Option<Timestamp>,
}
