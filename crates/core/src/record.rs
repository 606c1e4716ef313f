//! Content records as read from the source-of-truth store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::field::EntityType;
use crate::language::{LanguageCode, LanguageMap};
use crate::types::{DbId, SourceId, Timestamp};

// ---------------------------------------------------------------------------
// ContentKind
// ---------------------------------------------------------------------------

/// Content type dispatched to a site. The wire names match the `type`
/// query/body parameter the importer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    New,
    Used,
    News,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [Self::New, Self::Used, Self::News];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Used => "used",
            Self::News => "news",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "new" => Ok(Self::New),
            "used" => Ok(Self::Used),
            "news" => Ok(Self::News),
            other => Err(CoreError::Validation(format!(
                "Unknown content type '{other}'"
            ))),
        }
    }

    /// Field configurations are shared by new and used yachts.
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::New | Self::Used => EntityType::Yacht,
            Self::News => EntityType::News,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RecordState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Draft,
    Published,
    Disabled,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Disabled => "disabled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "disabled" => Ok(Self::Disabled),
            other => Err(CoreError::Validation(format!(
                "Unknown record state '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandRef {
    pub id: DbId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRef {
    pub id: DbId,
    pub name: String,
}

/// A stored media file. Turned into an absolute URL by a
/// [`MediaUrlResolver`](crate::media::MediaUrlResolver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub file_name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Name of the media bucket holding the featured image.
pub const COVER_COLLECTION: &str = "cover";

// ---------------------------------------------------------------------------
// ContentRecord
// ---------------------------------------------------------------------------

/// A yacht or news item.
///
/// `custom_fields` values are raw JSON: multilingual fields hold an object
/// keyed by language code, other fields hold a scalar or list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: DbId,
    pub source_id: SourceId,
    pub kind: ContentKind,
    pub slug: String,
    pub state: RecordState,
    pub title: LanguageMap<String>,
    #[serde(default)]
    pub content: LanguageMap<String>,
    #[serde(default)]
    pub excerpt: LanguageMap<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, serde_json::Value>,
    pub brand: Option<BrandRef>,
    pub model: Option<ModelRef>,
    pub location: Option<String>,
    /// Media buckets keyed by collection name (`cover`, `gallery-*`, `pdf`,
    /// or a media field key).
    #[serde(default)]
    pub media: BTreeMap<String, Vec<MediaRef>>,
    pub published_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl ContentRecord {
    pub fn is_published(&self) -> bool {
        self.state == RecordState::Published
    }

    pub fn brand_id(&self) -> Option<DbId> {
        self.brand.as_ref().map(|b| b.id)
    }

    pub fn model_id(&self) -> Option<DbId> {
        self.model.as_ref().map(|m| m.id)
    }

    /// Multilingual value of a custom field for one language.
    pub fn field_in(&self, key: &str, lang: &LanguageCode) -> Option<&serde_json::Value> {
        self.custom_fields
            .get(key)
            .and_then(|v| v.as_object())
            .and_then(|obj| obj.get(lang.as_str()))
            .filter(|v| !v.is_null())
    }
}
