//! Custom field configuration.
//!
//! A [`FieldConfiguration`] describes one administrator-defined field of one
//! entity type. The kind-specific payload lives in [`FieldKind`], so the
//! "taxonomy sync only for select/checkbox" rule is unrepresentable rather
//! than validated at every call site.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::language::{LanguageCode, LanguageMap};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Yacht,
    News,
}

impl EntityType {
    pub const ALL: [EntityType; 2] = [Self::Yacht, Self::News];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yacht => "yacht",
            Self::News => "news",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "yacht" => Ok(Self::Yacht),
            "news" => Ok(Self::News),
            other => Err(CoreError::Validation(format!(
                "Unknown entity type '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// SelectOption
// ---------------------------------------------------------------------------

/// One choice of a select or checkbox field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Stored value; doubles as the term slug when synced as taxonomy.
    pub value: String,
    /// Neutral label used when no per-language label exists.
    pub label: String,
    #[serde(default)]
    pub translations: LanguageMap<String>,
    /// Value of the parent option for hierarchical taxonomies.
    #[serde(default)]
    pub parent: Option<String>,
}

impl SelectOption {
    /// Label for `lang`, falling back to the neutral label.
    pub fn label_for(&self, lang: &LanguageCode) -> &str {
        self.translations.text(lang).unwrap_or(&self.label)
    }
}

// ---------------------------------------------------------------------------
// FieldKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    #[serde(rename = "richtext")]
    RichText,
    Number,
    Date,
    Select {
        options: Vec<SelectOption>,
        #[serde(default)]
        sync_as_taxonomy: bool,
        /// Target taxonomy name; defaults to the field key.
        #[serde(default)]
        taxonomy: Option<String>,
    },
    Checkbox {
        options: Vec<SelectOption>,
        #[serde(default)]
        sync_as_taxonomy: bool,
        #[serde(default)]
        taxonomy: Option<String>,
    },
    Image,
    Gallery,
    File,
    Repeater,
    #[serde(rename = "brand-ref")]
    BrandRef,
    #[serde(rename = "model-ref")]
    ModelRef,
}

impl FieldKind {
    /// The `field_type` column value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::RichText => "richtext",
            Self::Number => "number",
            Self::Date => "date",
            Self::Select { .. } => "select",
            Self::Checkbox { .. } => "checkbox",
            Self::Image => "image",
            Self::Gallery => "gallery",
            Self::File => "file",
            Self::Repeater => "repeater",
            Self::BrandRef => "brand-ref",
            Self::ModelRef => "model-ref",
        }
    }

    /// Rebuild a kind from its stored columns.
    ///
    /// `options` is the JSON array stored alongside select/checkbox fields and
    /// is ignored for every other type.
    pub fn from_parts(
        field_type: &str,
        options: Option<&serde_json::Value>,
        sync_as_taxonomy: bool,
        taxonomy: Option<String>,
    ) -> Result<Self, CoreError> {
        let parse_options = || -> Result<Vec<SelectOption>, CoreError> {
            match options {
                None => Ok(Vec::new()),
                Some(value) if value.is_null() => Ok(Vec::new()),
                Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                    CoreError::Validation(format!("Invalid options for {field_type} field: {e}"))
                }),
            }
        };

        let kind = match field_type {
            "select" => Self::Select {
                options: parse_options()?,
                sync_as_taxonomy,
                taxonomy,
            },
            "checkbox" => Self::Checkbox {
                options: parse_options()?,
                sync_as_taxonomy,
                taxonomy,
            },
            other => {
                if sync_as_taxonomy {
                    return Err(CoreError::Validation(format!(
                        "sync_as_taxonomy is only allowed on select/checkbox fields, not '{other}'"
                    )));
                }
                match other {
                    "text" => Self::Text,
                    "textarea" => Self::Textarea,
                    "richtext" => Self::RichText,
                    "number" => Self::Number,
                    "date" => Self::Date,
                    "image" => Self::Image,
                    "gallery" => Self::Gallery,
                    "file" => Self::File,
                    "repeater" => Self::Repeater,
                    "brand-ref" => Self::BrandRef,
                    "model-ref" => Self::ModelRef,
                    unknown => {
                        return Err(CoreError::Validation(format!(
                            "Unknown field type '{unknown}'"
                        )))
                    }
                }
            }
        };
        Ok(kind)
    }

    /// Inverse of [`FieldKind::from_parts`]: `(options, sync_as_taxonomy, taxonomy)`.
    pub fn stored_parts(&self) -> (Option<&[SelectOption]>, bool, Option<&str>) {
        match self {
            Self::Select {
                options,
                sync_as_taxonomy,
                taxonomy,
            }
            | Self::Checkbox {
                options,
                sync_as_taxonomy,
                taxonomy,
            } => (Some(options.as_slice()), *sync_as_taxonomy, taxonomy.as_deref()),
            _ => (None, false, None),
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Gallery | Self::File)
    }

    /// Options and taxonomy name for fields synced as taxonomy terms.
    pub fn taxonomy_options(&self) -> Option<(&[SelectOption], Option<&str>)> {
        match self {
            Self::Select {
                options,
                sync_as_taxonomy: true,
                taxonomy,
            }
            | Self::Checkbox {
                options,
                sync_as_taxonomy: true,
                taxonomy,
            } => Some((options.as_slice(), taxonomy.as_deref())),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// FieldConfiguration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfiguration {
    pub id: DbId,
    pub entity_type: EntityType,
    pub field_key: String,
    pub kind: FieldKind,
    pub is_multilingual: bool,
    pub is_required: bool,
    /// UI grouping only.
    pub group: Option<String>,
    pub order: i32,
}

impl FieldConfiguration {
    /// Taxonomy name for a taxonomy-synced field.
    pub fn taxonomy_name(&self) -> Option<&str> {
        self.kind
            .taxonomy_options()
            .map(|(_, taxonomy)| taxonomy.unwrap_or(self.field_key.as_str()))
    }
}
