//! Field configuration rows (`field_configurations`).

use serde::Deserialize;
use sqlx::FromRow;
use yachtsync_core::error::CoreError;
use yachtsync_core::field::{EntityType, FieldConfiguration, FieldKind};
use yachtsync_core::types::{DbId, Timestamp};

#[derive(Debug, Clone, FromRow)]
pub struct FieldConfigurationRow {
    pub id: DbId,
    pub entity_type: String,
    pub field_key: String,
    pub field_type: String,
    pub is_multilingual: bool,
    pub is_required: bool,
    pub sync_as_taxonomy: bool,
    pub taxonomy: Option<String>,
    pub options: Option<serde_json::Value>,
    pub field_group: Option<String>,
    pub sort_order: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<FieldConfigurationRow> for FieldConfiguration {
    type Error = CoreError;

    fn try_from(row: FieldConfigurationRow) -> Result<Self, Self::Error> {
        let kind = FieldKind::from_parts(
            &row.field_type,
            row.options.as_ref(),
            row.sync_as_taxonomy,
            row.taxonomy,
        )?;
        Ok(FieldConfiguration {
            id: row.id,
            entity_type: EntityType::parse(&row.entity_type)?,
            field_key: row.field_key,
            kind,
            is_multilingual: row.is_multilingual,
            is_required: row.is_required,
            group: row.field_group,
            order: row.sort_order,
        })
    }
}

/// Input for creating a field configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFieldConfiguration {
    pub entity_type: EntityType,
    pub field_key: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub is_multilingual: bool,
    #[serde(default)]
    pub is_required: bool,
    pub group: Option<String>,
    #[serde(default)]
    pub order: i32,
}
