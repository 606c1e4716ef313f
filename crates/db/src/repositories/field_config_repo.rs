//! Repository for the `field_configurations` table.

use sqlx::PgPool;
use yachtsync_core::error::CoreError;
use yachtsync_core::field::{EntityType, FieldConfiguration};

use crate::models::field::{CreateFieldConfiguration, FieldConfigurationRow};
use crate::DbError;

const FIELD_COLUMNS: &str = "\
    id, entity_type, field_key, field_type, is_multilingual, is_required, \
    sync_as_taxonomy, taxonomy, options, field_group, sort_order, created_at, \
    updated_at";

pub struct FieldConfigRepo;

impl FieldConfigRepo {
    /// Field configurations of an entity type in display order.
    pub async fn list_for_entity(
        pool: &PgPool,
        entity_type: EntityType,
    ) -> Result<Vec<FieldConfiguration>, DbError> {
        let query = format!(
            "SELECT {FIELD_COLUMNS} FROM field_configurations \
             WHERE entity_type = $1 ORDER BY sort_order, id"
        );
        let rows = sqlx::query_as::<_, FieldConfigurationRow>(&query)
            .bind(entity_type.as_str())
            .fetch_all(pool)
            .await?;
        rows.into_iter()
            .map(|row| FieldConfiguration::try_from(row).map_err(DbError::from))
            .collect()
    }

    pub async fn create(
        pool: &PgPool,
        input: &CreateFieldConfiguration,
    ) -> Result<FieldConfiguration, DbError> {
        let (options, sync_as_taxonomy, taxonomy) = input.kind.stored_parts();
        let options = options
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| CoreError::Internal(e.to_string()))?;

        let query = format!(
            "INSERT INTO field_configurations \
                 (entity_type, field_key, field_type, is_multilingual, is_required, \
                  sync_as_taxonomy, taxonomy, options, field_group, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {FIELD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, FieldConfigurationRow>(&query)
            .bind(input.entity_type.as_str())
            .bind(&input.field_key)
            .bind(input.kind.type_name())
            .bind(input.is_multilingual)
            .bind(input.is_required)
            .bind(sync_as_taxonomy)
            .bind(taxonomy)
            .bind(options)
            .bind(&input.group)
            .bind(input.order)
            .fetch_one(pool)
            .await?;
        Ok(FieldConfiguration::try_from(row)?)
    }
}
