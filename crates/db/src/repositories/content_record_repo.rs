//! Repository for the `content_records` table.

use sqlx::PgPool;
use yachtsync_core::error::CoreError;
use yachtsync_core::record::{ContentKind, ContentRecord};
use yachtsync_core::types::DbId;

use crate::models::record::{ContentRecordRow, CreateContentRecord};
use crate::DbError;

const RECORD_COLUMNS: &str = "\
    r.id, r.source_id, r.kind, r.slug, r.state, r.title, r.content, r.excerpt, \
    r.custom_fields, r.brand_id, b.name AS brand_name, r.model_id, \
    m.name AS model_name, r.location, r.media, r.published_at, r.created_at, \
    r.updated_at";

const RECORD_FROM: &str = "\
    content_records r \
    LEFT JOIN brands b ON b.id = r.brand_id \
    LEFT JOIN yacht_models m ON m.id = r.model_id";

pub struct ContentRecordRepo;

impl ContentRecordRepo {
    /// Published records of one kind in stable id order.
    pub async fn list_published_by_kind(
        pool: &PgPool,
        kind: ContentKind,
    ) -> Result<Vec<ContentRecord>, DbError> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM {RECORD_FROM} \
             WHERE r.kind = $1 AND r.state = 'published' \
             ORDER BY r.id"
        );
        let rows = sqlx::query_as::<_, ContentRecordRow>(&query)
            .bind(kind.as_str())
            .fetch_all(pool)
            .await?;
        rows.into_iter()
            .map(|row| ContentRecord::try_from(row).map_err(DbError::from))
            .collect()
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ContentRecord>, DbError> {
        let query = format!("SELECT {RECORD_COLUMNS} FROM {RECORD_FROM} WHERE r.id = $1");
        let row = sqlx::query_as::<_, ContentRecordRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(ContentRecord::try_from).transpose()?)
    }

    /// Insert a record with a freshly assigned `source_id`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateContentRecord,
    ) -> Result<ContentRecord, DbError> {
        let id: DbId = sqlx::query_scalar(
            "INSERT INTO content_records \
                 (source_id, kind, slug, state, title, content, excerpt, custom_fields, \
                  brand_id, model_id, location, media, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING id",
        )
        .bind(uuid::Uuid::now_v7())
        .bind(input.kind.as_str())
        .bind(&input.slug)
        .bind(input.state.as_str())
        .bind(to_json(&input.title)?)
        .bind(to_json(&input.content)?)
        .bind(to_json(&input.excerpt)?)
        .bind(serde_json::Value::Object(input.custom_fields.clone()))
        .bind(input.brand_id)
        .bind(input.model_id)
        .bind(&input.location)
        .bind(serde_json::Value::Object(input.media.clone()))
        .bind(input.published_at)
        .fetch_one(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound { entity: "content_record", id }.into())
    }

    /// Touch `updated_at` after an editorial change.
    pub async fn touch(pool: &PgPool, id: DbId) -> Result<bool, DbError> {
        let result = sqlx::query("UPDATE content_records SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, CoreError> {
    serde_json::to_value(value).map_err(|e| CoreError::Internal(e.to_string()))
}
