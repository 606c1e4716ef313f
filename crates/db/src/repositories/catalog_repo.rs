//! Repository for the `brands` and `yacht_models` lookup tables.

use sqlx::PgPool;
use yachtsync_core::types::DbId;

pub struct CatalogRepo;

impl CatalogRepo {
    /// Insert a brand, returning the existing id when the name is taken.
    pub async fn upsert_brand(pool: &PgPool, name: &str) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO brands (name) VALUES ($1) \
             ON CONFLICT ON CONSTRAINT uq_brands_name DO UPDATE SET name = EXCLUDED.name \
             RETURNING id",
        )
        .bind(name)
        .fetch_one(pool)
        .await
    }

    /// Insert a model under a brand, returning the existing id on conflict.
    pub async fn upsert_model(
        pool: &PgPool,
        brand_id: DbId,
        name: &str,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO yacht_models (brand_id, name) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT uq_yacht_models_brand_name \
             DO UPDATE SET name = EXCLUDED.name \
             RETURNING id",
        )
        .bind(brand_id)
        .bind(name)
        .fetch_one(pool)
        .await
    }
}
