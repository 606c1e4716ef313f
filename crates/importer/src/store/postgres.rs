use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use yachtsync_core::language::LanguageCode;
use yachtsync_core::types::{DbId, Timestamp};

use super::{
    Attachment, ImportStore, NewAttachment, Post, PostInput, StoreError, Term, TermInput,
};

const POST_COLUMNS: &str = "id, post_type, source_id, language, slug, title, content, excerpt, \
    status, published_at, meta, created_at, updated_at";

const ATTACHMENT_COLUMNS: &str = "id, source_url, file_path, mime_type, size_bytes";

const TERM_COLUMNS: &str = "id, taxonomy, slug, language, label, parent_id";

const POST_IDENTITY_CONSTRAINT: &str = "uq_import_posts_source_language";

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct PostRow {
    id: DbId,
    post_type: String,
    source_id: String,
    language: String,
    slug: String,
    title: String,
    content: Option<String>,
    excerpt: Option<String>,
    status: String,
    published_at: Option<Timestamp>,
    meta: Value,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let language =
            LanguageCode::parse(&row.language).map_err(|e| StoreError::Decode(e.to_string()))?;
        let meta = match row.meta {
            Value::Object(map) => map.into_iter().collect(),
            Value::Null => BTreeMap::new(),
            other => return Err(StoreError::Decode(format!("post meta is not an object: {other}"))),
        };
        Ok(Post {
            id: row.id,
            post_type: row.post_type,
            source_id: row.source_id,
            language,
            slug: row.slug,
            title: row.title,
            content: row.content,
            excerpt: row.excerpt,
            status: row.status,
            published_at: row.published_at,
            meta,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AttachmentRow {
    id: DbId,
    source_url: String,
    file_path: String,
    mime_type: Option<String>,
    size_bytes: i64,
}

impl From<AttachmentRow> for Attachment {
    fn from(row: AttachmentRow) -> Self {
        Attachment {
            id: row.id,
            source_url: row.source_url,
            file_path: row.file_path,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
        }
    }
}

#[derive(Debug, FromRow)]
struct TermRow {
    id: DbId,
    taxonomy: String,
    slug: String,
    language: String,
    label: String,
    parent_id: Option<DbId>,
}

impl TryFrom<TermRow> for Term {
    type Error = StoreError;

    fn try_from(row: TermRow) -> Result<Self, Self::Error> {
        Ok(Term {
            id: row.id,
            taxonomy: row.taxonomy,
            slug: row.slug,
            language: LanguageCode::parse(&row.language)
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            label: row.label,
            parent_id: row.parent_id,
        })
    }
}

/// Whether `err` is a unique violation of the named constraint.
fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// PostgreSQL-backed [`ImportStore`] over the `import_*` tables.
#[derive(Clone)]
pub struct PgImportStore {
    pool: PgPool,
}

impl PgImportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the importer's embedded migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn find_post(
        &self,
        source_id: &str,
        language: &LanguageCode,
    ) -> Result<Option<Post>, StoreError> {
        let query = format!(
            "SELECT {POST_COLUMNS} FROM import_posts WHERE source_id = $1 AND language = $2"
        );
        sqlx::query_as::<_, PostRow>(&query)
            .bind(source_id)
            .bind(language.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn get_post(&self, id: DbId) -> Result<Option<Post>, StoreError> {
        let query = format!("SELECT {POST_COLUMNS} FROM import_posts WHERE id = $1");
        sqlx::query_as::<_, PostRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn posts_by_source(&self, source_id: &str) -> Result<Vec<Post>, StoreError> {
        let query =
            format!("SELECT {POST_COLUMNS} FROM import_posts WHERE source_id = $1 ORDER BY id");
        sqlx::query_as::<_, PostRow>(&query)
            .bind(source_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Post::try_from)
            .collect()
    }

    async fn insert_post(&self, input: &PostInput) -> Result<Post, StoreError> {
        let query = format!(
            "INSERT INTO import_posts
                (post_type, source_id, language, slug, title, content, excerpt, published_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&query)
            .bind(&input.post_type)
            .bind(&input.source_id)
            .bind(input.language.as_str())
            .bind(&input.slug)
            .bind(&input.title)
            .bind(&input.content)
            .bind(&input.excerpt)
            .bind(input.published_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| {
                if is_unique_violation(&err, POST_IDENTITY_CONSTRAINT) {
                    StoreError::Duplicate {
                        source_id: input.source_id.clone(),
                        language: input.language.to_string(),
                    }
                } else {
                    StoreError::Database(err)
                }
            })?;
        row.try_into()
    }

    async fn update_post(&self, id: DbId, input: &PostInput) -> Result<Post, StoreError> {
        let query = format!(
            "UPDATE import_posts SET
                post_type = $2, slug = $3, title = $4, content = $5, excerpt = $6,
                published_at = $7, updated_at = NOW()
             WHERE id = $1
             RETURNING {POST_COLUMNS}"
        );
        sqlx::query_as::<_, PostRow>(&query)
            .bind(id)
            .bind(&input.post_type)
            .bind(&input.slug)
            .bind(&input.title)
            .bind(&input.content)
            .bind(&input.excerpt)
            .bind(input.published_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::PostNotFound(id))?
            .try_into()
    }

    async fn set_meta(&self, post_id: DbId, key: &str, value: Value) -> Result<(), StoreError> {
        let result = if value.is_null() {
            sqlx::query("UPDATE import_posts SET meta = meta - $2 WHERE id = $1")
                .bind(post_id)
                .bind(key)
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query(
                "UPDATE import_posts SET meta = meta || jsonb_build_object($2::text, $3::jsonb)
                 WHERE id = $1",
            )
            .bind(post_id)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?
        };
        if result.rows_affected() == 0 {
            return Err(StoreError::PostNotFound(post_id));
        }
        Ok(())
    }

    async fn find_attachment_by_url(&self, url: &str) -> Result<Option<Attachment>, StoreError> {
        let query =
            format!("SELECT {ATTACHMENT_COLUMNS} FROM import_attachments WHERE source_url = $1");
        Ok(sqlx::query_as::<_, AttachmentRow>(&query)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
            .map(Attachment::from))
    }

    async fn insert_attachment(&self, input: &NewAttachment) -> Result<Attachment, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let query = format!(
            "INSERT INTO import_attachments (source_url, file_path, mime_type, size_bytes)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT ON CONSTRAINT uq_import_attachments_source_url
             DO UPDATE SET source_url = EXCLUDED.source_url
             RETURNING {ATTACHMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AttachmentRow>(&query)
            .bind(&input.source_url)
            .bind(&input.file_path)
            .bind(&input.mime_type)
            .bind(input.size_bytes)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn delete_attachment(&self, id: DbId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM import_attachments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn post_media(&self, post_id: DbId) -> Result<BTreeMap<String, Vec<DbId>>, StoreError> {
        let rows: Vec<(String, DbId)> = sqlx::query_as(
            "SELECT field_key, attachment_id FROM import_post_media
             WHERE post_id = $1 ORDER BY field_key, position",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        let mut media: BTreeMap<String, Vec<DbId>> = BTreeMap::new();
        for (field, attachment_id) in rows {
            media.entry(field).or_default().push(attachment_id);
        }
        Ok(media)
    }

    async fn set_post_media(
        &self,
        post_id: DbId,
        field_key: &str,
        attachment_ids: &[DbId],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM import_post_media WHERE post_id = $1 AND field_key = $2")
            .bind(post_id)
            .bind(field_key)
            .execute(&mut *tx)
            .await?;
        for (position, attachment_id) in attachment_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO import_post_media (post_id, field_key, position, attachment_id)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(post_id)
            .bind(field_key)
            .bind(position as i32)
            .bind(attachment_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn attachment_in_use(&self, attachment_id: DbId) -> Result<bool, StoreError> {
        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM import_post_media WHERE attachment_id = $1)",
        )
        .bind(attachment_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(in_use)
    }

    async fn find_term(
        &self,
        taxonomy: &str,
        slug: &str,
        language: &LanguageCode,
    ) -> Result<Option<Term>, StoreError> {
        let query = format!(
            "SELECT {TERM_COLUMNS} FROM import_terms
             WHERE taxonomy = $1 AND slug = $2 AND language = $3"
        );
        sqlx::query_as::<_, TermRow>(&query)
            .bind(taxonomy)
            .bind(slug)
            .bind(language.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(Term::try_from)
            .transpose()
    }

    async fn upsert_term(&self, input: &TermInput) -> Result<Term, StoreError> {
        let query = format!(
            "INSERT INTO import_terms (taxonomy, slug, language, label, parent_id)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT ON CONSTRAINT uq_import_terms_taxonomy_slug_language
             DO UPDATE SET label = EXCLUDED.label, parent_id = EXCLUDED.parent_id
             RETURNING {TERM_COLUMNS}"
        );
        sqlx::query_as::<_, TermRow>(&query)
            .bind(&input.taxonomy)
            .bind(&input.slug)
            .bind(input.language.as_str())
            .bind(&input.label)
            .bind(input.parent_id)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }

    async fn set_post_terms(
        &self,
        post_id: DbId,
        taxonomy: &str,
        term_ids: &[DbId],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM import_post_terms WHERE post_id = $1 AND taxonomy = $2")
            .bind(post_id)
            .bind(taxonomy)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO import_post_terms (post_id, term_id, taxonomy)
             SELECT $1, term_id, $3 FROM UNNEST($2::bigint[]) AS t(term_id)
             ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(term_ids)
        .bind(taxonomy)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn post_terms(&self, post_id: DbId, taxonomy: &str) -> Result<Vec<DbId>, StoreError> {
        Ok(sqlx::query_scalar(
            "SELECT term_id FROM import_post_terms
             WHERE post_id = $1 AND taxonomy = $2 ORDER BY term_id",
        )
        .bind(post_id)
        .bind(taxonomy)
        .fetch_all(&self.pool)
        .await?)
    }
}
