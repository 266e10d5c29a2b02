//! Database access for the catalog backfill: the narrow store interface the
//! engine talks to, and its Postgres implementation.

use std::time::Duration;

use async_trait::async_trait;
use backfill_core::{CatalogEntry, ExerciseVideoRow, CATALOG_TABLE, SOURCE_TABLE};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

pub mod memory;

pub use memory::MemoryCatalogStore;

pub const CRATE_NAME: &str = "backfill-storage";

/// Destination columns in insert order.
pub const CATALOG_COLUMNS: [&str; 25] = [
    "id",
    "title",
    "slug",
    "description",
    "source",
    "visibility",
    "access_tier",
    "status",
    "youtube_video_id",
    "hosted_key",
    "thumbnail_url",
    "duration_seconds",
    "view_count",
    "like_count",
    "tags",
    "chapters",
    "exercise_id",
    "creator_id",
    "metadata_completed",
    "legacy_import",
    "featured",
    "sort_order",
    "published_at",
    "created_at",
    "updated_at",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("table {0} does not exist")]
    MissingTable(String),
    #[error("insert rejected: {0}")]
    Rejected(String),
}

/// Read/count/transaction surface the backfill needs from a database.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn table_exists(&self, table: &str) -> Result<bool, StoreError>;

    async fn count_rows(&self, table: &str) -> Result<i64, StoreError>;

    /// All non-deleted legacy rows ordered by `id` ascending.
    async fn fetch_source_rows(&self) -> Result<Vec<ExerciseVideoRow>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, StoreError>;

    async fn close(&self) {}
}

/// One open write transaction. Dropping it without `commit` discards all
/// inserted batches.
#[async_trait]
pub trait CatalogTransaction: Send {
    async fn insert_batch(&mut self, entries: &[CatalogEntry]) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgPoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PgPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 3,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub async fn connect(database_url: &str, config: PgPoolConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(0)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                  FROM pg_tables
                 WHERE schemaname = 'public'
                   AND tablename = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn count_rows(&self, table: &str) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*)::bigint FROM {}", quote_ident(table));
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn fetch_source_rows(&self) -> Result<Vec<ExerciseVideoRow>, StoreError> {
        let sql = format!(
            r#"
            SELECT id::text AS id,
                   exercise_id::uuid AS exercise_id,
                   video_type::text AS video_type,
                   video_id::text AS video_id,
                   title::text AS title,
                   description::text AS description,
                   duration_seconds::int4 AS duration_seconds,
                   thumbnail_url::text AS thumbnail_url,
                   uploader_id::int4 AS uploader_id,
                   approved,
                   is_public,
                   views::int8 AS views,
                   to_jsonb(tags) AS tags,
                   to_jsonb(chapters) AS chapters,
                   "deletedAt"::timestamptz AS deleted_at,
                   created_at::timestamptz AS created_at,
                   updated_at::timestamptz AS updated_at
              FROM {SOURCE_TABLE}
             WHERE "deletedAt" IS NULL
             ORDER BY id ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .instrument(info_span!("fetch_source_rows", table = SOURCE_TABLE))
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(decode_source_row(&row)?);
        }
        Ok(out)
    }

    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCatalogTransaction { tx }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn decode_source_row(row: &PgRow) -> Result<ExerciseVideoRow, sqlx::Error> {
    Ok(ExerciseVideoRow {
        id: row.try_get("id")?,
        exercise_id: row.try_get("exercise_id")?,
        video_type: row
            .try_get::<Option<String>, _>("video_type")?
            .unwrap_or_default(),
        video_id: row.try_get("video_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        duration_seconds: row.try_get("duration_seconds")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        uploader_id: row.try_get("uploader_id")?,
        approved: row.try_get("approved")?,
        is_public: row.try_get("is_public")?,
        views: row.try_get("views")?,
        tags: row.try_get("tags")?,
        chapters: row.try_get("chapters")?,
        deleted_at: row.try_get("deleted_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct PgCatalogTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CatalogTransaction for PgCatalogTransaction {
    async fn insert_batch(&mut self, entries: &[CatalogEntry]) -> Result<u64, StoreError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut builder = catalog_insert_builder(entries);
        debug!(rows = entries.len(), "executing catalog insert");
        let result = builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Builds one parameterized multi-row insert for `entries`. JSON columns are
/// cast to `jsonb` and enum columns to their `enum_video_catalog_*` types.
pub fn catalog_insert_builder(entries: &[CatalogEntry]) -> QueryBuilder<'_, Postgres> {
    let columns = CATALOG_COLUMNS
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut builder = QueryBuilder::new(format!("INSERT INTO {CATALOG_TABLE} ({columns}) "));

    builder.push_values(entries, |mut b, entry| {
        b.push_bind(entry.id)
            .push_bind(entry.title.as_str())
            .push_bind(entry.slug.as_str())
            .push_bind(entry.description.as_deref());
        b.push_bind(entry.source.as_str())
            .push_unseparated("::enum_video_catalog_source");
        b.push_bind(entry.visibility.as_str())
            .push_unseparated("::enum_video_catalog_visibility");
        b.push_bind(entry.access_tier.as_str())
            .push_unseparated("::enum_video_catalog_access_tier");
        b.push_bind(entry.status.as_str())
            .push_unseparated("::enum_video_catalog_status");
        b.push_bind(entry.youtube_video_id.as_deref())
            .push_bind(entry.hosted_key.as_deref())
            .push_bind(entry.thumbnail_url.as_deref())
            .push_bind(entry.duration_seconds)
            .push_bind(entry.view_count)
            .push_bind(entry.like_count);
        b.push_bind(&entry.tags).push_unseparated("::jsonb");
        b.push_bind(&entry.chapters).push_unseparated("::jsonb");
        b.push_bind(entry.exercise_id)
            .push_bind(entry.creator_id)
            .push_bind(entry.metadata_completed)
            .push_bind(entry.legacy_import)
            .push_bind(entry.featured)
            .push_bind(entry.sort_order)
            .push_bind(entry.published_at)
            .push_bind(entry.created_at)
            .push_bind(entry.updated_at);
    });

    builder
}

/// Quotes an identifier for interpolation into SQL text.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
