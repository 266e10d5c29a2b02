//! In-process store with the same transactional contract as Postgres.
//!
//! Inserted batches stay private to the open transaction until `commit`.
//! A batch number can be armed to fail, and duplicate slugs or YouTube ids
//! are rejected the way the catalog's unique indexes reject them.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use backfill_core::{CatalogEntry, ExerciseVideoRow, CATALOG_TABLE, SOURCE_TABLE};
use tokio::sync::Mutex;

use crate::{CatalogStore, CatalogTransaction, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    source_rows: Option<Vec<ExerciseVideoRow>>,
    catalog: Option<Vec<CatalogEntry>>,
    fail_on_batch: Option<usize>,
    insert_statements: usize,
    transactions_begun: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryCatalogStore {
    /// Both tables present, catalog empty.
    pub fn new(source_rows: Vec<ExerciseVideoRow>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                source_rows: Some(source_rows),
                catalog: Some(Vec::new()),
                ..Default::default()
            })),
        }
    }

    pub fn without_source_table() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                catalog: Some(Vec::new()),
                ..Default::default()
            })),
        }
    }

    pub fn without_catalog_table(source_rows: Vec<ExerciseVideoRow>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                source_rows: Some(source_rows),
                ..Default::default()
            })),
        }
    }

    pub async fn seed_catalog(&self, entries: Vec<CatalogEntry>) {
        let mut state = self.state.lock().await;
        state.catalog.get_or_insert_with(Vec::new).extend(entries);
    }

    /// Makes the `batch`-th insert (counting from 1) of any transaction fail.
    pub async fn fail_on_batch(&self, batch: usize) {
        self.state.lock().await.fail_on_batch = Some(batch);
    }

    pub async fn catalog_rows(&self) -> Vec<CatalogEntry> {
        self.state.lock().await.catalog.clone().unwrap_or_default()
    }

    pub async fn insert_statements(&self) -> usize {
        self.state.lock().await.insert_statements
    }

    pub async fn transactions_begun(&self) -> usize {
        self.state.lock().await.transactions_begun
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(match table {
            SOURCE_TABLE => state.source_rows.is_some(),
            CATALOG_TABLE => state.catalog.is_some(),
            _ => false,
        })
    }

    async fn count_rows(&self, table: &str) -> Result<i64, StoreError> {
        let state = self.state.lock().await;
        let count = match table {
            SOURCE_TABLE => state.source_rows.as_ref().map(Vec::len),
            CATALOG_TABLE => state.catalog.as_ref().map(Vec::len),
            _ => None,
        };
        count
            .map(|n| n as i64)
            .ok_or_else(|| StoreError::MissingTable(table.to_string()))
    }

    async fn fetch_source_rows(&self) -> Result<Vec<ExerciseVideoRow>, StoreError> {
        let state = self.state.lock().await;
        let rows = state
            .source_rows
            .as_ref()
            .ok_or_else(|| StoreError::MissingTable(SOURCE_TABLE.to_string()))?;
        let mut live = rows
            .iter()
            .filter(|row| row.deleted_at.is_none())
            .cloned()
            .collect::<Vec<_>>();
        live.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(live)
    }

    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, StoreError> {
        let mut state = self.state.lock().await;
        if state.catalog.is_none() {
            return Err(StoreError::MissingTable(CATALOG_TABLE.to_string()));
        }
        state.transactions_begun += 1;
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
            batches: 0,
        }))
    }
}

fn unique_violation(column: &str, value: &str) -> StoreError {
    StoreError::Rejected(format!(
        "duplicate key value violates unique constraint on {column} ({value})"
    ))
}

struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    staged: Vec<CatalogEntry>,
    batches: usize,
}

#[async_trait]
impl CatalogTransaction for MemoryTransaction {
    async fn insert_batch(&mut self, entries: &[CatalogEntry]) -> Result<u64, StoreError> {
        self.batches += 1;
        let batch = self.batches;

        let mut state = self.state.lock().await;
        state.insert_statements += 1;
        if state.fail_on_batch == Some(batch) {
            return Err(StoreError::Rejected(format!(
                "injected failure on batch {batch}"
            )));
        }

        let existing = state
            .catalog
            .iter()
            .flatten()
            .chain(self.staged.iter())
            .collect::<Vec<_>>();
        let mut slugs = existing
            .iter()
            .map(|entry| entry.slug.as_str())
            .collect::<HashSet<_>>();
        let mut youtube_ids = existing
            .iter()
            .filter_map(|entry| entry.youtube_video_id.as_deref())
            .collect::<HashSet<_>>();
        for entry in entries {
            if !slugs.insert(entry.slug.as_str()) {
                return Err(unique_violation("slug", &entry.slug));
            }
            if let Some(youtube_id) = entry.youtube_video_id.as_deref() {
                if !youtube_ids.insert(youtube_id) {
                    return Err(unique_violation("youtube_video_id", youtube_id));
                }
            }
        }

        self.staged.extend_from_slice(entries);
        Ok(entries.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { state, staged, .. } = *self;
        state
            .lock()
            .await
            .catalog
            .get_or_insert_with(Vec::new)
            .extend(staged);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backfill_core::{AccessTier, CatalogSource, PublishStatus, Visibility};
    use chrono::Utc;
    use uuid::Uuid;

    fn row(id: &str) -> ExerciseVideoRow {
        ExerciseVideoRow {
            id: id.to_string(),
            video_type: "youtube".to_string(),
            ..Default::default()
        }
    }

    fn entry(slug: &str) -> CatalogEntry {
        let now = Utc::now();
        CatalogEntry {
            id: Uuid::new_v4(),
            title: slug.to_string(),
            slug: slug.to_string(),
            description: None,
            source: CatalogSource::Upload,
            visibility: Visibility::Unlisted,
            access_tier: AccessTier::Free,
            status: PublishStatus::Archived,
            youtube_video_id: None,
            hosted_key: None,
            thumbnail_url: None,
            duration_seconds: None,
            view_count: 0,
            like_count: 0,
            tags: serde_json::json!([]),
            chapters: serde_json::json!([]),
            exercise_id: None,
            creator_id: 1,
            metadata_completed: true,
            legacy_import: true,
            featured: false,
            sort_order: 0,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn fetch_skips_soft_deleted_rows_and_orders_by_id() {
        let mut deleted = row("b");
        deleted.deleted_at = Some(Utc::now());
        let store = MemoryCatalogStore::new(vec![row("c"), deleted, row("a")]);

        let rows = store.fetch_source_rows().await.expect("fetch");
        let ids = rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn uncommitted_batches_are_invisible_and_discarded_on_rollback() {
        let store = MemoryCatalogStore::new(vec![]);
        let mut tx = store.begin().await.expect("begin");
        tx.insert_batch(&[entry("one"), entry("two")])
            .await
            .expect("insert");
        assert_eq!(store.count_rows(CATALOG_TABLE).await.expect("count"), 0);

        tx.rollback().await.expect("rollback");
        assert!(store.catalog_rows().await.is_empty());
    }

    #[tokio::test]
    async fn armed_batch_fails_and_duplicate_slugs_are_rejected() {
        let store = MemoryCatalogStore::new(vec![]);
        store.fail_on_batch(2).await;

        let mut tx = store.begin().await.expect("begin");
        tx.insert_batch(&[entry("one")]).await.expect("first batch");
        let err = tx.insert_batch(&[entry("two")]).await.unwrap_err();
        assert_eq!(err.to_string(), "insert rejected: injected failure on batch 2");
        assert!(tx.insert_batch(&[entry("one")]).await.is_err());
        tx.commit().await.expect("commit");

        let rows = store.catalog_rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(store.insert_statements().await, 3);
    }

    #[tokio::test]
    async fn duplicate_youtube_ids_are_rejected_across_batches() {
        let store = MemoryCatalogStore::new(vec![]);
        let mut first = entry("first");
        first.youtube_video_id = Some("dQw4w9WgXcQ".to_string());
        let mut second = entry("second");
        second.youtube_video_id = Some("dQw4w9WgXcQ".to_string());

        let mut tx = store.begin().await.expect("begin");
        tx.insert_batch(&[first, entry("no-video-a"), entry("no-video-b")])
            .await
            .expect("null youtube ids never collide");
        let err = tx.insert_batch(&[second]).await.unwrap_err();

        assert!(err.to_string().contains("youtube_video_id (dQw4w9WgXcQ)"));
    }

    #[tokio::test]
    async fn missing_tables_are_reported() {
        let store = MemoryCatalogStore::without_catalog_table(vec![]);
        assert!(store.table_exists(SOURCE_TABLE).await.expect("exists"));
        assert!(!store.table_exists(CATALOG_TABLE).await.expect("exists"));
        assert!(store.begin().await.is_err());
    }
}
