use backfill_core::CatalogEntry;
use backfill_storage::CatalogStore;
use tracing::{error, info, info_span, Instrument};

use crate::config::BATCH_SIZE;
use crate::BackfillError;

/// Writes entries as fixed-size multi-row inserts inside one transaction.
#[derive(Debug, Clone, Copy)]
pub struct BatchWriter {
    batch_size: usize,
}

impl Default for BatchWriter {
    fn default() -> Self {
        Self::new(BATCH_SIZE)
    }
}

impl BatchWriter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// All batches land or none do: the first failing batch rolls the whole
    /// transaction back and its error is returned unchanged. Returns the number
    /// of rows committed.
    pub async fn write_all<S>(
        &self,
        store: &S,
        entries: &[CatalogEntry],
    ) -> Result<usize, BackfillError>
    where
        S: CatalogStore + ?Sized,
    {
        let total = entries.len();
        let total_batches = total.div_ceil(self.batch_size);
        info!(rows = total, batches = total_batches, "beginning transaction");

        let mut tx = store.begin().await?;
        let mut inserted = 0usize;

        for (index, chunk) in entries.chunks(self.batch_size).enumerate() {
            let batch = index + 1;
            let result = tx
                .insert_batch(chunk)
                .instrument(info_span!("insert_batch", batch, rows = chunk.len()))
                .await;

            match result {
                Ok(_) => {
                    inserted += chunk.len();
                    info!(
                        "batch {batch}/{total_batches}: inserted {} rows ({inserted}/{total} total)",
                        chunk.len()
                    );
                }
                Err(source) => {
                    error!(batch, error = %source, "batch insert failed, rolling back");
                    if let Err(rollback_err) = tx.rollback().await {
                        error!(error = %rollback_err, "rollback failed");
                    }
                    return Err(BackfillError::BatchFailed { batch, source });
                }
            }
        }

        tx.commit()
            .await
            .map_err(|source| BackfillError::CommitFailed { source })?;
        info!(inserted, "transaction committed");

        Ok(inserted)
    }
}
