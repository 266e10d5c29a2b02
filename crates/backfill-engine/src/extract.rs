use backfill_core::{ExerciseVideoRow, SOURCE_TABLE};
use backfill_storage::CatalogStore;
use tracing::info;

use crate::BackfillError;

/// Single bulk read of every live legacy row, ordered by id.
pub async fn extract_rows<S>(store: &S) -> Result<Vec<ExerciseVideoRow>, BackfillError>
where
    S: CatalogStore + ?Sized,
{
    let rows = store.fetch_source_rows().await?;
    info!(rows = rows.len(), "found {} rows in {SOURCE_TABLE}", rows.len());
    Ok(rows)
}
