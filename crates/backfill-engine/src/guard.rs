use backfill_core::{CATALOG_TABLE, SOURCE_TABLE};
use backfill_storage::CatalogStore;
use tracing::info;

use crate::BackfillError;

/// Refuses to go further unless both tables exist and the catalog is empty.
///
/// An empty catalog is the only signal that this backfill has not already run;
/// there is no partial-resume mode.
pub async fn check_preconditions<S>(store: &S) -> Result<(), BackfillError>
where
    S: CatalogStore + ?Sized,
{
    if !store.table_exists(SOURCE_TABLE).await? {
        return Err(BackfillError::MissingTable {
            table: SOURCE_TABLE.to_string(),
            hint: "Nothing to migrate.",
        });
    }
    if !store.table_exists(CATALOG_TABLE).await? {
        return Err(BackfillError::MissingTable {
            table: CATALOG_TABLE.to_string(),
            hint: "Run the video catalog schema migration first.",
        });
    }

    let rows = store.count_rows(CATALOG_TABLE).await?;
    if rows > 0 {
        return Err(BackfillError::CatalogNotEmpty {
            table: CATALOG_TABLE.to_string(),
            rows,
        });
    }

    info!("preconditions satisfied: {SOURCE_TABLE} and empty {CATALOG_TABLE} present");
    Ok(())
}
