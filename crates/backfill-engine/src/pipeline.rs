use backfill_core::CATALOG_TABLE;
use backfill_storage::CatalogStore;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::classify::classify;
use crate::config::{BackfillConfig, RunMode};
use crate::dedup::deduplicate;
use crate::extract::extract_rows;
use crate::guard::check_preconditions;
use crate::report::{write_report, ReportDestination, RunReport};
use crate::slug::SlugAllocator;
use crate::transform::Transformer;
use crate::writer::BatchWriter;
use crate::BackfillError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub source_rows: usize,
    pub youtube_canonical: usize,
    pub youtube_duplicates: usize,
    pub upload: usize,
    pub skipped_other: usize,
    pub transform_errors: usize,
    pub rows_to_insert: usize,
    pub inserted: usize,
    /// Catalog row count re-read after commit; `None` when nothing was written.
    pub catalog_rows_after: Option<i64>,
    pub report: ReportDestination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    NothingToMigrate,
    DryRun(RunSummary),
    Committed(RunSummary),
}

impl RunOutcome {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::NothingToMigrate => None,
            Self::DryRun(summary) | Self::Committed(summary) => Some(summary),
        }
    }
}

pub struct BackfillPipeline<S> {
    store: S,
    config: BackfillConfig,
}

impl<S> BackfillPipeline<S>
where
    S: CatalogStore,
{
    pub fn new(store: S, config: BackfillConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn run(&self) -> Result<RunOutcome, BackfillError> {
        let span = info_span!("backfill", mode = self.config.mode.as_str());
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<RunOutcome, BackfillError> {
        self.config.validate()?;
        let mode = self.config.mode;

        check_preconditions(&self.store).await?;

        let rows = extract_rows(&self.store).await?;
        if rows.is_empty() {
            info!("nothing to migrate");
            return Ok(RunOutcome::NothingToMigrate);
        }
        let source_rows = rows.len();

        let classified = classify(rows);
        let skipped_other = classified.skipped.len();
        let upload_rows = classified.upload;
        let dedup = deduplicate(classified.youtube);

        let duplicate_groups = dedup.duplicate_group_count();
        if duplicate_groups > self.config.duplicate_threshold {
            if !self.config.force_over_threshold {
                let report = RunReport::build(Utc::now(), mode, &dedup.groups, Vec::new(), skipped_other);
                write_report(&report, &self.config.report_path).await?;
                return Err(BackfillError::DuplicateThresholdExceeded {
                    groups: duplicate_groups,
                    threshold: self.config.duplicate_threshold,
                });
            }
            warn!(
                groups = duplicate_groups,
                threshold = self.config.duplicate_threshold,
                "duplicate group threshold exceeded, continuing because the run is forced"
            );
        }

        let mut transformer = Transformer::new(SlugAllocator::default(), Utc::now());
        let output = transformer.transform_all(&dedup.canonical, &upload_rows);

        info!(
            youtube = dedup.canonical.len(),
            upload = upload_rows.len(),
            skipped_duplicates = dedup.shadow_count(),
            skipped_other,
            transform_errors = output.errors.len(),
            rows_to_insert = output.entries.len(),
            "transform summary"
        );
        for err in &output.errors {
            warn!(row_id = %err.row_id, kind = %err.category, "{}", err.reason);
        }

        let transform_errors = output.errors.len();
        let report = RunReport::build(Utc::now(), mode, &dedup.groups, output.errors, skipped_other);
        let destination = write_report(&report, &self.config.report_path).await?;

        let mut summary = RunSummary {
            mode,
            source_rows,
            youtube_canonical: dedup.canonical.len(),
            youtube_duplicates: dedup.shadow_count(),
            upload: upload_rows.len(),
            skipped_other,
            transform_errors,
            rows_to_insert: output.entries.len(),
            inserted: 0,
            catalog_rows_after: None,
            report: destination,
        };

        if mode == RunMode::DryRun {
            info!("dry run complete, no rows written");
            return Ok(RunOutcome::DryRun(summary));
        }

        if output.entries.is_empty() {
            warn!("no rows to insert after transform");
            return Ok(RunOutcome::Committed(summary));
        }

        let inserted = BatchWriter::new(self.config.batch_size)
            .write_all(&self.store, &output.entries)
            .await?;
        summary.inserted = inserted;

        let after = self.store.count_rows(CATALOG_TABLE).await?;
        if usize::try_from(after).ok() != Some(inserted) {
            warn!(
                expected = inserted,
                found = after,
                "{CATALOG_TABLE} row count differs from inserted rows"
            );
        }
        info!(rows = after, "verification: {CATALOG_TABLE} now has {after} rows");
        summary.catalog_rows_after = Some(after);

        Ok(RunOutcome::Committed(summary))
    }
}
