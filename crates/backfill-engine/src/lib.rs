//! One-shot backfill of `exercise_videos` into `video_catalog`.
//!
//! Stages run strictly in order: precondition guard, extraction,
//! classification by `video_type`, YouTube dedup, per-kind transform with slug
//! allocation, report, and (only in confirm mode) a single-transaction batched
//! insert. [`BackfillPipeline`] wires them together.

use backfill_storage::StoreError;
use thiserror::Error;

pub mod classify;
pub mod config;
pub mod dedup;
pub mod extract;
pub mod guard;
pub mod pipeline;
pub mod report;
pub mod slug;
pub mod transform;
pub mod writer;

pub use classify::{classify, ClassifiedRows};
pub use config::{BackfillConfig, RunMode, BATCH_SIZE, DEFAULT_REPORT_FILE, DUPLICATE_GROUP_THRESHOLD};
pub use dedup::{deduplicate, extract_youtube_video_id, DedupOutcome, DuplicateGroup, KeyMatcher};
pub use pipeline::{BackfillPipeline, RunOutcome, RunSummary};
pub use report::{ReportDestination, RunReport};
pub use slug::{slugify, SlugAllocator};
pub use transform::{TransformError, TransformFailure, TransformOutput, Transformer};
pub use writer::BatchWriter;

pub const CRATE_NAME: &str = "backfill-engine";

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("{0} environment variable is required")]
    MissingConfig(&'static str),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{table} table does not exist. {hint}")]
    MissingTable { table: String, hint: &'static str },
    #[error(
        "{table} already contains {rows} rows; this backfill is for initial migration only and re-running may create duplicates"
    )]
    CatalogNotEmpty { table: String, rows: i64 },
    #[error(
        "{groups} duplicate YouTube video id groups exceed the safety threshold of {threshold}; re-run with --force-over-20 to proceed"
    )]
    DuplicateThresholdExceeded { groups: usize, threshold: usize },
    #[error("batch {batch} failed, transaction rolled back and no rows were inserted: {source}")]
    BatchFailed {
        batch: usize,
        #[source]
        source: StoreError,
    },
    #[error("commit failed, no rows were inserted: {source}")]
    CommitFailed {
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
