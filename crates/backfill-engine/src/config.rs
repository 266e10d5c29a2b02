use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::BackfillError;

/// Report file name, relative to the working directory unless overridden.
pub const DEFAULT_REPORT_FILE: &str = "backfill-duplicate-report.json";

/// Rows per multi-row insert statement.
pub const BATCH_SIZE: usize = 50;

/// More duplicate groups than this aborts the run unless forced.
pub const DUPLICATE_GROUP_THRESHOLD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    #[serde(rename = "dry-run")]
    DryRun,
    #[serde(rename = "confirm")]
    Confirm,
}

impl RunMode {
    pub fn from_confirm_flag(confirm: bool) -> Self {
        if confirm {
            Self::Confirm
        } else {
            Self::DryRun
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DryRun => "dry-run",
            Self::Confirm => "confirm",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub database_url: String,
    pub report_path: PathBuf,
    pub mode: RunMode,
    pub force_over_threshold: bool,
    pub batch_size: usize,
    pub duplicate_threshold: usize,
}

impl BackfillConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            report_path: PathBuf::from(DEFAULT_REPORT_FILE),
            mode: RunMode::DryRun,
            force_over_threshold: false,
            batch_size: BATCH_SIZE,
            duplicate_threshold: DUPLICATE_GROUP_THRESHOLD,
        }
    }

    pub fn from_env() -> Result<Self, BackfillError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `DATABASE_URL` (required) and `BACKFILL_REPORT_PATH` through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BackfillError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(BackfillError::MissingConfig("DATABASE_URL"))?;

        let mut config = Self::new(database_url);
        if let Some(path) = lookup("BACKFILL_REPORT_PATH").filter(|v| !v.trim().is_empty()) {
            config.report_path = PathBuf::from(path);
        }
        Ok(config)
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_force_over_threshold(mut self, force: bool) -> Self {
        self.force_over_threshold = force;
        self
    }

    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = path.into();
        self
    }

    pub fn validate(&self) -> Result<(), BackfillError> {
        if self.batch_size == 0 {
            return Err(BackfillError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
