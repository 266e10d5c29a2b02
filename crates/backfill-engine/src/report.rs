//! Duplicate/error report written once per run.
//!
//! The JSON shape is consumed by manual reconciliation, so field names are
//! stable: `generated_at`, `mode`, `summary`, `duplicate_groups`,
//! `transform_errors`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RunMode;
use crate::dedup::DuplicateGroup;
use crate::transform::TransformError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub duplicate_youtube_groups: usize,
    pub total_skipped_duplicates: usize,
    pub transform_errors: usize,
    pub skipped_other_type: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowRowEntry {
    pub id: String,
    pub video_type: String,
    pub exercise_id: Option<Uuid>,
    pub title: Option<String>,
    pub uploader_id: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroupEntry {
    pub youtube_video_id: String,
    pub canonical_id: String,
    pub canonical_exercise_id: Option<Uuid>,
    pub canonical_title: Option<String>,
    pub skipped_rows: Vec<ShadowRowEntry>,
}

impl From<&DuplicateGroup> for DuplicateGroupEntry {
    fn from(group: &DuplicateGroup) -> Self {
        Self {
            youtube_video_id: group.youtube_video_id.clone(),
            canonical_id: group.canonical.id.clone(),
            canonical_exercise_id: group.canonical.exercise_id,
            canonical_title: group.canonical.title.clone(),
            skipped_rows: group
                .shadows
                .iter()
                .map(|row| ShadowRowEntry {
                    id: row.id.clone(),
                    video_type: row.video_type.clone(),
                    exercise_id: row.exercise_id,
                    title: row.title.clone(),
                    uploader_id: row.uploader_id,
                    created_at: row.created_at,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub mode: RunMode,
    pub summary: ReportSummary,
    pub duplicate_groups: Vec<DuplicateGroupEntry>,
    pub transform_errors: Vec<TransformError>,
}

impl RunReport {
    pub fn build(
        generated_at: DateTime<Utc>,
        mode: RunMode,
        groups: &[DuplicateGroup],
        transform_errors: Vec<TransformError>,
        skipped_other_type: usize,
    ) -> Self {
        let duplicate_groups = groups.iter().map(DuplicateGroupEntry::from).collect::<Vec<_>>();
        let summary = ReportSummary {
            duplicate_youtube_groups: duplicate_groups.len(),
            total_skipped_duplicates: duplicate_groups.iter().map(|g| g.skipped_rows.len()).sum(),
            transform_errors: transform_errors.len(),
            skipped_other_type,
        };
        Self {
            generated_at,
            mode,
            summary,
            duplicate_groups,
            transform_errors,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing duplicate report")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReportDestination {
    File(PathBuf),
    Stdout,
}

pub async fn write_report(report: &RunReport, path: &Path) -> Result<ReportDestination> {
    write_report_with_fallback(report, path, &mut std::io::stdout()).await
}

/// Writes the report to `path`, or to `fallback` when the file cannot be
/// written. Only serialization or fallback write errors are returned.
pub async fn write_report_with_fallback<W: Write>(
    report: &RunReport,
    path: &Path,
    fallback: &mut W,
) -> Result<ReportDestination> {
    let body = report.to_json_pretty()?;

    match persist(path, &body).await {
        Ok(()) => {
            info!("duplicate report written to {}", path.display());
            Ok(ReportDestination::File(path.to_path_buf()))
        }
        Err(err) => {
            warn!("failed to write duplicate report: {err:#}");
            writeln!(fallback, "--- DUPLICATE REPORT (stdout fallback) ---")
                .and_then(|()| writeln!(fallback, "{body}"))
                .and_then(|()| writeln!(fallback, "--- END REPORT ---"))
                .and_then(|()| fallback.flush())
                .context("writing duplicate report to fallback output")?;
            Ok(ReportDestination::Stdout)
        }
    }
}

async fn persist(path: &Path, body: &str) -> Result<()> {
    fs::write(path, body)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use backfill_core::ExerciseVideoRow;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn row(id: &str) -> ExerciseVideoRow {
        ExerciseVideoRow {
            id: id.to_string(),
            video_type: "youtube".to_string(),
            title: Some(format!("title {id}")),
            uploader_id: Some(4),
            ..Default::default()
        }
    }

    fn report() -> RunReport {
        let group = DuplicateGroup {
            youtube_video_id: "ABC12345678".to_string(),
            canonical: row("a"),
            shadows: vec![row("b"), row("c")],
        };
        RunReport::build(
            Utc.with_ymd_and_hms(2026, 2, 18, 0, 0, 0).single().unwrap(),
            RunMode::DryRun,
            &[group],
            vec![TransformError {
                row_id: "u9".into(),
                category: "upload".into(),
                reason: "uploader_id is NULL".into(),
            }],
            1,
        )
    }

    #[test]
    fn summary_counts_groups_shadows_and_errors() {
        let report = report();
        assert_eq!(
            report.summary,
            ReportSummary {
                duplicate_youtube_groups: 1,
                total_skipped_duplicates: 2,
                transform_errors: 1,
                skipped_other_type: 1,
            }
        );
    }

    #[test]
    fn json_shape_is_stable() {
        let value = serde_json::to_value(report()).unwrap();
        assert_eq!(value["mode"], "dry-run");
        assert_eq!(value["generated_at"], "2026-02-18T00:00:00Z");
        assert_eq!(value["summary"]["total_skipped_duplicates"], 2);
        let group = &value["duplicate_groups"][0];
        assert_eq!(group["youtube_video_id"], "ABC12345678");
        assert_eq!(group["canonical_id"], "a");
        assert_eq!(group["skipped_rows"][0]["id"], "b");
        assert_eq!(group["skipped_rows"][1]["video_type"], "youtube");
        assert_eq!(value["transform_errors"][0]["type"], "upload");
    }

    #[tokio::test]
    async fn writes_report_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("report.json");
        let mut fallback = Vec::new();

        let dest = write_report_with_fallback(&report(), &path, &mut fallback)
            .await
            .expect("write");

        assert_eq!(dest, ReportDestination::File(path.clone()));
        assert!(fallback.is_empty());
        let parsed: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, report());
    }

    #[tokio::test]
    async fn unwritable_path_falls_back_to_stdout() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("missing-dir").join("report.json");
        let mut fallback = Vec::new();

        let dest = write_report_with_fallback(&report(), &path, &mut fallback)
            .await
            .expect("fallback write");

        assert_eq!(dest, ReportDestination::Stdout);
        let text = String::from_utf8(fallback).unwrap();
        assert!(text.starts_with("--- DUPLICATE REPORT (stdout fallback) ---"));
        assert!(text.contains("\"canonical_id\": \"a\""));
        assert!(text.trim_end().ends_with("--- END REPORT ---"));
    }
}
