use std::collections::BTreeMap;

use backfill_core::{ExerciseVideoRow, VideoKind};
use tracing::{info, warn};

/// Extracted rows partitioned by `video_type`.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedRows {
    pub youtube: Vec<ExerciseVideoRow>,
    pub upload: Vec<ExerciseVideoRow>,
    /// Unrecognised `video_type` values. Counted and reported, never written.
    pub skipped: Vec<ExerciseVideoRow>,
}

impl ClassifiedRows {
    pub fn skipped_by_type(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.skipped {
            *counts.entry(row.video_type.clone()).or_default() += 1;
        }
        counts
    }
}

pub fn classify(rows: Vec<ExerciseVideoRow>) -> ClassifiedRows {
    let mut classified = ClassifiedRows::default();
    for row in rows {
        match row.kind() {
            VideoKind::YouTube => classified.youtube.push(row),
            VideoKind::Upload => classified.upload.push(row),
            VideoKind::Other(_) => classified.skipped.push(row),
        }
    }

    info!(
        youtube = classified.youtube.len(),
        upload = classified.upload.len(),
        "classified rows: youtube={} upload={}",
        classified.youtube.len(),
        classified.upload.len()
    );
    if !classified.skipped.is_empty() {
        warn!(
            skipped = classified.skipped.len(),
            by_type = ?classified.skipped_by_type(),
            "rows with unexpected video_type will be skipped"
        );
    }
    classified
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, video_type: &str) -> ExerciseVideoRow {
        ExerciseVideoRow {
            id: id.to_string(),
            video_type: video_type.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn partitions_into_known_kinds_and_skip_bucket() {
        let classified = classify(vec![
            row("1", "youtube"),
            row("2", "upload"),
            row("3", "vimeo"),
            row("4", "youtube"),
            row("5", ""),
            row("6", "vimeo"),
        ]);

        assert_eq!(classified.youtube.len(), 2);
        assert_eq!(classified.upload.len(), 1);
        assert_eq!(classified.skipped.len(), 3);

        let by_type = classified.skipped_by_type();
        assert_eq!(by_type.get("vimeo"), Some(&2));
        assert_eq!(by_type.get(""), Some(&1));
    }

    #[test]
    fn preserves_extraction_order_within_bucket() {
        let classified = classify(vec![row("b", "upload"), row("a", "upload")]);
        let ids = classified
            .upload
            .iter()
            .map(|r| r.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
