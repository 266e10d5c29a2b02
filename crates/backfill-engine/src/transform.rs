//! Legacy row -> `video_catalog` entry mapping.
//!
//! Mapping rules common to both kinds:
//!
//! | column | rule |
//! |---|---|
//! | `title` | source title, or `Untitled Video`; at most 300 chars |
//! | `slug` | allocated from the source title, or `untitled` |
//! | `visibility` | `public` if `is_public`, else `unlisted` |
//! | `access_tier` | `free` |
//! | `view_count` | `views`, or 0 |
//! | `tags`, `chapters` | source JSON, or `[]` |
//! | `exercise_id` | preserved, nullable |
//! | `creator_id` | `uploader_id`; NULL is a transform error |
//! | `created_at`, `updated_at` | source value, or the run clock |
//!
//! YouTube rows additionally map `approved` to `published`/`draft` and carry
//! the extracted video id. Upload rows are archived with a legacy notice, since
//! their media files did not survive the old hosting.

use backfill_core::{
    AccessTier, CatalogEntry, CatalogSource, ExerciseVideoRow, PublishStatus, VideoKind,
    Visibility,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::dedup::extract_youtube_video_id;
use crate::slug::SlugAllocator;

pub const TITLE_MAX_LEN: usize = 300;
pub const YOUTUBE_ID_MAX_LEN: usize = 20;
pub const UNTITLED_TITLE: &str = "Untitled Video";
pub const LEGACY_UPLOAD_NOTICE: &str =
    "[Legacy] Original file lost during Render migration. Re-upload needed.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformFailure {
    #[error("Cannot extract YouTube video ID from video_id={0:?}")]
    MissingYouTubeId(Option<String>),
    #[error("YouTube video ID {0:?} is longer than 20 characters")]
    YouTubeIdTooLong(String),
    #[error("uploader_id is NULL - cannot map to creator_id (NOT NULL in video_catalog)")]
    MissingUploader,
}

/// A row that could not be mapped, as it appears in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformError {
    pub row_id: String,
    #[serde(rename = "type")]
    pub category: String,
    #[serde(rename = "error")]
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub entries: Vec<CatalogEntry>,
    pub errors: Vec<TransformError>,
}

pub struct Transformer {
    slugs: SlugAllocator,
    now: DateTime<Utc>,
}

impl Transformer {
    /// `now` stands in for missing timestamps so one run uses one clock value.
    pub fn new(slugs: SlugAllocator, now: DateTime<Utc>) -> Self {
        Self { slugs, now }
    }

    /// Maps canonical YouTube rows, then upload rows. Failures are collected
    /// per row and never stop the batch.
    pub fn transform_all(
        &mut self,
        youtube: &[ExerciseVideoRow],
        upload: &[ExerciseVideoRow],
    ) -> TransformOutput {
        let mut output = TransformOutput::default();
        for row in youtube {
            self.collect(&mut output, row, VideoKind::YouTube, Self::transform_youtube);
        }
        for row in upload {
            self.collect(&mut output, row, VideoKind::Upload, Self::transform_upload);
        }
        output
    }

    fn collect(
        &mut self,
        output: &mut TransformOutput,
        row: &ExerciseVideoRow,
        kind: VideoKind,
        map: fn(&mut Self, &ExerciseVideoRow) -> Result<CatalogEntry, TransformFailure>,
    ) {
        match map(self, row) {
            Ok(entry) => output.entries.push(entry),
            Err(failure) => output.errors.push(TransformError {
                row_id: row.id.clone(),
                category: kind.as_str().to_string(),
                reason: failure.to_string(),
            }),
        }
    }

    pub fn transform_youtube(
        &mut self,
        row: &ExerciseVideoRow,
    ) -> Result<CatalogEntry, TransformFailure> {
        let youtube_id = extract_youtube_video_id(row.video_id.as_deref())
            .ok_or_else(|| TransformFailure::MissingYouTubeId(row.video_id.clone()))?;
        // the column is uniquely indexed, so a cut-down key could collide
        if youtube_id.chars().count() > YOUTUBE_ID_MAX_LEN {
            return Err(TransformFailure::YouTubeIdTooLong(youtube_id));
        }
        let creator_id = row.uploader_id.ok_or(TransformFailure::MissingUploader)?;

        let published = row.approved == Some(true);
        let created_at = row.created_at.unwrap_or(self.now);

        Ok(CatalogEntry {
            description: non_blank(row.description.as_deref()),
            source: CatalogSource::YouTube,
            status: if published {
                PublishStatus::Published
            } else {
                PublishStatus::Draft
            },
            youtube_video_id: Some(youtube_id),
            legacy_import: false,
            published_at: published.then_some(created_at),
            ..self.common_fields(row, creator_id)
        })
    }

    pub fn transform_upload(
        &mut self,
        row: &ExerciseVideoRow,
    ) -> Result<CatalogEntry, TransformFailure> {
        let creator_id = row.uploader_id.ok_or(TransformFailure::MissingUploader)?;

        let description = match non_blank(row.description.as_deref()) {
            Some(original) => format!("{original}\n\n{LEGACY_UPLOAD_NOTICE}"),
            None => LEGACY_UPLOAD_NOTICE.to_string(),
        };

        Ok(CatalogEntry {
            description: Some(description),
            source: CatalogSource::Upload,
            status: PublishStatus::Archived,
            youtube_video_id: None,
            hosted_key: None,
            legacy_import: true,
            published_at: None,
            ..self.common_fields(row, creator_id)
        })
    }

    /// Columns mapped the same way for every kind. Only called once the row
    /// has passed validation, so failed rows never consume a slug.
    fn common_fields(&mut self, row: &ExerciseVideoRow, creator_id: i32) -> CatalogEntry {
        let title = non_blank(row.title.as_deref());
        let slug = self
            .slugs
            .allocate(title.as_deref().unwrap_or(crate::slug::FALLBACK_SLUG));

        CatalogEntry {
            id: Uuid::new_v4(),
            title: truncate_chars(title.as_deref().unwrap_or(UNTITLED_TITLE), TITLE_MAX_LEN),
            slug,
            description: None,
            source: CatalogSource::YouTube,
            visibility: if row.is_public == Some(true) {
                Visibility::Public
            } else {
                Visibility::Unlisted
            },
            access_tier: AccessTier::Free,
            status: PublishStatus::Draft,
            youtube_video_id: None,
            hosted_key: None,
            thumbnail_url: non_blank(row.thumbnail_url.as_deref()),
            // zero-length legacy durations mean "unknown"
            duration_seconds: row.duration_seconds.filter(|d| *d != 0),
            view_count: row.views.unwrap_or(0),
            like_count: 0,
            tags: json_or_empty_array(row.tags.as_ref()),
            chapters: json_or_empty_array(row.chapters.as_ref()),
            exercise_id: row.exercise_id,
            creator_id,
            metadata_completed: true,
            legacy_import: false,
            featured: false,
            sort_order: 0,
            published_at: None,
            created_at: row.created_at.unwrap_or(self.now),
            updated_at: row.updated_at.unwrap_or(self.now),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).map(str::to_string)
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

fn json_or_empty_array(value: Option<&JsonValue>) -> JsonValue {
    match value {
        Some(JsonValue::Null) | None => JsonValue::Array(Vec::new()),
        Some(v) => v.clone(),
    }
}
