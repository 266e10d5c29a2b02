//! Core domain model for the video catalog backfill.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub const CRATE_NAME: &str = "backfill-core";

/// Legacy table the backfill reads from.
pub const SOURCE_TABLE: &str = "exercise_videos";

/// Normalized table the backfill writes into.
pub const CATALOG_TABLE: &str = "video_catalog";

/// Discriminant of a legacy row, taken from `exercise_videos.video_type`.
///
/// Unknown values are carried as data in `Other` rather than rejected so the
/// run can count and report them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VideoKind {
    YouTube,
    Upload,
    Other(String),
}

impl VideoKind {
    pub fn from_video_type(video_type: &str) -> Self {
        match video_type {
            "youtube" => Self::YouTube,
            "upload" => Self::Upload,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::YouTube => "youtube",
            Self::Upload => "upload",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

/// One non-deleted row of `exercise_videos`, exactly as read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExerciseVideoRow {
    pub id: String,
    pub exercise_id: Option<Uuid>,
    pub video_type: String,
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_seconds: Option<i32>,
    pub thumbnail_url: Option<String>,
    pub uploader_id: Option<i32>,
    pub approved: Option<bool>,
    pub is_public: Option<bool>,
    pub views: Option<i64>,
    pub tags: Option<JsonValue>,
    pub chapters: Option<JsonValue>,
    /// Soft-delete marker (`"deletedAt"`); set rows are never extracted.
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ExerciseVideoRow {
    pub fn kind(&self) -> VideoKind {
        VideoKind::from_video_type(&self.video_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    Upload,
    #[serde(rename = "youtube")]
    YouTube,
}

impl CatalogSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::YouTube => "youtube",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    MembersOnly,
    Unlisted,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::MembersOnly => "members_only",
            Self::Unlisted => "unlisted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    Free,
    Member,
    Premium,
}

impl AccessTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Member => "member",
            Self::Premium => "premium",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Draft,
    Published,
    Archived,
}

impl PublishStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

/// A `video_catalog` row ready to insert. Built once per surviving legacy row
/// and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub source: CatalogSource,
    pub visibility: Visibility,
    pub access_tier: AccessTier,
    pub status: PublishStatus,
    pub youtube_video_id: Option<String>,
    pub hosted_key: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub view_count: i64,
    pub like_count: i64,
    pub tags: JsonValue,
    pub chapters: JsonValue,
    pub exercise_id: Option<Uuid>,
    pub creator_id: i32,
    pub metadata_completed: bool,
    /// Set for rows whose original media did not survive the legacy import.
    pub legacy_import: bool,
    pub featured: bool,
    pub sort_order: i32,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
