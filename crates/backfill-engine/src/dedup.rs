//! YouTube row dedup keyed on the video id embedded in `video_id`.
//!
//! `video_id` arrives in several legacy shapes (bare id, watch URL, short URL,
//! embed URL). Each shape has its own matcher; matchers are tried in order and
//! the first hit wins. A field no matcher recognises is used whole, and an
//! absent or blank field yields no key.

use std::collections::BTreeMap;

use backfill_core::ExerciseVideoRow;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

/// One legacy `video_id` shape.
#[derive(Debug, Clone, Copy)]
pub struct KeyMatcher {
    pub name: &'static str,
    pub extract: fn(&str) -> Option<String>,
}

static WATCH_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtube\.com/watch\?.*v=([a-zA-Z0-9_-]{11})").expect("valid regex"));
static SHORT_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtu\.be/([a-zA-Z0-9_-]{11})").expect("valid regex"));
static EMBED_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtube\.com/embed/([a-zA-Z0-9_-]{11})").expect("valid regex"));
static LEGACY_V_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtube\.com/v/([a-zA-Z0-9_-]{11})").expect("valid regex"));
static BARE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("valid regex"));

fn first_capture(pattern: &Regex, input: &str) -> Option<String> {
    pattern
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn match_watch_url(input: &str) -> Option<String> {
    first_capture(&WATCH_URL, input)
}

fn match_short_url(input: &str) -> Option<String> {
    first_capture(&SHORT_URL, input)
}

fn match_embed_url(input: &str) -> Option<String> {
    first_capture(&EMBED_URL, input)
}

fn match_legacy_v_url(input: &str) -> Option<String> {
    first_capture(&LEGACY_V_URL, input)
}

fn match_bare_id(input: &str) -> Option<String> {
    BARE_ID.is_match(input).then(|| input.to_string())
}

pub const YOUTUBE_MATCHERS: &[KeyMatcher] = &[
    KeyMatcher {
        name: "watch_url",
        extract: match_watch_url,
    },
    KeyMatcher {
        name: "short_url",
        extract: match_short_url,
    },
    KeyMatcher {
        name: "embed_url",
        extract: match_embed_url,
    },
    KeyMatcher {
        name: "legacy_v_url",
        extract: match_legacy_v_url,
    },
    KeyMatcher {
        name: "bare_id",
        extract: match_bare_id,
    },
];

pub fn extract_key_with(matchers: &[KeyMatcher], field: Option<&str>) -> Option<String> {
    let trimmed = field?.trim();
    if trimmed.is_empty() {
        return None;
    }
    matchers
        .iter()
        .find_map(|matcher| (matcher.extract)(trimmed))
        .or_else(|| Some(trimmed.to_string()))
}

pub fn extract_youtube_video_id(video_id: Option<&str>) -> Option<String> {
    extract_key_with(YOUTUBE_MATCHERS, video_id)
}

/// Rows sharing one YouTube video id. `canonical` has the lowest `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub youtube_video_id: String,
    pub canonical: ExerciseVideoRow,
    pub shadows: Vec<ExerciseVideoRow>,
}

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Survivors, keyed or not, ordered by `id`.
    pub canonical: Vec<ExerciseVideoRow>,
    /// Only groups with at least one shadow.
    pub groups: Vec<DuplicateGroup>,
    pub unique_keys: usize,
    pub unkeyed: usize,
}

impl DedupOutcome {
    pub fn duplicate_group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn shadow_count(&self) -> usize {
        self.groups.iter().map(|g| g.shadows.len()).sum()
    }
}

/// Collapses YouTube rows to one canonical row per video id.
///
/// Members of a group are ordered by `id` so the result does not depend on
/// input order. Rows without a key are never grouped together; they pass
/// through individually and fail later in the transformer.
pub fn deduplicate(rows: Vec<ExerciseVideoRow>) -> DedupOutcome {
    let mut by_key: BTreeMap<String, Vec<ExerciseVideoRow>> = BTreeMap::new();
    let mut unkeyed = Vec::new();

    for row in rows {
        match extract_youtube_video_id(row.video_id.as_deref()) {
            Some(key) => by_key.entry(key).or_default().push(row),
            None => unkeyed.push(row),
        }
    }

    let mut outcome = DedupOutcome {
        unique_keys: by_key.len(),
        unkeyed: unkeyed.len(),
        ..Default::default()
    };

    for (key, mut members) in by_key {
        members.sort_by(|a, b| a.id.cmp(&b.id));
        let mut members = members.into_iter();
        let Some(canonical) = members.next() else {
            continue;
        };
        let shadows = members.collect::<Vec<_>>();
        outcome.canonical.push(canonical.clone());
        if !shadows.is_empty() {
            outcome.groups.push(DuplicateGroup {
                youtube_video_id: key,
                canonical,
                shadows,
            });
        }
    }

    outcome.canonical.extend(unkeyed);
    outcome.canonical.sort_by(|a, b| a.id.cmp(&b.id));

    info!(
        unique_video_ids = outcome.unique_keys,
        duplicate_groups = outcome.duplicate_group_count(),
        duplicate_rows = outcome.shadow_count(),
        unkeyed = outcome.unkeyed,
        "youtube dedup analysis"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yt(id: &str, video_id: Option<&str>) -> ExerciseVideoRow {
        ExerciseVideoRow {
            id: id.to_string(),
            video_type: "youtube".to_string(),
            video_id: video_id.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn matchers_cover_legacy_shapes() {
        let cases = [
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=3", "dQw4w9WgXcQ"),
            ("https://youtu.be/dQw4w9WgXcQ?si=abc", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/embed/dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("http://www.youtube.com/v/dQw4w9WgXcQ?version=3", "dQw4w9WgXcQ"),
            ("  dQw4w9WgXcQ  ", "dQw4w9WgXcQ"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                extract_youtube_video_id(Some(input)).as_deref(),
                Some(expected),
                "input {input}"
            );
        }
    }

    #[test]
    fn unrecognised_field_is_used_whole_and_blank_yields_no_key() {
        assert_eq!(
            extract_youtube_video_id(Some(" legacy-ref-42 ")).as_deref(),
            Some("legacy-ref-42")
        );
        assert_eq!(extract_youtube_video_id(Some("   ")), None);
        assert_eq!(extract_youtube_video_id(None), None);
    }

    #[test]
    fn matchers_are_tried_in_order() {
        fn always(_: &str) -> Option<String> {
            Some("first".to_string())
        }
        let matchers = [
            KeyMatcher {
                name: "always",
                extract: always,
            },
            YOUTUBE_MATCHERS[0],
        ];
        assert_eq!(
            extract_key_with(&matchers, Some("https://youtube.com/watch?v=dQw4w9WgXcQ")).as_deref(),
            Some("first")
        );
    }

    #[test]
    fn three_rows_sharing_a_key_keep_lowest_id() {
        let outcome = deduplicate(vec![
            yt("c", Some("ABC12345678")),
            yt("a", Some("https://youtu.be/ABC12345678")),
            yt("b", Some("https://www.youtube.com/watch?v=ABC12345678")),
        ]);

        assert_eq!(outcome.canonical.len(), 1);
        assert_eq!(outcome.canonical[0].id, "a");
        assert_eq!(outcome.groups.len(), 1);
        let group = &outcome.groups[0];
        assert_eq!(group.youtube_video_id, "ABC12345678");
        assert_eq!(group.canonical.id, "a");
        let shadows = group.shadows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(shadows, vec!["b", "c"]);
        assert_eq!(outcome.shadow_count(), 2);
    }

    #[test]
    fn canonical_choice_is_independent_of_input_order() {
        let rows = vec![
            yt("0003", Some("AAAAAAAAAAA")),
            yt("0001", Some("AAAAAAAAAAA")),
            yt("0002", Some("BBBBBBBBBBB")),
            yt("0004", Some("BBBBBBBBBBB")),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();

        let forward = deduplicate(rows);
        let backward = deduplicate(reversed);
        assert_eq!(forward.canonical, backward.canonical);
        assert_eq!(forward.groups, backward.groups);
        let ids = forward.canonical.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["0001", "0002"]);
    }

    #[test]
    fn unkeyed_rows_are_not_collapsed_together() {
        let outcome = deduplicate(vec![yt("x", None), yt("y", Some("")), yt("z", Some("ZZZZZZZZZZZ"))]);
        assert_eq!(outcome.canonical.len(), 3);
        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.unkeyed, 2);
        assert_eq!(outcome.canonical[0].id, "x");
    }

    #[test]
    fn canonical_rows_come_out_in_id_order_not_key_order() {
        let outcome = deduplicate(vec![
            yt("3", Some("AAAAAAAAAAA")),
            yt("1", Some("ZZZZZZZZZZZ")),
            yt("2", None),
            yt("4", Some("ZZZZZZZZZZZ")),
        ]);

        let ids = outcome.canonical.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(outcome.groups[0].youtube_video_id, "ZZZZZZZZZZZ");
    }
}
