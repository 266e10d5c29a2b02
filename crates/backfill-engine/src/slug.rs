//! Run-scoped slug allocation.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

/// Longest base slug; leaves room for a suffix inside the 300-char column.
pub const SLUG_MAX_LEN: usize = 280;

/// Slug used when a label has no usable characters.
pub const FALLBACK_SLUG: &str = "untitled";

const NUMERIC_SUFFIXES: [u32; 3] = [2, 3, 4];

/// Lowercase, hyphen-separated `[a-z0-9]` runs, at most [`SLUG_MAX_LEN`] chars.
pub fn slugify(label: &str) -> String {
    let mut slug = label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");

    // only ASCII survives the map above, so byte truncation is char-safe
    slug.truncate(SLUG_MAX_LEN);
    let slug = slug.trim_end_matches('-');

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Base,
    Suffix(usize),
    Timestamp { stamp: i64, bump: i64, limit: i64 },
}

/// Hands out slugs unique within one run.
///
/// Resolution order for a taken slug: the base, then `-2`, `-3`, `-4`, then
/// `-<unix millis>`. A taken timestamp candidate is bumped by one, at most
/// once per slug already allocated: that many bumps cover more candidates
/// than there are taken slugs, so one of them is free.
pub struct SlugAllocator {
    used: HashSet<String>,
    clock: Box<dyn Fn() -> i64 + Send>,
}

impl Default for SlugAllocator {
    fn default() -> Self {
        Self::with_clock(|| Utc::now().timestamp_millis())
    }
}

impl SlugAllocator {
    pub fn with_clock(clock: impl Fn() -> i64 + Send + 'static) -> Self {
        Self {
            used: HashSet::new(),
            clock: Box::new(clock),
        }
    }

    pub fn allocate(&mut self, label: &str) -> String {
        let base = slugify(label);
        self.resolve(&base)
    }

    fn resolve(&mut self, base: &str) -> String {
        let mut attempt = Some(Attempt::Base);
        while let Some(current) = attempt {
            let candidate = match current {
                Attempt::Base => base.to_string(),
                Attempt::Suffix(i) => format!("{base}-{}", NUMERIC_SUFFIXES[i]),
                Attempt::Timestamp { stamp, bump, .. } => format!("{base}-{}", stamp + bump),
            };
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            attempt = self.next_attempt(current);
        }

        // unreachable while the bump limit holds
        let candidate = format!("{base}-{}", Uuid::new_v4().simple());
        self.used.insert(candidate.clone());
        candidate
    }

    fn next_attempt(&self, attempt: Attempt) -> Option<Attempt> {
        match attempt {
            Attempt::Base => Some(Attempt::Suffix(0)),
            Attempt::Suffix(i) if i + 1 < NUMERIC_SUFFIXES.len() => Some(Attempt::Suffix(i + 1)),
            Attempt::Suffix(_) => Some(Attempt::Timestamp {
                stamp: (self.clock)(),
                bump: 0,
                limit: i64::try_from(self.used.len()).unwrap_or(i64::MAX),
            }),
            Attempt::Timestamp { stamp, bump, limit } if bump < limit => {
                Some(Attempt::Timestamp {
                    stamp,
                    bump: bump + 1,
                    limit,
                })
            }
            Attempt::Timestamp { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators_and_trims() {
        assert_eq!(slugify("  Goblet Squat -- Form Check! "), "goblet-squat-form-check");
        assert_eq!(slugify("Über Push-Ups 101"), "ber-push-ups-101");
        assert_eq!(slugify("!!!"), FALLBACK_SLUG);
        assert_eq!(slugify(""), FALLBACK_SLUG);
    }

    #[test]
    fn slugify_bounds_length_without_trailing_hyphen() {
        let label = format!("{} tail", "a".repeat(SLUG_MAX_LEN - 1));
        let slug = slugify(&label);
        assert_eq!(slug.len(), SLUG_MAX_LEN - 1);
        assert!(!slug.ends_with('-'));

        let long = "x".repeat(SLUG_MAX_LEN * 2);
        assert_eq!(slugify(&long).len(), SLUG_MAX_LEN);
    }

    #[test]
    fn collisions_walk_suffixes_then_timestamp() {
        let mut slugs = SlugAllocator::with_clock(|| 1_700_000_000_000);
        let allocated = (0..6).map(|_| slugs.allocate("Plank")).collect::<Vec<_>>();
        assert_eq!(
            allocated,
            vec![
                "plank",
                "plank-2",
                "plank-3",
                "plank-4",
                "plank-1700000000000",
                "plank-1700000000001",
            ]
        );
        assert_eq!(slugs.used.len(), 6);
    }

    #[test]
    fn timestamp_tier_skips_slugs_already_taken_by_other_labels() {
        let mut slugs = SlugAllocator::with_clock(|| 5);
        assert_eq!(slugs.allocate("row 5"), "row-5");
        for _ in 0..4 {
            slugs.allocate("row");
        }
        // "row-5" is taken, so the timestamp candidate is bumped
        assert_eq!(slugs.allocate("row"), "row-6");
    }

    #[test]
    fn timestamp_bumps_stop_at_the_allocated_count() {
        let mut slugs = SlugAllocator::with_clock(|| 10);
        for label in ["a", "b", "c"] {
            slugs.allocate(label);
        }

        let Some(Attempt::Timestamp { limit, .. }) = slugs.next_attempt(Attempt::Suffix(2)) else {
            panic!("expected timestamp tier after the last suffix");
        };
        assert_eq!(limit, 3);
        let last = Attempt::Timestamp {
            stamp: 10,
            bump: limit,
            limit,
        };
        assert_eq!(slugs.next_attempt(last), None);
    }

    #[test]
    fn every_allocation_is_unique() {
        let mut slugs = SlugAllocator::with_clock(|| 42);
        let labels = ["A", "a", "A!", "a-2", "a 2", "a", "a", "a", "a-42", "a"];
        let allocated = labels.iter().map(|l| slugs.allocate(l)).collect::<Vec<_>>();
        let unique = allocated.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), labels.len());
    }
}
