//! Date-range and duplicate filtering of enriched posts, plus ranking.
//!
//! Filtering runs after enrichment so dates found in the page HTML count.
//! When either bound of the range is set, undated posts are excluded; there
//! is no way to tell whether they fall inside the range.

use crate::{EnrichedPost, Error, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::cmp::Ordering;

/// Inclusive publication date range. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First day included, from 00:00:00.000.
    pub start: Option<NaiveDate>,
    /// Last day included, through 23:59:59.999.
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Create a range, rejecting `start` after `end`.
    ///
    /// # Errors
    ///
    /// Returns an error when both bounds are set and `start > end`.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(Error::Other(format!(
                    "start date {s} is after end date {e}"
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Whether neither bound is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Start of the first included day.
    #[must_use]
    pub fn start_bound(&self) -> Option<NaiveDateTime> {
        self.start.map(|d| d.and_time(NaiveTime::MIN))
    }

    /// Last millisecond of the last included day.
    #[must_use]
    pub fn end_bound(&self) -> Option<NaiveDateTime> {
        self.end
            .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
    }

    /// Whether a post with this publication date passes the range.
    #[must_use]
    pub fn contains(&self, published: Option<NaiveDate>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(date) = published else {
            return false;
        };

        let at = date.and_time(NaiveTime::MIN);
        self.start_bound().is_none_or(|start| at >= start)
            && self.end_bound().is_none_or(|end| at <= end)
    }
}

/// Publication date coverage of the enriched posts, before filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateStats {
    /// Posts with a known publication date.
    pub with_date: usize,
    /// Posts without one.
    pub without_date: usize,
    /// Earliest known date.
    pub oldest: Option<NaiveDate>,
    /// Latest known date.
    pub newest: Option<NaiveDate>,
    /// Posts removed by the date range.
    pub filtered_out: usize,
}

impl DateStats {
    /// Compute coverage over `posts`; `filtered_out` starts at zero.
    #[must_use]
    pub fn from_posts(posts: &[EnrichedPost]) -> Self {
        let dates = posts.iter().filter_map(|p| p.post.published_date);
        let mut stats = Self::default();
        for date in dates {
            stats.with_date += 1;
            stats.oldest = Some(stats.oldest.map_or(date, |d| d.min(date)));
            stats.newest = Some(stats.newest.map_or(date, |d| d.max(date)));
        }
        stats.without_date = posts.len() - stats.with_date;
        stats
    }
}

/// Apply the date range and duplicate rule, returning survivors (in input
/// order) and date statistics.
#[must_use]
pub fn filter_posts(
    posts: Vec<EnrichedPost>,
    range: &DateRange,
    include_duplicates: bool,
) -> (Vec<EnrichedPost>, DateStats) {
    let mut stats = DateStats::from_posts(&posts);

    let kept: Vec<EnrichedPost> = posts
        .into_iter()
        .filter(|post| {
            if range.contains(post.post.published_date) {
                true
            } else {
                stats.filtered_out += 1;
                false
            }
        })
        .filter(|post| include_duplicates || !post.is_duplicate)
        .collect();

    (kept, stats)
}

/// Sort newest first with undated posts last. The sort is stable, so ties
/// keep discovery order.
pub fn rank(posts: &mut [EnrichedPost]) {
    posts.sort_by(|a, b| match (a.post.published_date, b.post.published_date) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::DiscoveredUrl;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn post(url: &str, date: Option<NaiveDate>, dup: bool) -> EnrichedPost {
        EnrichedPost {
            post: DiscoveredUrl::new(url, url).with_published_date(date),
            detected_asset_type: None,
            is_duplicate: dup,
            existing_asset_id: dup.then(|| "asset".to_string()),
            language: None,
        }
    }

    fn urls(posts: &[EnrichedPost]) -> Vec<&str> {
        posts.iter().map(|p| p.post.url.as_str()).collect()
    }

    #[test]
    fn test_bounds() {
        let range = DateRange::new(Some(d(2024, 1, 1)), Some(d(2024, 1, 31))).unwrap();
        assert_eq!(range.start_bound().unwrap().to_string(), "2024-01-01 00:00:00");
        assert_eq!(range.end_bound().unwrap().to_string(), "2024-01-31 23:59:59.999");
    }

    #[test]
    fn test_inclusive_range() {
        let range = DateRange::new(Some(d(2024, 1, 1)), Some(d(2024, 1, 31))).unwrap();
        assert!(range.contains(Some(d(2024, 1, 1))));
        assert!(range.contains(Some(d(2024, 1, 31))));
        assert!(!range.contains(Some(d(2023, 12, 31))));
        assert!(!range.contains(Some(d(2024, 2, 1))));
    }

    #[test]
    fn test_null_dates_excluded_when_any_bound_set() {
        assert!(DateRange::default().contains(None));
        assert!(!DateRange::new(Some(d(2024, 1, 1)), None).unwrap().contains(None));
        assert!(!DateRange::new(None, Some(d(2024, 1, 1))).unwrap().contains(None));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(DateRange::new(Some(d(2024, 2, 1)), Some(d(2024, 1, 1))).is_err());
    }

    #[test]
    fn test_filter_posts() {
        let posts = vec![
            post("a", Some(d(2024, 3, 1)), false),
            post("b", None, false),
            post("c", Some(d(2023, 1, 1)), false),
            post("d", Some(d(2024, 4, 1)), true),
        ];
        let range = DateRange::new(Some(d(2024, 1, 1)), None).unwrap();

        let (kept, stats) = filter_posts(posts.clone(), &range, false);
        assert_eq!(urls(&kept), vec!["a"]);
        assert_eq!(
            stats,
            DateStats {
                with_date: 3,
                without_date: 1,
                oldest: Some(d(2023, 1, 1)),
                newest: Some(d(2024, 4, 1)),
                filtered_out: 2,
            }
        );

        let (kept, _) = filter_posts(posts, &range, true);
        assert_eq!(urls(&kept), vec!["a", "d"]);
    }

    #[test]
    fn test_unbounded_keeps_undated() {
        let posts = vec![post("a", None, false), post("b", None, true)];
        let (kept, stats) = filter_posts(posts, &DateRange::default(), false);
        assert_eq!(urls(&kept), vec!["a"]);
        assert_eq!(stats.filtered_out, 0);
        assert_eq!(stats.oldest, None);
    }

    #[test]
    fn test_rank_newest_first_undated_last_stable() {
        let mut posts = vec![
            post("undated-1", None, false),
            post("old", Some(d(2020, 1, 1)), false),
            post("new-1", Some(d(2024, 1, 1)), false),
            post("undated-2", None, false),
            post("new-2", Some(d(2024, 1, 1)), false),
        ];
        rank(&mut posts);
        assert_eq!(
            urls(&posts),
            vec!["new-1", "new-2", "old", "undated-1", "undated-2"]
        );
    }

    #[test]
    fn test_date_stats_serialize_camel_case() {
        let json = serde_json::to_value(DateStats::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "withDate": 0,
                "withoutDate": 0,
                "oldest": null,
                "newest": null,
                "filteredOut": 0
            })
        );
    }
}
