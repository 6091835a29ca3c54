//! Date extraction from sitemap/feed values and from URL paths.
//!
//! Structured dates (`lastmod`, `pubDate`, `published`, `updated`) always win
//! over a date guessed from the URL. Both resolve to a calendar date; the
//! time of day is discarded.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// `/2024/03/01/`
#[allow(clippy::unwrap_used)] // SAFETY: Pattern is a compile-time constant
static SLASHED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})(?:/|$)").unwrap());

/// `/2024-03-01/`
#[allow(clippy::unwrap_used)] // SAFETY: Pattern is a compile-time constant
static DASHED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})-(\d{2})-(\d{2})(?:/|$)").unwrap());

/// `/20240301/`
#[allow(clippy::unwrap_used)] // SAFETY: Pattern is a compile-time constant
static COMPACT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})(\d{2})(\d{2})(?:/|$)").unwrap());

/// Earliest year accepted from a URL; older matches are almost always IDs.
const MIN_URL_YEAR: i32 = 1990;

/// Extract a publication date embedded in a URL path.
///
/// Recognizes `/YYYY/MM/DD/`, `/YYYY-MM-DD/` and `/YYYYMMDD/`, in that order.
/// Impossible dates (month 13, February 30) are rejected.
///
/// # Examples
///
/// ```rust
/// use blogmap_core::discovery::dates::date_from_url;
/// use chrono::NaiveDate;
///
/// assert_eq!(
///     date_from_url("https://example.com/2024/03/01/hello-world/"),
///     NaiveDate::from_ymd_opt(2024, 3, 1)
/// );
/// assert_eq!(date_from_url("https://example.com/blog/hello-world"), None);
/// ```
#[must_use]
pub fn date_from_url(url: &str) -> Option<NaiveDate> {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());

    [&*SLASHED_DATE, &*DASHED_DATE, &*COMPACT_DATE]
        .into_iter()
        .find_map(|pattern| {
            pattern.captures_iter(&path).find_map(|caps| {
                let year: i32 = caps[1].parse().ok()?;
                let month: u32 = caps[2].parse().ok()?;
                let day: u32 = caps[3].parse().ok()?;
                if year < MIN_URL_YEAR {
                    return None;
                }
                NaiveDate::from_ymd_opt(year, month, day)
            })
        })
}

/// Parse a timestamp as found in sitemaps and feeds.
///
/// Supports:
/// - `2024-01-15` (date only)
/// - `2024-01-15T10:30:00Z` / `2024-01-15T10:30:00+02:00` (RFC 3339)
/// - `2024-01-15T10:30:00` and `2024-01-15T10:30:00.000` (naive, assumed UTC)
/// - `Mon, 15 Jan 2024 10:30:00 GMT` (RFC 2822, used by RSS `pubDate`)
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc());
        }
    }

    tracing::debug!(date_str = %s, "Could not parse timestamp");
    None
}

/// Parse a timestamp and keep only its calendar date.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    parse_timestamp(s).map(|dt| dt.date_naive())
}

/// Resolve a post date: the structured value if it parses, else the URL pattern.
#[must_use]
pub fn resolve_date(structured: Option<&str>, url: &str) -> Option<NaiveDate> {
    structured.and_then(parse_date).or_else(|| date_from_url(url))
}
