//! Input URL normalization and single-post classification.
//!
//! ## Quick Start
//!
//! ```rust
//! use blogmap_core::discovery::normalize::{is_single_post_url, normalize_url, title_from_slug};
//!
//! let url = normalize_url("example.com/blog")?;
//! assert_eq!(url.as_str(), "https://example.com/blog");
//! assert!(!is_single_post_url(&url));
//!
//! let post = normalize_url("https://example.com/blog/how-we-ship-weekly-releases")?;
//! assert!(is_single_post_url(&post));
//!
//! assert_eq!(title_from_slug("how-we_ship"), "How We Ship");
//! # Ok::<(), blogmap_core::Error>(())
//! ```

use crate::discovery::dates::date_from_url;
use crate::{DiscoveredUrl, DiscoveryMethod, DiscoveryResult, Error, Result};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Last segments that always denote a listing page.
const LISTING_SEGMENTS: &[&str] = &["category", "tag", "author", "archive", "search"];

/// File extensions stripped before slug analysis.
const PAGE_EXTENSIONS: &[&str] = &[".html", ".htm", ".php", ".aspx"];

/// Minimum slug length (exclusive) for a post slug.
const MIN_SLUG_LEN: usize = 15;

/// Minimum number of hyphens in a post slug.
const MIN_SLUG_HYPHENS: usize = 2;

#[allow(clippy::unwrap_used)] // SAFETY: Pattern is a compile-time constant
static PAGINATION_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^page-\d+$").unwrap());

/// Normalize user input into an absolute http(s) URL.
///
/// Input that does not parse as a web URL is retried with `https://`
/// prepended. The fragment is dropped.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] when the input is empty or still does not
/// parse into a URL with a host after the retry.
pub fn normalize_url(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl(
            "no URL given; provide a blog address such as https://example.com/blog".into(),
        ));
    }

    let mut url = match Url::parse(trimmed) {
        Ok(url) if is_web_url(&url) => url,
        _ => Url::parse(&format!("https://{trimmed}")).map_err(|e| {
            Error::InvalidUrl(format!(
                "'{trimmed}' is not a valid URL ({e}); expected something like https://example.com/blog"
            ))
        })?,
    };

    if !is_web_url(&url) {
        return Err(Error::InvalidUrl(format!(
            "'{trimmed}' must be an http or https URL with a host name"
        )));
    }

    url.set_fragment(None);
    Ok(url)
}

fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}

/// Whether a URL points at a single article rather than a listing page.
///
/// Only the last non-empty path segment decides: listing patterns (`page-2`,
/// purely numeric, `category`, `tag`, `author`, `archive`, `search`) are
/// never posts. Otherwise the segment must be longer than 15 characters and
/// contain at least two hyphens, so `/author/jane-doe-the-writer` counts.
#[must_use]
pub fn is_single_post_url(url: &Url) -> bool {
    let segments = path_segments(url);
    let Some(last) = segments.last() else {
        return false;
    };

    if is_listing_segment(last) {
        return false;
    }

    is_post_slug(strip_extension(last))
}

/// Whether a path segment is a listing-page marker.
#[must_use]
pub fn is_listing_segment(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    LISTING_SEGMENTS.contains(&lower.as_str())
        || PAGINATION_SEGMENT.is_match(&lower)
        || (!lower.is_empty() && lower.chars().all(|c| c.is_ascii_digit()))
}

/// Whether a slug looks like a post slug (long and multi-hyphenated).
#[must_use]
pub fn is_post_slug(slug: &str) -> bool {
    slug.len() > MIN_SLUG_LEN && slug.matches('-').count() >= MIN_SLUG_HYPHENS
}

/// Turn a slug into a display title: separators become spaces and each word
/// is capitalized.
#[must_use]
pub fn title_from_slug(slug: &str) -> String {
    slug.replace(['-', '_'], " ")
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive a title from the last path segment of a URL, falling back to the host.
#[must_use]
pub fn title_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return title_from_slug(url);
    };

    path_segments(&parsed)
        .last()
        .map(|segment| title_from_slug(strip_extension(segment)))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| parsed.host_str().unwrap_or_default().to_string())
}

/// The result returned when the input URL is itself a post.
#[must_use]
pub fn single_post_result(url: &Url) -> DiscoveryResult {
    let href = url.as_str();
    let post = DiscoveredUrl::new(href, title_from_url(href)).with_published_date(date_from_url(href));
    DiscoveryResult::found(vec![post], DiscoveryMethod::SinglePost, 0)
}

pub(crate) fn path_segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn strip_extension(segment: &str) -> &str {
    let lower = segment.to_ascii_lowercase();
    PAGE_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map_or(segment, |ext| &segment[..segment.len() - ext.len()])
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_normalize_prepends_https() {
        assert_eq!(
            normalize_url("example.com/blog").unwrap().as_str(),
            "https://example.com/blog"
        );
        assert_eq!(
            normalize_url("  localhost:3000/blog ").unwrap().as_str(),
            "https://localhost:3000/blog"
        );
    }

    #[test]
    fn test_normalize_keeps_valid_urls() {
        assert_eq!(
            normalize_url("http://example.com/blog?page=1#top").unwrap().as_str(),
            "http://example.com/blog?page=1"
        );
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        for input in ["", "   ", "exa mple.com/blog", "ht tp://exa mple"] {
            let err = normalize_url(input).unwrap_err();
            assert!(matches!(err, Error::InvalidUrl(_)), "accepted {input:?}");
        }
    }

    #[test]
    fn test_invalid_url_message_is_actionable() {
        let err = normalize_url("ht tp://exa mple").unwrap_err();
        assert!(err.to_string().contains("https://example.com/blog"));
    }

    #[test]
    fn test_single_post_detection() {
        assert!(is_single_post_url(&url(
            "https://example.com/blog/how-we-ship-weekly-releases"
        )));
        assert!(is_single_post_url(&url(
            "https://example.com/2024/01/02/a-long-descriptive-slug/"
        )));
        assert!(is_single_post_url(&url(
            "https://example.com/posts/why-rust-matters-now.html"
        )));
    }

    #[test]
    fn test_listing_pages_are_not_posts() {
        for listing in [
            "https://example.com/blog",
            "https://example.com/blog/",
            "https://example.com/blog/page-2",
            "https://example.com/blog/2",
            "https://example.com/blog/category",
            "https://example.com/",
        ] {
            assert!(!is_single_post_url(&url(listing)), "{listing} classified as post");
        }
    }

    #[test]
    fn test_only_last_segment_decides() {
        for post in [
            "https://example.com/author/jane-doe-the-writer",
            "https://example.com/blog/tag/engineering-best-practices",
            "https://example.com/category/product-launch-announcement",
        ] {
            assert!(is_single_post_url(&url(post)), "{post} classified as listing");
        }
    }

    #[test]
    fn test_short_or_sparse_slugs_are_not_posts() {
        assert!(!is_single_post_url(&url("https://example.com/blog/my-post")));
        assert!(!is_single_post_url(&url("https://example.com/blog/announcements")));
        assert!(!is_single_post_url(&url("https://example.com/blog/a-b-c")));
    }

    #[test]
    fn test_titles() {
        assert_eq!(title_from_slug("my-post"), "My Post");
        assert_eq!(title_from_slug("snake_case__slug"), "Snake Case Slug");
        assert_eq!(title_from_url("https://example.com/blog/my-post/"), "My Post");
        assert_eq!(title_from_url("https://example.com/blog/release-notes.html"), "Release Notes");
        assert_eq!(title_from_url("https://example.com/"), "example.com");
    }

    #[test]
    fn test_single_post_result_shape() {
        let result =
            single_post_result(&url("https://example.com/2024/03/01/a-long-descriptive-slug"));
        assert_eq!(result.discovery_method, Some(DiscoveryMethod::SinglePost));
        assert_eq!(result.credits_used, 0);
        assert!(!result.fallback_required);
        assert_eq!(result.urls.len(), 1);
        assert_eq!(result.urls[0].title, "A Long Descriptive Slug");
        assert_eq!(
            result.urls[0].published_date,
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    proptest! {
        #[test]
        fn prop_normalized_urls_are_web_urls(host in "[a-z]{1,12}\\.(com|io|dev)", path in "(/[a-z0-9-]{1,10}){0,3}") {
            let normalized = normalize_url(&format!("{host}{path}")).unwrap();
            prop_assert_eq!(normalized.scheme(), "https");
            prop_assert_eq!(normalized.host_str(), Some(host.as_str()));
        }

        #[test]
        fn prop_numeric_last_segments_never_posts(n in 0u32..100_000) {
            let listing = url(&format!("https://example.com/blog/{n}"));
            prop_assert!(!is_single_post_url(&listing));
        }
    }
}
