//! URL filtering for blog post discovery.
//!
//! Sitemaps and mapping APIs return every page of a site. These helpers keep
//! the pages that live under a blog-like section and drop section indexes and
//! listing pages.
//!
//! ## Quick Start
//!
//! ```rust
//! use blogmap_core::discovery::filter::{is_blog_path, is_post_candidate};
//! use url::Url;
//!
//! assert!(is_blog_path("/blog/my-post"));
//! assert!(!is_blog_path("/about"));
//!
//! let index = Url::parse("https://example.com/blog/").unwrap();
//! assert!(!is_post_candidate(&index));
//! ```

use crate::DiscoveredUrl;
use crate::discovery::normalize::{is_listing_segment, path_segments};
use std::collections::HashSet;
use url::Url;

/// Path segments that indicate blog-like content.
pub const BLOG_PATH_INDICATORS: &[&str] = &["/blog/", "/post/", "/article/", "/news/", "/resources/"];

/// Segments whose child segment is a listing page (`/tag/some-long-tag-name`).
const LISTING_PARENTS: &[&str] = &["category", "tag", "author", "archive", "search", "page"];

/// Check if a URL path sits inside a blog-like section.
///
/// Matching is case-insensitive. `/blog` alone (no trailing slash) is the
/// section root and does not match.
#[must_use]
pub fn is_blog_path(path: &str) -> bool {
    let path_lower = path.to_lowercase();
    BLOG_PATH_INDICATORS
        .iter()
        .any(|indicator| path_lower.contains(indicator))
}

/// Check if a URL is a plausible post inside a blog-like section.
///
/// Rejects the section root itself (`/blog/`), pagination and taxonomy pages
/// (`/blog/page/2`, `/blog/tag/rust`, `/blog/category`).
#[must_use]
pub fn is_post_candidate(url: &Url) -> bool {
    if !is_blog_path(url.path()) {
        return false;
    }

    let segments = path_segments(url);
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let last_lower = format!("/{}/", last.to_lowercase());
    if BLOG_PATH_INDICATORS.contains(&last_lower.as_str()) {
        return false;
    }

    let numeric = last.chars().all(|c| c.is_ascii_digit());
    !(follows_listing_segment(parents) || (is_listing_segment(last) && !numeric))
}

/// Whether the segment directly before the last one marks a listing
/// (`/tag/<name>`, `/page/<n>`).
fn follows_listing_segment(parents: &[&str]) -> bool {
    parents
        .last()
        .is_some_and(|parent| LISTING_PARENTS.contains(&parent.to_ascii_lowercase().as_str()))
}

/// Compare hosts ignoring case and a leading `www.`.
#[must_use]
pub fn same_site(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(a), Some(b)) => strip_www(a).eq_ignore_ascii_case(strip_www(b)),
        _ => false,
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Drop repeated URLs, keeping the first occurrence and the input order.
#[must_use]
pub fn dedup_by_url(urls: Vec<DiscoveredUrl>) -> Vec<DiscoveredUrl> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|entry| seen.insert(entry.url.clone()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;

    fn candidate(s: &str) -> bool {
        is_post_candidate(&Url::parse(s).unwrap())
    }

    #[test]
    fn test_blog_paths() {
        for path in [
            "/blog/my-post",
            "/en/blog/my-post",
            "/post/hello",
            "/article/2024/launch",
            "/news/q3-update",
            "/resources/guide-to-seo",
            "/BLOG/Upper-Case",
        ] {
            assert!(is_blog_path(path), "{path} should be a blog path");
        }

        for path in ["/about", "/pricing", "/blog", "/blogging-tips", "/newsletter/x"] {
            assert!(!is_blog_path(path), "{path} should not be a blog path");
        }
    }

    #[test]
    fn test_post_candidates() {
        assert!(candidate("https://example.com/blog/my-post"));
        assert!(candidate("https://example.com/news/12345"));
        assert!(candidate("https://example.com/blog/2024/03/01/launch/"));
    }

    #[test]
    fn test_section_roots_and_listings_rejected() {
        assert!(!candidate("https://example.com/blog/"));
        assert!(!candidate("https://example.com/en/news/"));
        assert!(!candidate("https://example.com/blog/page/2"));
        assert!(!candidate("https://example.com/blog/page-3"));
        assert!(!candidate("https://example.com/blog/tag/rust"));
        assert!(!candidate("https://example.com/blog/tag/engineering-best-practices"));
        assert!(!candidate("https://example.com/blog/category"));
        assert!(!candidate("https://example.com/about"));
    }

    #[test]
    fn test_same_site() {
        let a = Url::parse("https://www.Example.com/blog").unwrap();
        let b = Url::parse("http://example.com/blog/post").unwrap();
        let c = Url::parse("https://cdn.example.com/post.pdf").unwrap();
        assert!(same_site(&a, &b));
        assert!(!same_site(&a, &c));
    }

    #[test]
    fn test_dedup_keeps_first() {
        let urls = vec![
            DiscoveredUrl::new("https://x.com/blog/a", "First"),
            DiscoveredUrl::new("https://x.com/blog/b", "B"),
            DiscoveredUrl::new("https://x.com/blog/a", "Second"),
        ];
        let deduped = dedup_by_url(urls);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "First");
    }
}
