//! Core data structures shared across the discovery pipeline.
//!
//! Every record here is transient: created by a discoverer, optionally
//! upgraded by the enricher, consumed by the filter stage and then dropped.
//! The serde representation is camelCase so it can be handed straight to a
//! JSON consumer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A blog post URL produced by one of the discovery strategies.
///
/// ## Example
///
/// ```rust
/// use blogmap_core::DiscoveredUrl;
/// use chrono::NaiveDate;
///
/// let post = DiscoveredUrl::new("https://example.com/blog/my-post", "My Post")
///     .with_published_date(NaiveDate::from_ymd_opt(2024, 3, 1));
///
/// let json = serde_json::to_value(&post).unwrap();
/// assert_eq!(json["publishedDate"], "2024-03-01");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredUrl {
    /// Absolute, canonical URL of the post.
    pub url: String,
    /// Title from feed metadata, HTML, or derived from the slug.
    pub title: String,
    /// Publication date, serialized as `YYYY-MM-DD`.
    pub published_date: Option<NaiveDate>,
}

impl DiscoveredUrl {
    /// Create an undated entry.
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            published_date: None,
        }
    }

    /// Set the publication date using builder pattern.
    #[must_use]
    pub const fn with_published_date(mut self, date: Option<NaiveDate>) -> Self {
        self.published_date = date;
        self
    }
}

/// Which strategy produced a [`DiscoveryResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryMethod {
    /// Parsed from a sitemap or sitemap index.
    Sitemap,
    /// Parsed from an RSS or Atom feed.
    Rss,
    /// Returned by the paid Firecrawl map API.
    FirecrawlMap,
    /// Returned by a paid full crawl.
    FirecrawlCrawl,
    /// Extracted from a reader rendering of the listing page.
    JinaFallback,
    /// The input URL was itself a post.
    SinglePost,
}

impl DiscoveryMethod {
    /// Whether this method never spends API credits.
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(
            self,
            Self::Sitemap | Self::Rss | Self::SinglePost | Self::JinaFallback
        )
    }

    /// Wire name, as used in JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sitemap => "sitemap",
            Self::Rss => "rss",
            Self::FirecrawlMap => "firecrawl-map",
            Self::FirecrawlCrawl => "firecrawl-crawl",
            Self::JinaFallback => "jina-fallback",
            Self::SinglePost => "single-post",
        }
    }
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the discovery orchestrator.
///
/// `fallback_required` is only ever set together with an empty `urls` list,
/// no method, and zero credits. Use the constructors to keep those invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    /// Discovered post URLs, in discovery order.
    pub urls: Vec<DiscoveredUrl>,
    /// Strategy that produced `urls`; `None` when a fallback is required.
    pub discovery_method: Option<DiscoveryMethod>,
    /// API credits spent (0 for free methods).
    pub credits_used: u32,
    /// Every cheap strategy failed; the caller must decide on a costlier one.
    #[serde(default)]
    pub fallback_required: bool,
}

impl DiscoveryResult {
    /// A successful result produced by `method`.
    #[must_use]
    pub fn found(urls: Vec<DiscoveredUrl>, method: DiscoveryMethod, credits_used: u32) -> Self {
        let credits_used = if method.is_free() { 0 } else { credits_used.max(1) };
        Self {
            urls,
            discovery_method: Some(method),
            credits_used,
            fallback_required: false,
        }
    }

    /// The terminal "nothing found" state.
    #[must_use]
    pub const fn fallback_required() -> Self {
        Self {
            urls: Vec::new(),
            discovery_method: None,
            credits_used: 0,
            fallback_required: true,
        }
    }
}

/// A discovered URL annotated by the duplicate checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedUrl {
    /// The discovered post.
    #[serde(flatten)]
    pub post: DiscoveredUrl,
    /// Whether an asset for this URL already exists in the account.
    pub is_duplicate: bool,
    /// Identifier of the existing asset, when duplicated.
    pub existing_asset_id: Option<String>,
}

/// New/duplicate counts reported by the duplicate checker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateStats {
    /// URLs with no existing asset.
    pub new: usize,
    /// URLs that match an existing asset.
    pub duplicate: usize,
}

/// Full response of a duplicate check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Every input URL, in input order.
    pub all: Vec<CheckedUrl>,
    /// Aggregate counts over `all`.
    pub stats: DuplicateStats,
}

impl DuplicateReport {
    /// Build a report from annotated URLs, computing the stats.
    #[must_use]
    pub fn from_checked(all: Vec<CheckedUrl>) -> Self {
        let duplicate = all.iter().filter(|c| c.is_duplicate).count();
        let stats = DuplicateStats {
            new: all.len() - duplicate,
            duplicate,
        };
        Self { all, stats }
    }
}

/// A post after language detection and enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPost {
    /// The discovered post, possibly with an upgraded title or date.
    #[serde(flatten)]
    pub post: DiscoveredUrl,
    /// Asset type label, when one could be determined.
    pub detected_asset_type: Option<String>,
    /// Whether an asset for this URL already exists.
    pub is_duplicate: bool,
    /// Identifier of the existing asset, when duplicated.
    pub existing_asset_id: Option<String>,
    /// ISO 639-1 code from the URL, `None` when unknown.
    pub language: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_wire_names() {
        let json = serde_json::to_value(DiscoveryMethod::FirecrawlMap).unwrap();
        assert_eq!(json, "firecrawl-map");
        let parsed: DiscoveryMethod = serde_json::from_value(json!("single-post")).unwrap();
        assert_eq!(parsed, DiscoveryMethod::SinglePost);
        assert_eq!(DiscoveryMethod::JinaFallback.to_string(), "jina-fallback");
    }

    #[test]
    fn test_free_methods_never_report_credits() {
        let result = DiscoveryResult::found(Vec::new(), DiscoveryMethod::Sitemap, 7);
        assert_eq!(result.credits_used, 0);

        let result = DiscoveryResult::found(Vec::new(), DiscoveryMethod::FirecrawlMap, 0);
        assert_eq!(result.credits_used, 1);
    }

    #[test]
    fn test_fallback_required_shape() {
        let result = DiscoveryResult::fallback_required();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            json!({
                "urls": [],
                "discoveryMethod": null,
                "creditsUsed": 0,
                "fallbackRequired": true
            })
        );
    }

    #[test]
    fn test_enriched_post_flattens_discovered_fields() {
        let post = EnrichedPost {
            post: DiscoveredUrl::new("https://example.com/blog/a", "A"),
            detected_asset_type: Some("Blog Post".into()),
            is_duplicate: false,
            existing_asset_id: None,
            language: Some("de".into()),
        };

        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["url"], "https://example.com/blog/a");
        assert_eq!(json["publishedDate"], serde_json::Value::Null);
        assert_eq!(json["detectedAssetType"], "Blog Post");
        assert_eq!(json["language"], "de");
    }

    #[test]
    fn test_duplicate_report_stats() {
        let checked = |url: &str, dup: bool| CheckedUrl {
            post: DiscoveredUrl::new(url, url),
            is_duplicate: dup,
            existing_asset_id: dup.then(|| "asset-1".to_string()),
        };
        let report = DuplicateReport::from_checked(vec![
            checked("a", true),
            checked("b", false),
            checked("c", false),
        ]);
        assert_eq!(report.stats, DuplicateStats { new: 2, duplicate: 1 });
    }
}
