//! End-to-end preview pipeline.
//!
//! ```text
//! url ─▶ discover ─▶ [fallback] ─▶ duplicates ─▶ language ─▶ enrich ─▶ filter ─▶ rank
//! ```
//!
//! Stages run strictly in sequence. Only two errors reach the caller: an
//! unparseable input URL, and a failed fallback after the discovery cascade
//! came up empty.

use crate::config::Config;
use crate::discovery::normalize::normalize_url;
use crate::discovery::orchestrator::{BlogDiscoverer, DEFAULT_MAX_POSTS, DiscoveryOptions};
use crate::duplicates::DuplicateChecker;
use crate::enrich::Enricher;
use crate::fallback::{JinaReaderExtractor, LegacyExtractor, run_fallback};
use crate::filter::{DateRange, DateStats, filter_posts, rank};
use crate::language::{LanguageFilter, LanguageStats};
use crate::{DiscoveryMethod, EnrichedPost, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Account id used when the caller does not name one.
pub const DEFAULT_ACCOUNT: &str = "default";

/// Parameters of one preview run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    /// Blog URL as typed by the user.
    pub url: String,
    /// Account whose existing assets count as duplicates.
    pub account_id: String,
    /// Cap on discovered posts.
    pub max_posts: usize,
    /// Publication date range.
    pub date_range: DateRange,
    /// Keep posts that already exist as assets.
    pub include_duplicates: bool,
    /// Allowed language codes; `None` keeps every language.
    pub languages: Option<Vec<String>>,
}

impl PreviewRequest {
    /// A request with default options for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            account_id: DEFAULT_ACCOUNT.to_string(),
            max_posts: DEFAULT_MAX_POSTS,
            date_range: DateRange::default(),
            include_duplicates: false,
            languages: None,
        }
    }
}

/// Method and cost of the discovery that fed the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySummary {
    /// Strategy that produced the posts.
    pub method: Option<DiscoveryMethod>,
    /// Credits spent.
    pub credits_used: u32,
}

/// Human-facing cost summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditInfo {
    /// Credits spent.
    pub credits_used: u32,
    /// Whether the discovery method never costs credits.
    pub is_free: bool,
    /// One-line explanation for display.
    pub message: String,
}

impl CreditInfo {
    fn for_discovery(method: Option<DiscoveryMethod>, credits_used: u32) -> Self {
        let is_free = method.is_none_or(DiscoveryMethod::is_free);
        let message = match method {
            Some(method) if is_free => format!("Found via {method} at no cost"),
            Some(method) => {
                let plural = if credits_used == 1 { "" } else { "s" };
                format!("Found via {method} using {credits_used} credit{plural}")
            },
            None => "No posts found; no credits used".to_string(),
        };
        Self {
            credits_used,
            is_free,
            message,
        }
    }
}

/// Result of a preview run, serialized as camelCase JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    /// Always `true`; failures are errors instead.
    pub success: bool,
    /// Posts after filtering, ranked newest first.
    pub posts: Vec<EnrichedPost>,
    /// Number of returned posts.
    pub total: usize,
    /// Discovered posts that already exist as assets.
    pub duplicates: usize,
    /// Discovered posts that do not.
    pub new: usize,
    /// Language counts over every discovered post.
    pub detected_languages: LanguageStats,
    /// Date coverage of the enriched posts.
    pub date_stats: DateStats,
    /// Discovery method and cost.
    pub discovery: DiscoverySummary,
    /// Cost summary for display.
    pub credit_info: CreditInfo,
}

/// Composes discovery, duplicate checking, enrichment and filtering.
pub struct PreviewPipeline {
    discoverer: BlogDiscoverer,
    duplicates: Arc<dyn DuplicateChecker>,
    enricher: Enricher,
    fallback: Option<Box<dyn LegacyExtractor>>,
}

impl PreviewPipeline {
    /// Assemble a pipeline from its parts, without a fallback extractor.
    #[must_use]
    pub fn new(
        discoverer: BlogDiscoverer,
        duplicates: Arc<dyn DuplicateChecker>,
        enricher: Enricher,
    ) -> Self {
        Self {
            discoverer,
            duplicates,
            enricher,
            fallback: None,
        }
    }

    /// Use `extractor` when the discovery cascade finds nothing.
    #[must_use]
    pub fn with_fallback(mut self, extractor: Box<dyn LegacyExtractor>) -> Self {
        self.fallback = Some(extractor);
        self
    }

    /// Build the standard pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn from_config(config: &Config, duplicates: Arc<dyn DuplicateChecker>) -> Result<Self> {
        let pipeline = Self::new(
            BlogDiscoverer::from_config(config)?,
            duplicates,
            Enricher::from_config(&config.enrichment)?,
        );
        Ok(match JinaReaderExtractor::from_config(&config.fallback)? {
            Some(jina) => pipeline.with_fallback(Box::new(jina)),
            None => pipeline,
        })
    }

    /// Run a preview.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidUrl`] for malformed input,
    /// [`crate::Error::DiscoveryFailed`] when discovery and the fallback both
    /// come up empty, or any error from the duplicate checker.
    #[instrument(skip_all, fields(url = %request.url, account = %request.account_id))]
    pub async fn run(&self, request: &PreviewRequest) -> Result<PreviewResponse> {
        let site = normalize_url(&request.url)?;
        let options = DiscoveryOptions {
            max_posts: request.max_posts,
        };

        let mut discovery = self.discoverer.discover(site.as_str(), &options).await?;
        if discovery.fallback_required {
            discovery = run_fallback(self.fallback.as_deref(), &site, request.max_posts).await?;
        }

        let report = self
            .duplicates
            .check_for_duplicates(&discovery.urls, &request.account_id)
            .await?;

        let detected_languages: LanguageStats = report
            .all
            .iter()
            .map(|checked| crate::language::detect_language_str(&checked.post.url))
            .collect();

        let mut checked = report.all;
        if let Some(codes) = &request.languages {
            let mut language_filter = LanguageFilter::new(codes);
            if !language_filter.ignored_codes().is_empty() {
                tracing::warn!(codes = ?language_filter.ignored_codes(), "Ignoring unsupported language codes");
            }
            checked.retain(|c| language_filter.accepts(&c.post.url));
            let stats = language_filter.stats();
            tracing::debug!(
                rejected = stats.rejected,
                rejection_percentage = stats.rejection_percentage(),
                "Applied language filter"
            );
        }

        let enrichment = self.enricher.enrich(&site, checked).await;
        let (mut posts, date_stats) =
            filter_posts(enrichment.posts, &request.date_range, request.include_duplicates);
        rank(&mut posts);

        tracing::info!(
            method = ?discovery.discovery_method,
            discovered = discovery.urls.len(),
            returned = posts.len(),
            "Preview complete"
        );

        Ok(PreviewResponse {
            success: true,
            total: posts.len(),
            posts,
            duplicates: report.stats.duplicate,
            new: report.stats.new,
            detected_languages,
            date_stats,
            discovery: DiscoverySummary {
                method: discovery.discovery_method,
                credits_used: discovery.credits_used,
            },
            credit_info: CreditInfo::for_discovery(discovery.discovery_method, discovery.credits_used),
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use crate::discovery::orchestrator::DiscoveryStrategy;
    use crate::duplicates::{InMemoryAssetIndex, NoDuplicates};
    use crate::enrich::{HeuristicDetector, HtmlFetcher};
    use crate::{DiscoveredUrl, Error};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use url::Url;

    struct Canned(Vec<DiscoveredUrl>, DiscoveryMethod, u32);

    #[async_trait]
    impl DiscoveryStrategy for Canned {
        fn method(&self) -> DiscoveryMethod {
            self.1
        }

        fn credits_per_call(&self) -> u32 {
            self.2
        }

        async fn discover(&self, _site: &Url, _options: &DiscoveryOptions) -> Result<Vec<DiscoveredUrl>> {
            Ok(self.0.clone())
        }
    }

    struct NoHtml;

    #[async_trait]
    impl HtmlFetcher for NoHtml {
        async fn fetch_html(&self, _url: &str) -> Result<String> {
            Err(Error::Other("offline".into()))
        }
    }

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    fn discovered() -> Vec<DiscoveredUrl> {
        vec![
            DiscoveredUrl::new("https://x.com/blog/old", "Old").with_published_date(d(2023, 5, 1)),
            DiscoveredUrl::new("https://x.com/blog/undated", "Undated"),
            DiscoveredUrl::new("https://x.com/de/blog/neu", "Neu").with_published_date(d(2024, 6, 1)),
            DiscoveredUrl::new("https://x.com/blog/existing", "Existing").with_published_date(d(2024, 2, 1)),
        ]
    }

    fn pipeline(duplicates: Arc<dyn DuplicateChecker>, method: DiscoveryMethod, credits: u32) -> PreviewPipeline {
        PreviewPipeline::new(
            BlogDiscoverer::new(vec![Box::new(Canned(discovered(), method, credits))]),
            duplicates,
            Enricher::new(Arc::new(NoHtml), Arc::new(HeuristicDetector)),
        )
    }

    fn urls(response: &PreviewResponse) -> Vec<&str> {
        response.posts.iter().map(|p| p.post.url.as_str()).collect()
    }

    #[tokio::test]
    async fn test_preview_ranks_and_excludes_duplicates() {
        let mut index = InMemoryAssetIndex::new();
        index.insert(DEFAULT_ACCOUNT, "https://x.com/blog/existing", "asset-9");

        let response = pipeline(Arc::new(index), DiscoveryMethod::Sitemap, 0)
            .run(&PreviewRequest::new("https://x.com/blog"))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(
            urls(&response),
            vec![
                "https://x.com/de/blog/neu",
                "https://x.com/blog/old",
                "https://x.com/blog/undated"
            ]
        );
        assert_eq!(response.total, 3);
        assert_eq!(response.duplicates, 1);
        assert_eq!(response.new, 3);
        assert_eq!(response.detected_languages.count("de"), 1);
        assert_eq!(response.date_stats.with_date, 3);
        assert_eq!(response.date_stats.without_date, 1);
        assert_eq!(response.discovery.method, Some(DiscoveryMethod::Sitemap));
        assert!(response.credit_info.is_free);
        assert_eq!(response.credit_info.credits_used, 0);
    }

    #[tokio::test]
    async fn test_preview_date_range_and_include_duplicates() {
        let mut index = InMemoryAssetIndex::new();
        index.insert("acct", "https://x.com/blog/existing", "asset-9");

        let mut request = PreviewRequest::new("x.com/blog");
        request.account_id = "acct".to_string();
        request.include_duplicates = true;
        request.date_range = DateRange::new(d(2024, 1, 1), d(2024, 12, 31)).unwrap();

        let response = pipeline(Arc::new(index), DiscoveryMethod::Sitemap, 0)
            .run(&request)
            .await
            .unwrap();

        assert_eq!(
            urls(&response),
            vec!["https://x.com/de/blog/neu", "https://x.com/blog/existing"]
        );
        assert!(response.posts[1].is_duplicate);
        assert_eq!(response.posts[1].existing_asset_id.as_deref(), Some("asset-9"));
        assert_eq!(response.date_stats.filtered_out, 2);
    }

    #[tokio::test]
    async fn test_preview_language_filter_keeps_unknown() {
        let mut request = PreviewRequest::new("https://x.com/blog");
        request.languages = Some(vec!["en".to_string()]);

        let response = pipeline(Arc::new(NoDuplicates), DiscoveryMethod::Rss, 0)
            .run(&request)
            .await
            .unwrap();

        assert_eq!(response.total, 3);
        assert!(!urls(&response).contains(&"https://x.com/de/blog/neu"));
        assert_eq!(response.detected_languages.count("de"), 1);
    }

    #[tokio::test]
    async fn test_paid_discovery_credit_info() {
        let response = pipeline(Arc::new(NoDuplicates), DiscoveryMethod::FirecrawlMap, 1)
            .run(&PreviewRequest::new("https://x.com/blog"))
            .await
            .unwrap();

        assert!(!response.credit_info.is_free);
        assert_eq!(response.credit_info.credits_used, 1);
        assert_eq!(response.credit_info.message, "Found via firecrawl-map using 1 credit");
    }

    #[tokio::test]
    async fn test_empty_discovery_without_fallback_fails() {
        let pipeline = PreviewPipeline::new(
            BlogDiscoverer::new(Vec::new()),
            Arc::new(NoDuplicates),
            Enricher::new(Arc::new(NoHtml), Arc::new(HeuristicDetector)),
        );

        let err = pipeline
            .run(&PreviewRequest::new("https://x.com/blog"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DiscoveryFailed(_)));
    }

    #[tokio::test]
    async fn test_invalid_url_is_reported() {
        let err = pipeline(Arc::new(NoDuplicates), DiscoveryMethod::Sitemap, 0)
            .run(&PreviewRequest::new("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_response_json_shape() {
        let response = pipeline(Arc::new(NoDuplicates), DiscoveryMethod::Sitemap, 0)
            .run(&PreviewRequest::new("https://x.com/blog"))
            .await
            .unwrap();

        let json = serde_json::to_value(&response).unwrap();
        for key in [
            "success",
            "posts",
            "total",
            "duplicates",
            "new",
            "detectedLanguages",
            "dateStats",
            "discovery",
            "creditInfo",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["discovery"]["method"], "sitemap");
        assert_eq!(json["discovery"]["creditsUsed"], 0);
        assert_eq!(json["detectedLanguages"], serde_json::json!({ "de": 1 }));
        assert_eq!(json["posts"][0]["detectedAssetType"], "Blog Post");
    }
}
