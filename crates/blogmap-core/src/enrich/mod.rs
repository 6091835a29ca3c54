//! Bounded-concurrency post enrichment.
//!
//! Every surviving post gets a language and a URL-based asset type. Unless
//! disabled, the post's HTML is then fetched to fill in the title, the
//! publication date and a better asset type.
//!
//! ## Concurrency
//!
//! Posts are processed in fixed-size batches. Fetches within a batch run
//! concurrently and the next batch starts only after the whole batch
//! resolves, so at most `batch_size` fetches are ever in flight. Each fetch
//! races a deadline; a timed-out fetch is dropped and its result discarded.
//! A [`CircuitBreaker`] stops fetching for the rest of the run when the
//! first `threshold` attempts all fail.

pub mod breaker;
pub mod detect;
pub mod html;

pub use breaker::CircuitBreaker;
pub use detect::{AssetTypeDetector, HeuristicDetector, is_pdf};
pub use html::{HtmlMetadata, extract_metadata};

use crate::config::EnrichmentConfig;
use crate::discovery::filter::same_site;
use crate::language::detect_language_str;
use crate::{CheckedUrl, EnrichedPost, Error, Result, http};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// Fetches the HTML of a post.
#[async_trait]
pub trait HtmlFetcher: Send + Sync {
    /// Return the response body of `url`.
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

/// [`HtmlFetcher`] over reqwest.
pub struct HttpHtmlFetcher {
    client: Client,
}

impl HttpHtmlFetcher {
    /// Create a fetcher whose client enforces `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
        })
    }
}

#[async_trait]
impl HtmlFetcher for HttpHtmlFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch_html(&self, url: &str) -> Result<String> {
        http::get_text(&self.client, url).await
    }
}

/// Counters from one enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    /// HTML fetches launched.
    pub attempted: usize,
    /// HTML fetches that returned a page in time.
    pub succeeded: usize,
    /// Whether the circuit breaker stopped fetching.
    pub breaker_tripped: bool,
}

/// Output of [`Enricher::enrich`].
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    /// Enriched posts, in input order.
    pub posts: Vec<EnrichedPost>,
    /// Fetch counters.
    pub stats: EnrichStats,
}

/// Enriches checked posts with language, asset type and page metadata.
pub struct Enricher {
    fetcher: Arc<dyn HtmlFetcher>,
    detector: Arc<dyn AssetTypeDetector>,
    enabled: bool,
    batch_size: usize,
    fetch_timeout: Duration,
    breaker_threshold: usize,
    default_asset_type: Option<String>,
}

impl Enricher {
    /// Create an enricher with default settings around the given seams.
    #[must_use]
    pub fn new(fetcher: Arc<dyn HtmlFetcher>, detector: Arc<dyn AssetTypeDetector>) -> Self {
        Self::with_settings(fetcher, detector, &EnrichmentConfig::default())
    }

    /// Create an enricher with explicit settings.
    #[must_use]
    pub fn with_settings(
        fetcher: Arc<dyn HtmlFetcher>,
        detector: Arc<dyn AssetTypeDetector>,
        config: &EnrichmentConfig,
    ) -> Self {
        Self {
            fetcher,
            detector,
            enabled: config.enabled,
            batch_size: config.batch_size.max(1),
            fetch_timeout: config.fetch_timeout(),
            breaker_threshold: config.breaker_threshold,
            default_asset_type: config.default_asset_type().map(str::to_string),
        }
    }

    /// Build the standard enricher (reqwest fetcher, heuristic detector).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self> {
        let fetcher = HttpHtmlFetcher::new(config.fetch_timeout())?;
        Ok(Self::with_settings(
            Arc::new(fetcher),
            Arc::new(HeuristicDetector),
            config,
        ))
    }

    /// Turn HTML fetching on or off.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Override the per-fetch deadline.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Enrich `posts` discovered for `site`.
    ///
    /// Never fails: fetch errors and timeouts leave the post with its
    /// URL-derived data.
    #[instrument(skip_all, fields(site = %site, count = posts.len()))]
    pub async fn enrich(&self, site: &Url, posts: Vec<CheckedUrl>) -> Enrichment {
        let mut breaker = CircuitBreaker::new(self.breaker_threshold);
        let mut enriched = Vec::with_capacity(posts.len());

        for batch in posts.chunks(self.batch_size) {
            let planned: Vec<(EnrichedPost, bool)> = batch
                .iter()
                .map(|checked| {
                    let post = self.annotate(checked.clone());
                    let fetch = self.enabled && !is_pdf(&post.post.url) && breaker.try_acquire();
                    (post, fetch)
                })
                .collect();

            let results = join_all(
                planned
                    .into_iter()
                    .map(|(post, fetch)| self.enrich_one(post, fetch)),
            )
            .await;

            for (post, fetched) in results {
                if fetched {
                    breaker.record_success();
                }
                enriched.push(self.apply_default_type(site, post));
            }
        }

        let stats = EnrichStats {
            attempted: breaker.attempted(),
            succeeded: breaker.succeeded(),
            breaker_tripped: breaker.is_open(),
        };
        tracing::debug!(
            attempted = stats.attempted,
            succeeded = stats.succeeded,
            breaker_tripped = stats.breaker_tripped,
            "Enrichment finished"
        );

        Enrichment {
            posts: enriched,
            stats,
        }
    }

    fn annotate(&self, checked: CheckedUrl) -> EnrichedPost {
        let url = checked.post.url.as_str();
        EnrichedPost {
            language: detect_language_str(url).map(str::to_string),
            detected_asset_type: self.detector.detect_from_url(url),
            is_duplicate: checked.is_duplicate,
            existing_asset_id: checked.existing_asset_id,
            post: checked.post,
        }
    }

    /// Returns the post and whether a page was fetched successfully.
    async fn enrich_one(&self, mut post: EnrichedPost, fetch: bool) -> (EnrichedPost, bool) {
        if !fetch {
            return (post, false);
        }

        let url = post.post.url.clone();
        let html = match self.fetch_within_deadline(&url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, category = e.category(), "HTML fetch failed");
                return (post, false);
            },
        };

        let meta = extract_metadata(&html);
        if let Some(title) = meta.title {
            post.post.title = title;
        }
        if meta.published.is_some() {
            post.post.published_date = meta.published;
        }
        if let Some(asset_type) = self.detector.detect_from_html(&url, &html).await {
            post.detected_asset_type = Some(asset_type);
        }

        (post, true)
    }

    async fn fetch_within_deadline(&self, url: &str) -> Result<String> {
        tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch_html(url))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "HTML fetch of {url} exceeded {:?}",
                    self.fetch_timeout
                ))
            })?
    }

    fn apply_default_type(&self, site: &Url, mut post: EnrichedPost) -> EnrichedPost {
        if post.detected_asset_type.is_none() && !is_pdf(&post.post.url) {
            let same_domain = Url::parse(&post.post.url).is_ok_and(|url| same_site(&url, site));
            if same_domain {
                post.detected_asset_type.clone_from(&self.default_asset_type);
            }
        }
        post
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
    use crate::DiscoveredUrl;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records calls and concurrency; succeeds for URLs in `ok`.
    #[derive(Default)]
    struct MockFetcher {
        ok: HashSet<String>,
        html: String,
        delay: Duration,
        calls: Mutex<Vec<String>>,
        current: AtomicUsize,
        max_seen: AtomicUsize,
    }

    impl MockFetcher {
        fn failing() -> Self {
            Self::default()
        }

        fn succeeding_for(urls: &[String], html: &str) -> Self {
            Self {
                ok: urls.iter().cloned().collect(),
                html: html.to_string(),
                ..Self::default()
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HtmlFetcher for MockFetcher {
        async fn fetch_html(&self, url: &str) -> Result<String> {
            self.calls.lock().unwrap().push(url.to_string());
            let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(current, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            if self.ok.contains(url) {
                Ok(self.html.clone())
            } else {
                Err(Error::Other("blocked".into()))
            }
        }
    }

    fn site() -> Url {
        Url::parse("https://x.com/blog").unwrap()
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://x.com/blog/post-{i}")).collect()
    }

    fn checked(urls: &[String]) -> Vec<CheckedUrl> {
        urls.iter()
            .map(|u| CheckedUrl {
                post: DiscoveredUrl::new(u.as_str(), "Slug Title"),
                is_duplicate: false,
                existing_asset_id: None,
            })
            .collect()
    }

    fn enricher(fetcher: &Arc<MockFetcher>) -> Enricher {
        Enricher::new(Arc::clone(fetcher) as Arc<dyn HtmlFetcher>, Arc::new(HeuristicDetector))
    }

    #[tokio::test]
    async fn test_breaker_limits_fetches_when_all_fail() {
        for n in [1, 2, 3, 4, 10] {
            let fetcher = Arc::new(MockFetcher::failing());
            let result = enricher(&fetcher).enrich(&site(), checked(&urls(n))).await;

            assert_eq!(fetcher.call_count(), n.min(3), "n = {n}");
            assert_eq!(result.posts.len(), n);
            assert_eq!(result.stats.succeeded, 0);
            assert_eq!(result.stats.breaker_tripped, n > 3);
        }
    }

    #[tokio::test]
    async fn test_one_success_keeps_fetching() {
        let all = urls(8);
        let fetcher = Arc::new(MockFetcher::succeeding_for(&all[..1], "<title>Real</title>"));
        let result = enricher(&fetcher).enrich(&site(), checked(&all)).await;

        assert_eq!(fetcher.call_count(), 8);
        assert_eq!(result.stats.succeeded, 1);
        assert!(!result.stats.breaker_tripped);
    }

    #[tokio::test]
    async fn test_success_in_wide_batch_resumes_fetching() {
        let all = urls(10);
        let fetcher = Arc::new(MockFetcher::succeeding_for(&all[..1], "<title>Real</title>"));
        let config = EnrichmentConfig {
            batch_size: 5,
            ..EnrichmentConfig::default()
        };
        let enricher = Enricher::with_settings(
            Arc::clone(&fetcher) as Arc<dyn HtmlFetcher>,
            Arc::new(HeuristicDetector),
            &config,
        );
        let result = enricher.enrich(&site(), checked(&all)).await;

        // Posts 3 and 4 are refused before batch one resolves; batch two runs in full.
        assert_eq!(fetcher.call_count(), 8);
        let calls = fetcher.calls.lock().unwrap().clone();
        assert_eq!(&calls[3..], &all[5..]);
        assert_eq!(result.stats.succeeded, 1);
        assert!(!result.stats.breaker_tripped);
        assert_eq!(result.posts[0].post.title, "Real");
    }

    #[tokio::test]
    async fn test_batches_bound_concurrency() {
        let all = urls(10);
        let fetcher = Arc::new(
            MockFetcher::succeeding_for(&all, "<title>T</title>").with_delay(Duration::from_millis(30)),
        );
        enricher(&fetcher).enrich(&site(), checked(&all)).await;

        let max_seen = fetcher.max_seen.load(Ordering::SeqCst);
        assert!(max_seen <= 3, "Max concurrent was {max_seen}, should be <= 3");
        assert_eq!(fetcher.call_count(), 10);
    }

    #[tokio::test]
    async fn test_output_order_matches_input() {
        let all = urls(7);
        let fetcher = Arc::new(MockFetcher::succeeding_for(&all[3..], "<title>T</title>"));
        let result = enricher(&fetcher).enrich(&site(), checked(&all)).await;

        let out: Vec<_> = result.posts.iter().map(|p| p.post.url.clone()).collect();
        assert_eq!(out, all);
    }

    #[tokio::test]
    async fn test_html_upgrades_title_date_and_type() {
        let all = urls(1);
        let html = r#"<head>
            <meta property="og:title" content="The Real Title">
            <meta property="article:published_time" content="2024-05-06T08:00:00Z">
            <script type="application/ld+json">{"@type": "NewsArticle"}</script>
        </head>"#;
        let fetcher = Arc::new(MockFetcher::succeeding_for(&all, html));
        let result = enricher(&fetcher).enrich(&site(), checked(&all)).await;

        let post = &result.posts[0];
        assert_eq!(post.post.title, "The Real Title");
        assert_eq!(post.post.published_date, NaiveDate::from_ymd_opt(2024, 5, 6));
        assert_eq!(post.detected_asset_type.as_deref(), Some("News"));
    }

    #[tokio::test]
    async fn test_timeouts_count_as_failures() {
        let all = urls(5);
        let fetcher = Arc::new(
            MockFetcher::succeeding_for(&all, "<title>Late</title>").with_delay(Duration::from_millis(300)),
        );
        let result = enricher(&fetcher)
            .with_fetch_timeout(Duration::from_millis(20))
            .enrich(&site(), checked(&all))
            .await;

        assert_eq!(result.stats.succeeded, 0);
        assert!(result.stats.breaker_tripped);
        assert_eq!(fetcher.call_count(), 3);
        assert!(result.posts.iter().all(|p| p.post.title == "Slug Title"));
    }

    #[tokio::test]
    async fn test_slow_fetch_is_a_timeout_error() {
        let all = urls(1);
        let fetcher = Arc::new(
            MockFetcher::succeeding_for(&all, "<title>Late</title>").with_delay(Duration::from_millis(300)),
        );
        let err = enricher(&fetcher)
            .with_fetch_timeout(Duration::from_millis(20))
            .fetch_within_deadline(&all[0])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout(ref msg) if msg.contains(&all[0])));
        assert_eq!(err.category(), "timeout");
    }

    #[tokio::test]
    async fn test_pdfs_are_never_fetched_or_defaulted() {
        let pdf = vec!["https://x.com/files/report.pdf".to_string()];
        let fetcher = Arc::new(MockFetcher::succeeding_for(&pdf, "<title>T</title>"));
        let result = enricher(&fetcher).enrich(&site(), checked(&pdf)).await;

        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(result.posts[0].detected_asset_type, None);
    }

    #[tokio::test]
    async fn test_default_type_only_for_same_site() {
        let mixed = vec![
            "https://www.x.com/blog/ours".to_string(),
            "https://medium.com/@x/theirs".to_string(),
        ];
        let fetcher = Arc::new(MockFetcher::failing());
        let result = enricher(&fetcher).enrich(&site(), checked(&mixed)).await;

        assert_eq!(result.posts[0].detected_asset_type.as_deref(), Some("Blog Post"));
        assert_eq!(result.posts[1].detected_asset_type, None);

        let config = EnrichmentConfig {
            default_asset_type: None,
            ..EnrichmentConfig::default()
        };
        let no_default = Enricher::with_settings(
            Arc::clone(&fetcher) as Arc<dyn HtmlFetcher>,
            Arc::new(HeuristicDetector),
            &config,
        );
        let result = no_default.enrich(&site(), checked(&mixed)).await;
        assert_eq!(result.posts[0].detected_asset_type, None);
    }

    #[tokio::test]
    async fn test_disabled_enrichment_uses_url_only() {
        let all = vec![
            "https://x.com/de/blog/webinar-recap-spring".to_string(),
            "https://x.com/blog/plain".to_string(),
        ];
        let fetcher = Arc::new(MockFetcher::succeeding_for(&all, "<title>T</title>"));
        let result = enricher(&fetcher)
            .enabled(false)
            .enrich(&site(), checked(&all))
            .await;

        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(result.stats.attempted, 0);
        assert_eq!(result.posts[0].detected_asset_type.as_deref(), Some("Webinar"));
        assert_eq!(result.posts[0].language.as_deref(), Some("de"));
        assert_eq!(result.posts[1].detected_asset_type.as_deref(), Some("Blog Post"));
        assert_eq!(result.posts[1].language, None);
    }
}
