//! Discovery orchestrator: tries strategies in strict cost order.
//!
//! ```text
//! input ──normalize──▶ single post? ──yes──▶ [single-post, 0 credits]
//!                           │ no
//!                           ▼
//!                 sitemap ──▶ rss ──▶ firecrawl-map ──▶ fallbackRequired
//! ```
//!
//! Each stage is terminal on its first non-empty result. Stages never run
//! concurrently, and a failing stage (error or empty) only advances the
//! cascade; the sole error surfaced to callers is an unparseable input URL.

use crate::config::Config;
use crate::discovery::feed::FeedDiscoverer;
use crate::discovery::firecrawl::FirecrawlMapStrategy;
use crate::discovery::normalize::{is_single_post_url, normalize_url, single_post_result};
use crate::discovery::sitemap::SitemapDiscoverer;
use crate::{DiscoveredUrl, DiscoveryMethod, DiscoveryResult, Error, Result};
use async_trait::async_trait;
use tracing::instrument;
use url::Url;

/// Default cap on URLs returned by any stage.
pub const DEFAULT_MAX_POSTS: usize = 50;

/// Per-run discovery options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Maximum number of URLs a stage may return.
    pub max_posts: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_posts: DEFAULT_MAX_POSTS,
        }
    }
}

/// A single stage of the discovery cascade.
///
/// Implementations return an empty list (not an error) when the site simply
/// has nothing at their locations. [`Error::Unavailable`] marks a stage that
/// cannot run at all, such as a paid API without credentials.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    /// Method reported when this stage succeeds.
    fn method(&self) -> DiscoveryMethod;

    /// Credits charged per invocation (flat, independent of result size).
    fn credits_per_call(&self) -> u32 {
        0
    }

    /// Discover post URLs for `site`.
    async fn discover(&self, site: &Url, options: &DiscoveryOptions) -> Result<Vec<DiscoveredUrl>>;
}

/// Runs the discovery cascade.
///
/// ## Example
///
/// ```rust,no_run
/// use blogmap_core::{BlogDiscoverer, Config, DiscoveryOptions};
///
/// # async fn example() -> blogmap_core::Result<()> {
/// let discoverer = BlogDiscoverer::from_config(&Config::load()?)?;
/// let result = discoverer.discover("example.com/blog", &DiscoveryOptions::default()).await?;
///
/// if result.fallback_required {
///     println!("No cheap method worked");
/// } else {
///     println!("{} posts via {:?}", result.urls.len(), result.discovery_method);
/// }
/// # Ok(())
/// # }
/// ```
pub struct BlogDiscoverer {
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
}

impl BlogDiscoverer {
    /// Create an orchestrator over an explicit, ordered list of strategies.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn DiscoveryStrategy>>) -> Self {
        Self { strategies }
    }

    /// Build the standard cascade (sitemap, feed, Firecrawl map) from configuration.
    ///
    /// The sitemap and feed stages each get their own HTTP client with the
    /// configured per-candidate timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.discovery.candidate_timeout();
        Ok(Self::new(vec![
            Box::new(SitemapDiscoverer::new(timeout)?),
            Box::new(FeedDiscoverer::new(timeout)?),
            Box::new(FirecrawlMapStrategy::from_config(&config.firecrawl)?),
        ]))
    }

    /// Methods of the configured strategies, in cascade order.
    pub fn methods(&self) -> impl Iterator<Item = DiscoveryMethod> + '_ {
        self.strategies.iter().map(|strategy| strategy.method())
    }

    /// Discover blog post URLs for user input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] when the input cannot be normalized.
    /// Every other failure is absorbed into the cascade.
    #[instrument(skip_all, fields(input = %input))]
    pub async fn discover(&self, input: &str, options: &DiscoveryOptions) -> Result<DiscoveryResult> {
        let site = normalize_url(input)?;

        if is_single_post_url(&site) {
            tracing::debug!(url = %site, "Input is a single post; skipping discovery");
            return Ok(single_post_result(&site));
        }

        Ok(self.run_cascade(&site, options).await)
    }

    /// Run the strategies in order against an already-normalized site URL.
    pub async fn run_cascade(&self, site: &Url, options: &DiscoveryOptions) -> DiscoveryResult {
        for strategy in &self.strategies {
            let method = strategy.method();

            match strategy.discover(site, options).await {
                Ok(urls) if !urls.is_empty() => {
                    tracing::info!(method = %method, count = urls.len(), "Discovered blog posts");
                    return DiscoveryResult::found(urls, method, strategy.credits_per_call());
                },
                Ok(_) => {
                    tracing::debug!(
                        method = %method,
                        credits = strategy.credits_per_call(),
                        "Strategy found no posts"
                    );
                },
                Err(Error::Unavailable(reason)) => {
                    tracing::debug!(method = %method, reason = %reason, "Strategy unavailable");
                },
                Err(e) => {
                    tracing::warn!(method = %method, error = %e, "Strategy failed");
                },
            }
        }

        tracing::info!(url = %site, "No discovery strategy succeeded; fallback required");
        DiscoveryResult::fallback_required()
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
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Canned {
        Found(Vec<&'static str>),
        Empty,
        Fail,
        Unavailable,
    }

    struct MockStrategy {
        method: DiscoveryMethod,
        credits: u32,
        response: Canned,
        calls: Arc<AtomicUsize>,
    }

    impl MockStrategy {
        fn boxed(
            method: DiscoveryMethod,
            credits: u32,
            response: Canned,
        ) -> (Box<dyn DiscoveryStrategy>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let strategy = Self {
                method,
                credits,
                response,
                calls: Arc::clone(&calls),
            };
            (Box::new(strategy), calls)
        }
    }

    #[async_trait]
    impl DiscoveryStrategy for MockStrategy {
        fn method(&self) -> DiscoveryMethod {
            self.method
        }

        fn credits_per_call(&self) -> u32 {
            self.credits
        }

        async fn discover(&self, _site: &Url, _options: &DiscoveryOptions) -> Result<Vec<DiscoveredUrl>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Canned::Found(urls) => Ok(urls
                    .iter()
                    .map(|url| DiscoveredUrl::new(*url, "Title"))
                    .collect()),
                Canned::Empty => Ok(Vec::new()),
                Canned::Fail => Err(Error::Parse("broken".into())),
                Canned::Unavailable => Err(Error::Unavailable("no key".into())),
            }
        }
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let (sitemap, sitemap_calls) =
            MockStrategy::boxed(DiscoveryMethod::Sitemap, 0, Canned::Found(vec!["https://x.com/blog/a"]));
        let (rss, rss_calls) = MockStrategy::boxed(DiscoveryMethod::Rss, 0, Canned::Found(vec!["b"]));

        let discoverer = BlogDiscoverer::new(vec![sitemap, rss]);
        let result = discoverer
            .discover("https://x.com/blog", &DiscoveryOptions::default())
            .await
            .unwrap();

        assert_eq!(result.discovery_method, Some(DiscoveryMethod::Sitemap));
        assert_eq!(result.credits_used, 0);
        assert_eq!(sitemap_calls.load(Ordering::SeqCst), 1);
        assert_eq!(rss_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_advance_in_order() {
        let (sitemap, _) = MockStrategy::boxed(DiscoveryMethod::Sitemap, 0, Canned::Fail);
        let (rss, _) = MockStrategy::boxed(DiscoveryMethod::Rss, 0, Canned::Empty);
        let (map, map_calls) = MockStrategy::boxed(
            DiscoveryMethod::FirecrawlMap,
            1,
            Canned::Found(vec!["https://x.com/blog/a-long-descriptive-slug-here"]),
        );

        let discoverer = BlogDiscoverer::new(vec![sitemap, rss, map]);
        let result = discoverer
            .discover("x.com/blog", &DiscoveryOptions::default())
            .await
            .unwrap();

        assert_eq!(result.discovery_method, Some(DiscoveryMethod::FirecrawlMap));
        assert_eq!(result.credits_used, 1);
        assert_eq!(result.urls.len(), 1);
        assert_eq!(map_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_failing_requires_fallback() {
        let (sitemap, _) = MockStrategy::boxed(DiscoveryMethod::Sitemap, 0, Canned::Empty);
        let (rss, _) = MockStrategy::boxed(DiscoveryMethod::Rss, 0, Canned::Fail);
        let (map, _) = MockStrategy::boxed(DiscoveryMethod::FirecrawlMap, 1, Canned::Unavailable);

        let discoverer = BlogDiscoverer::new(vec![sitemap, rss, map]);
        let result = discoverer
            .discover("https://x.com/blog", &DiscoveryOptions::default())
            .await
            .unwrap();

        assert!(result.fallback_required);
        assert!(result.urls.is_empty());
        assert_eq!(result.credits_used, 0);
        assert_eq!(result.discovery_method, None);
    }

    #[tokio::test]
    async fn test_single_post_skips_every_strategy() {
        let (sitemap, calls) =
            MockStrategy::boxed(DiscoveryMethod::Sitemap, 0, Canned::Found(vec!["a"]));

        let discoverer = BlogDiscoverer::new(vec![sitemap]);
        let result = discoverer
            .discover(
                "https://x.com/blog/why-we-rewrote-our-importer",
                &DiscoveryOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.discovery_method, Some(DiscoveryMethod::SinglePost));
        assert_eq!(result.urls.len(), 1);
        assert_eq!(result.urls[0].title, "Why We Rewrote Our Importer");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_input_is_the_only_error() {
        let discoverer = BlogDiscoverer::new(Vec::new());
        let err = discoverer
            .discover("not a url at all", &DiscoveryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn test_standard_cascade_order() {
        let discoverer = BlogDiscoverer::from_config(&Config::default()).unwrap();
        let methods: Vec<_> = discoverer.methods().collect();
        assert_eq!(
            methods,
            vec![
                DiscoveryMethod::Sitemap,
                DiscoveryMethod::Rss,
                DiscoveryMethod::FirecrawlMap
            ]
        );
    }
}
