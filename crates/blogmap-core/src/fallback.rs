//! Last-resort extraction when the discovery cascade finds nothing.
//!
//! Unlike the cascade stages, a fallback failure is user-visible: it is
//! reported as [`Error::DiscoveryFailed`].

use crate::config::FallbackConfig;
use crate::discovery::dates::date_from_url;
use crate::discovery::filter::{dedup_by_url, is_post_candidate, same_site};
use crate::discovery::normalize::{is_single_post_url, title_from_url};
use crate::{DiscoveredUrl, DiscoveryMethod, DiscoveryResult, Error, Result, http};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::instrument;
use url::Url;

#[allow(clippy::unwrap_used)] // SAFETY: Pattern is a compile-time constant
static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(\s*(https?://[^)\s]+)").unwrap());

/// Extracts post URLs from a listing page by some heavier means.
#[async_trait]
pub trait LegacyExtractor: Send + Sync {
    /// Method reported on success.
    fn method(&self) -> DiscoveryMethod;

    /// Credits charged per invocation.
    fn credits_per_call(&self) -> u32 {
        0
    }

    /// Extract up to `max_posts` post URLs from the page at `url`.
    async fn extract_blog_post_urls(&self, url: &Url, max_posts: usize) -> Result<Vec<DiscoveredUrl>>;
}

/// Run `extractor` for a site the cascade could not handle.
///
/// # Errors
///
/// Returns [`Error::DiscoveryFailed`] when no extractor is configured, the
/// extractor fails, or it finds no posts.
pub async fn run_fallback(
    extractor: Option<&dyn LegacyExtractor>,
    site: &Url,
    max_posts: usize,
) -> Result<DiscoveryResult> {
    let Some(extractor) = extractor else {
        return Err(Error::DiscoveryFailed(format!(
            "no sitemap, feed or crawl results for {site} and no fallback extractor is enabled"
        )));
    };

    let method = extractor.method();
    let urls = extractor
        .extract_blog_post_urls(site, max_posts)
        .await
        .map_err(|e| Error::DiscoveryFailed(format!("{method} extraction failed: {e}")))?;

    if urls.is_empty() {
        return Err(Error::DiscoveryFailed(format!(
            "{method} extraction found no posts on {site}"
        )));
    }

    tracing::info!(method = %method, count = urls.len(), "Fallback extraction found posts");
    Ok(DiscoveryResult::found(urls, method, extractor.credits_per_call()))
}

/// Reads a page through the Jina reader (`{reader_url}/{page_url}`) and
/// collects the same-site post links in its markdown rendering.
pub struct JinaReaderExtractor {
    client: Client,
    reader_url: String,
}

impl JinaReaderExtractor {
    /// Create an extractor for `reader_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(reader_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            reader_url: reader_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build from configuration; `Ok(None)` when the reader is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &FallbackConfig) -> Result<Option<Self>> {
        if !config.jina_enabled {
            return Ok(None);
        }
        Self::new(
            config.jina_reader_url.as_str(),
            Duration::from_secs(config.timeout_secs),
        )
        .map(Some)
    }
}

#[async_trait]
impl LegacyExtractor for JinaReaderExtractor {
    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::JinaFallback
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn extract_blog_post_urls(&self, url: &Url, max_posts: usize) -> Result<Vec<DiscoveredUrl>> {
        let markdown = self
            .client
            .get(format!("{}/{}", self.reader_url, url))
            .header("X-Return-Format", "markdown")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(extract_post_links(&markdown, url, max_posts))
    }
}

/// Collect post links from markdown: same site as `site`, classified as a
/// single post or living under a blog path, excluding `site` itself.
#[must_use]
pub fn extract_post_links(markdown: &str, site: &Url, max_posts: usize) -> Vec<DiscoveredUrl> {
    let posts = MARKDOWN_LINK
        .captures_iter(markdown)
        .filter(|caps| caps[1].is_empty())
        .filter_map(|caps| {
            let mut link = Url::parse(&caps[3]).ok()?;
            link.set_fragment(None);
            let keep = same_site(&link, site)
                && link.path().trim_end_matches('/') != site.path().trim_end_matches('/')
                && (is_single_post_url(&link) || is_post_candidate(&link));
            if !keep {
                return None;
            }

            let href = link.as_str();
            let text = caps[2].trim();
            let title = if text.is_empty() {
                title_from_url(href)
            } else {
                text.to_string()
            };
            Some(DiscoveredUrl::new(href, title).with_published_date(date_from_url(href)))
        })
        .collect();

    let mut posts = dedup_by_url(posts);
    posts.truncate(max_posts);
    posts
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
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MARKDOWN: &str = "\
# Acme Blog

[Home](https://acme.com/)
[Blog](https://acme.com/blog/)
![hero](https://acme.com/blog/images/hero-image-large-banner.png)
- [Shipping faster with smaller teams](https://acme.com/blog/shipping-faster-with-small-teams)
- [](https://www.acme.com/2024/02/10/quarterly-product-update/)
- [Duplicate](https://acme.com/blog/shipping-faster-with-small-teams#comments)
- [Elsewhere](https://other.com/blog/an-interesting-external-post)
- [Tag](https://acme.com/blog/tag/engineering)
";

    struct Fixed(Result<Vec<DiscoveredUrl>>);

    #[async_trait]
    impl LegacyExtractor for Fixed {
        fn method(&self) -> DiscoveryMethod {
            DiscoveryMethod::JinaFallback
        }

        async fn extract_blog_post_urls(&self, _url: &Url, _max: usize) -> Result<Vec<DiscoveredUrl>> {
            match &self.0 {
                Ok(urls) => Ok(urls.clone()),
                Err(e) => Err(Error::Other(e.to_string())),
            }
        }
    }

    fn site() -> Url {
        Url::parse("https://acme.com/blog").unwrap()
    }

    #[test]
    fn test_extract_post_links() {
        let posts = extract_post_links(MARKDOWN, &site(), 50);
        let urls: Vec<_> = posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://acme.com/blog/shipping-faster-with-small-teams",
                "https://www.acme.com/2024/02/10/quarterly-product-update/",
            ]
        );
        assert_eq!(posts[0].title, "Shipping faster with smaller teams");
        assert_eq!(posts[1].title, "Quarterly Product Update");
        assert_eq!(posts[1].published_date, chrono::NaiveDate::from_ymd_opt(2024, 2, 10));

        assert_eq!(extract_post_links(MARKDOWN, &site(), 1).len(), 1);
    }

    #[tokio::test]
    async fn test_without_extractor_discovery_fails() {
        let err = run_fallback(None, &site(), 50).await.unwrap_err();
        assert!(matches!(err, Error::DiscoveryFailed(_)));
        assert!(err.to_string().starts_with("Failed to discover blog posts: "));
    }

    #[tokio::test]
    async fn test_empty_or_failing_extractor_is_an_error() {
        let empty = Fixed(Ok(Vec::new()));
        let err = run_fallback(Some(&empty), &site(), 50).await.unwrap_err();
        assert!(err.to_string().contains("found no posts"));

        let failing = Fixed(Err(Error::Other("reader down".into())));
        let err = run_fallback(Some(&failing), &site(), 50).await.unwrap_err();
        assert!(matches!(err, Error::DiscoveryFailed(_)));
        assert!(err.to_string().contains("reader down"));
    }

    #[tokio::test]
    async fn test_successful_fallback_is_free() {
        let found = Fixed(Ok(vec![DiscoveredUrl::new("https://acme.com/blog/a", "A")]));
        let result = run_fallback(Some(&found), &site(), 50).await.unwrap();
        assert_eq!(result.discovery_method, Some(DiscoveryMethod::JinaFallback));
        assert_eq!(result.credits_used, 0);
        assert!(!result.fallback_required);
    }

    #[tokio::test]
    async fn test_jina_reader_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/https://acme.com/blog"))
            .and(header("x-return-format", "markdown"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MARKDOWN))
            .expect(1)
            .mount(&server)
            .await;

        let extractor = JinaReaderExtractor::new(server.uri(), Duration::from_secs(5)).unwrap();
        let posts = extractor.extract_blog_post_urls(&site(), 50).await.unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[test]
    fn test_disabled_by_default() {
        assert!(JinaReaderExtractor::from_config(&FallbackConfig::default()).unwrap().is_none());
    }
}
