//! Paid crawl-fallback stage backed by the Firecrawl map API.
//!
//! The map endpoint lists every URL it can find on a site in one call. It
//! costs a flat credit per invocation, which is why it runs last.

use crate::config::FirecrawlConfig;
use crate::discovery::dates::date_from_url;
use crate::discovery::filter::{dedup_by_url, is_post_candidate};
use crate::discovery::normalize::title_from_url;
use crate::discovery::orchestrator::{DiscoveryOptions, DiscoveryStrategy};
use crate::{DiscoveredUrl, DiscoveryMethod, Error, Result, http};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// Credits charged for one map call.
pub const MAP_CREDIT_COST: u32 = 1;

/// Upper bound on the `limit` sent to the map endpoint.
const MAX_MAP_LIMIT: usize = 5_000;

/// Map results cover the whole site; the request limit is this multiple of `max_posts`.
const MAP_OVERFETCH: usize = 4;

/// Lists the URLs of a site.
#[async_trait]
pub trait UrlMapper: Send + Sync {
    /// Return up to `limit` URLs found on `url`'s site.
    async fn map_urls(&self, url: &str, limit: usize) -> Result<Vec<String>>;
}

/// Firecrawl `/map` client.
pub struct FirecrawlMapper {
    client: Client,
    api_key: String,
    api_url: String,
}

#[derive(Debug, Serialize)]
struct MapRequest<'a> {
    url: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct MapResponse {
    success: bool,
    #[serde(default)]
    links: Vec<MapLink>,
    #[serde(default)]
    error: Option<String>,
}

/// `/v1/map` returns bare strings; newer API versions return objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MapLink {
    Url(String),
    Entry { url: String },
}

impl MapLink {
    fn into_url(self) -> String {
        match self {
            Self::Url(url) | Self::Entry { url } => url,
        }
    }
}

impl FirecrawlMapper {
    /// Create a mapper for `api_url` (base URL without the `/map` suffix).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            api_key: api_key.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build a mapper from configuration.
    ///
    /// Returns `Ok(None)` when no API key is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &FirecrawlConfig) -> Result<Option<Self>> {
        match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(Some(Self::new(
                key,
                config.api_url.as_str(),
                Duration::from_secs(config.timeout_secs),
            )?)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl UrlMapper for FirecrawlMapper {
    #[instrument(skip_all, fields(url = %url, limit = limit))]
    async fn map_urls(&self, url: &str, limit: usize) -> Result<Vec<String>> {
        let response = self
            .client
            .post(format!("{}/map", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&MapRequest { url, limit })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Other(format!(
                "Firecrawl map request failed (status {status}): {body}"
            )));
        }

        let body: MapResponse = response.json().await?;
        if !body.success {
            return Err(Error::Other(format!(
                "Firecrawl map request failed: {}",
                body.error.as_deref().unwrap_or("unknown error")
            )));
        }

        tracing::debug!(count = body.links.len(), "Firecrawl map returned links");
        Ok(body.links.into_iter().map(MapLink::into_url).collect())
    }
}

/// Turn mapped links into post entries: blog-path candidates only, first
/// occurrence wins, capped at `max_posts`.
#[must_use]
pub fn links_to_posts(links: Vec<String>, max_posts: usize) -> Vec<DiscoveredUrl> {
    let posts = links
        .into_iter()
        .filter_map(|link| {
            let mut url = Url::parse(link.trim()).ok()?;
            url.set_fragment(None);
            is_post_candidate(&url).then(|| {
                let href = url.as_str();
                DiscoveredUrl::new(href, title_from_url(href)).with_published_date(date_from_url(href))
            })
        })
        .collect();

    let mut posts = dedup_by_url(posts);
    posts.truncate(max_posts);
    posts
}

/// Discovery stage that maps the site through a [`UrlMapper`].
pub struct FirecrawlMapStrategy {
    mapper: Option<Arc<dyn UrlMapper>>,
}

impl FirecrawlMapStrategy {
    /// Wrap an explicit mapper.
    #[must_use]
    pub fn new(mapper: Arc<dyn UrlMapper>) -> Self {
        Self {
            mapper: Some(mapper),
        }
    }

    /// A strategy that is always unavailable.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { mapper: None }
    }

    /// Build from configuration; the stage is disabled without an API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &FirecrawlConfig) -> Result<Self> {
        Ok(FirecrawlMapper::from_config(config)?.map_or_else(Self::disabled, |mapper| {
            Self::new(Arc::new(mapper))
        }))
    }

    /// Whether a mapper is configured.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.mapper.is_some()
    }
}

#[async_trait]
impl DiscoveryStrategy for FirecrawlMapStrategy {
    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::FirecrawlMap
    }

    fn credits_per_call(&self) -> u32 {
        MAP_CREDIT_COST
    }

    async fn discover(&self, site: &Url, options: &DiscoveryOptions) -> Result<Vec<DiscoveredUrl>> {
        let Some(mapper) = &self.mapper else {
            return Err(Error::Unavailable(
                "Firecrawl API key not configured".to_string(),
            ));
        };

        let limit = options
            .max_posts
            .saturating_mul(MAP_OVERFETCH)
            .clamp(1, MAX_MAP_LIMIT);
        let links = mapper.map_urls(site.as_str(), limit).await?;
        let posts = links_to_posts(links, options.max_posts);

        if posts.is_empty() {
            tracing::info!(
                url = %site,
                credits = MAP_CREDIT_COST,
                "Firecrawl map returned no blog posts; credit already spent"
            );
        }
        Ok(posts)
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
    use crate::discovery::orchestrator::BlogDiscoverer;
    use crate::discovery::sitemap::SitemapDiscoverer;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mapper_for(server: &MockServer) -> FirecrawlMapper {
        FirecrawlMapper::new("fc-test", server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_from_config_without_key_is_none() {
        assert!(FirecrawlMapper::from_config(&FirecrawlConfig::default()).unwrap().is_none());

        let blank = FirecrawlConfig {
            api_key: Some("   ".to_string()),
            ..FirecrawlConfig::default()
        };
        assert!(FirecrawlMapper::from_config(&blank).unwrap().is_none());
        assert!(!FirecrawlMapStrategy::from_config(&blank).unwrap().is_available());
    }

    #[test]
    fn test_links_to_posts_filters_and_caps() {
        let links = vec![
            "https://x.com/about".to_string(),
            "https://x.com/blog/".to_string(),
            "https://x.com/blog/2024/05/06/shipping-faster".to_string(),
            "https://x.com/blog/tag/rust".to_string(),
            "https://x.com/blog/second-post#comments".to_string(),
            "https://x.com/blog/second-post".to_string(),
            "not a url".to_string(),
            "https://x.com/news/third".to_string(),
        ];

        let posts = links_to_posts(links, 2);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "Shipping Faster");
        assert_eq!(posts[0].published_date, chrono::NaiveDate::from_ymd_opt(2024, 5, 6));
        assert_eq!(posts[1].url, "https://x.com/blog/second-post");
        assert_eq!(posts[1].published_date, None);
    }

    #[tokio::test]
    async fn test_map_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/map"))
            .and(header("authorization", "Bearer fc-test"))
            .and(body_json(serde_json::json!({ "url": "https://x.com/", "limit": 20 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "links": ["https://x.com/blog/a", { "url": "https://x.com/blog/b" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let links = mapper_for(&server).map_urls("https://x.com/", 20).await.unwrap();
        assert_eq!(links, vec!["https://x.com/blog/a", "https://x.com/blog/b"]);
    }

    #[tokio::test]
    async fn test_map_api_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/map"))
            .respond_with(ResponseTemplate::new(402).set_body_string("Payment required"))
            .mount(&server)
            .await;

        let err = mapper_for(&server).map_urls("https://x.com/", 10).await.unwrap_err();
        assert!(err.to_string().contains("402"));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/map"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": "Invalid URL"
            })))
            .mount(&server)
            .await;

        let err = mapper_for(&server).map_urls("https://x.com/", 10).await.unwrap_err();
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[tokio::test]
    async fn test_strategy_without_key_is_unavailable() {
        let strategy = FirecrawlMapStrategy::disabled();
        let site = Url::parse("https://x.com/blog").unwrap();
        let err = strategy
            .discover(&site, &DiscoveryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_firecrawl_scenario_reports_one_credit() {
        let site_server = MockServer::start().await;
        let api_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/map"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "links": ["https://x.com/blog/a-long-descriptive-slug-here"]
            })))
            .expect(1)
            .mount(&api_server)
            .await;

        let discoverer = BlogDiscoverer::new(vec![
            Box::new(SitemapDiscoverer::new(Duration::from_secs(2)).unwrap()),
            Box::new(FirecrawlMapStrategy::new(Arc::new(mapper_for(&api_server)))),
        ]);

        let input = format!("{}/blog", site_server.uri());
        let result = discoverer
            .discover(&input, &DiscoveryOptions::default())
            .await
            .unwrap();

        assert_eq!(result.discovery_method, Some(DiscoveryMethod::FirecrawlMap));
        assert_eq!(result.credits_used, 1);
        assert!(!result.fallback_required);
        assert_eq!(result.urls.len(), 1);
        assert_eq!(result.urls[0].url, "https://x.com/blog/a-long-descriptive-slug-here");
        assert_eq!(result.urls[0].title, "A Long Descriptive Slug Here");
    }
}
