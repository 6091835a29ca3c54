//! Sitemap discovery: the first and cheapest stage of the cascade.
//!
//! Well-known sitemap locations are tried in order against the site origin.
//! The first one that parses and contains at least one blog-like URL wins;
//! every failure (non-2xx, timeout, malformed XML, no blog entries) silently
//! advances to the next candidate.
//!
//! ## Quick Start
//!
//! ```rust
//! use blogmap_core::discovery::sitemap::parse_sitemap;
//!
//! let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/blog/my-post</loc>
//!     <lastmod>2024-03-01</lastmod>
//!   </url>
//! </urlset>"#;
//!
//! let entries = parse_sitemap(xml)?;
//! assert_eq!(entries.len(), 1);
//! assert!(entries[0].lastmod.is_some());
//! # Ok::<(), blogmap_core::Error>(())
//! ```
//!
//! ## Sitemap Formats
//!
//! - **Standard sitemap**: `<urlset>` with `<url>` entries
//! - **Sitemap index**: `<sitemapindex>` with `<sitemap>` entries pointing to
//!   child sitemaps, fetched recursively (post/blog children first)
//!
//! A candidate and all the children it leads to share a single deadline.

use crate::discovery::dates::{date_from_url, parse_timestamp};
use crate::discovery::filter::{dedup_by_url, is_post_candidate};
use crate::discovery::normalize::title_from_url;
use crate::discovery::orchestrator::{DiscoveryOptions, DiscoveryStrategy};
use crate::{DiscoveredUrl, DiscoveryMethod, Error, Result, http};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Client;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// Sitemap locations tried, in order, relative to the site origin.
pub const SITEMAP_CANDIDATES: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/wp-sitemap.xml",
    "/sitemap-blog.xml",
];

/// Maximum recursion depth for sitemap index files.
const MAX_INDEX_DEPTH: u8 = 2;

/// Maximum number of child sitemaps fetched from one index.
const MAX_CHILD_SITEMAPS: usize = 50;

/// Child sitemaps fetched at once.
const CHILD_CONCURRENCY: usize = 4;

/// A single `<url>` (or `<sitemap>`) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    /// The `<loc>` value.
    pub url: String,
    /// The `<lastmod>` value, when present and parseable.
    pub lastmod: Option<DateTime<Utc>>,
}

/// Parsed sitemap document.
#[derive(Debug)]
enum SitemapContent {
    /// `<urlset>` entries.
    Entries(Vec<SitemapEntry>),
    /// `<sitemapindex>` children.
    Index(Vec<SitemapEntry>),
}

#[derive(Clone, Copy)]
enum Field {
    Loc,
    Lastmod,
}

/// Parse a standard sitemap document.
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed XML, for documents without a
/// `<urlset>` root (an HTML error page, for instance), and for sitemap
/// indexes, which must be fetched with [`fetch_sitemap`].
pub fn parse_sitemap(xml: &str) -> Result<Vec<SitemapEntry>> {
    match parse_sitemap_content(xml)? {
        SitemapContent::Entries(entries) => Ok(entries),
        SitemapContent::Index(_) => Err(Error::Parse(
            "XML is a sitemap index, not a standard sitemap".to_string(),
        )),
    }
}

/// Single pass over the document; the first recognized root element decides
/// whether the `<loc>` blocks are pages or child sitemaps.
fn parse_sitemap_content(xml: &str) -> Result<SitemapContent> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut is_index: Option<bool> = None;
    let mut entries = Vec::new();
    let mut current: Option<SitemapEntry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"urlset" => {
                    is_index.get_or_insert(false);
                },
                b"sitemapindex" => {
                    is_index.get_or_insert(true);
                },
                b"url" | b"sitemap" => {
                    current = Some(SitemapEntry {
                        url: String::new(),
                        lastmod: None,
                    });
                },
                b"loc" if current.is_some() => field = Some(Field::Loc),
                b"lastmod" if current.is_some() => field = Some(Field::Lastmod),
                _ => {},
            },
            Ok(Event::Text(text)) => {
                if let (Some(field), Some(entry)) = (field, current.as_mut()) {
                    let value = text.unescape().map_err(|e| Error::Parse(e.to_string()))?;
                    apply_field(entry, field, value.trim());
                }
            },
            Ok(Event::CData(data)) => {
                if let (Some(field), Some(entry)) = (field, current.as_mut()) {
                    let value = String::from_utf8_lossy(&data);
                    apply_field(entry, field, value.trim());
                }
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"url" | b"sitemap" => {
                    if let Some(entry) = current.take().filter(|entry| !entry.url.is_empty()) {
                        entries.push(entry);
                    }
                },
                b"loc" | b"lastmod" => field = None,
                _ => {},
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Parse(format!(
                    "XML parse error at position {}: {e}",
                    reader.buffer_position()
                )));
            },
            _ => {},
        }
    }

    match is_index {
        Some(true) => Ok(SitemapContent::Index(entries)),
        Some(false) => Ok(SitemapContent::Entries(entries)),
        None => Err(Error::Parse(
            "document has no <urlset> or <sitemapindex> root".to_string(),
        )),
    }
}

fn apply_field(entry: &mut SitemapEntry, field: Field, value: &str) {
    match field {
        Field::Loc => entry.url = value.to_string(),
        Field::Lastmod => entry.lastmod = parse_timestamp(value),
    }
}

/// Fetch and parse a sitemap, following sitemap indexes recursively.
///
/// Child sitemaps whose location mentions `post` or `blog` are fetched first;
/// a failing child is skipped with a warning.
///
/// # Errors
///
/// Returns an error if the top-level request fails, returns a non-2xx status,
/// or does not parse as a sitemap.
#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_sitemap(client: &Client, url: &str) -> Result<Vec<SitemapEntry>> {
    fetch_recursive(client, url.to_string(), 0).await
}

fn fetch_recursive(
    client: &Client,
    url: String,
    depth: u8,
) -> BoxFuture<'_, Result<Vec<SitemapEntry>>> {
    Box::pin(async move {
        if depth > MAX_INDEX_DEPTH {
            return Err(Error::Parse(format!(
                "Sitemap index recursion depth exceeded (max: {MAX_INDEX_DEPTH})"
            )));
        }

        tracing::debug!(url = %url, depth, "Fetching sitemap");
        let xml = http::get_text(client, &url).await?;

        match parse_sitemap_content(&xml)? {
            SitemapContent::Entries(entries) => Ok(entries),
            SitemapContent::Index(mut children) => {
                children.sort_by_key(|child| !is_post_sitemap(&child.url));
                children.truncate(MAX_CHILD_SITEMAPS);

                tracing::debug!(child_count = children.len(), "Fetching child sitemaps");

                let results: Vec<(String, Result<Vec<SitemapEntry>>)> = stream::iter(children)
                    .map(|child| async move {
                        let result = fetch_recursive(client, child.url.clone(), depth + 1).await;
                        (child.url, result)
                    })
                    .buffered(CHILD_CONCURRENCY)
                    .collect()
                    .await;

                let mut all_entries = Vec::new();
                for (child_url, result) in results {
                    match result {
                        Ok(entries) => all_entries.extend(entries),
                        Err(e) => {
                            tracing::warn!(url = %child_url, error = %e, "Failed to fetch child sitemap");
                        },
                    }
                }
                Ok(all_entries)
            },
        }
    })
}

fn is_post_sitemap(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("post") || lower.contains("blog")
}

/// Turn sitemap entries into discovered posts.
///
/// Keeps post candidates under blog-like paths; the date comes from
/// `lastmod`, else from the URL pattern.
#[must_use]
pub fn entries_to_posts(entries: Vec<SitemapEntry>, max_posts: usize) -> Vec<DiscoveredUrl> {
    let posts = entries
        .into_iter()
        .filter_map(|entry| {
            let url = Url::parse(&entry.url).ok()?;
            if !is_post_candidate(&url) {
                return None;
            }
            let href = url.as_str();
            let date = entry
                .lastmod
                .map(|lastmod| lastmod.date_naive())
                .or_else(|| date_from_url(href));
            Some(DiscoveredUrl::new(href, title_from_url(href)).with_published_date(date))
        })
        .collect();

    let mut posts = dedup_by_url(posts);
    posts.truncate(max_posts);
    posts
}

/// Discovery strategy over the well-known sitemap locations.
///
/// Each candidate, including every child sitemap it leads to, must finish
/// within one candidate deadline.
pub struct SitemapDiscoverer {
    client: Client,
    deadline: Duration,
}

impl SitemapDiscoverer {
    /// Create a discoverer whose candidates time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(http::build_client(timeout)?, timeout))
    }

    /// Create a discoverer around an existing client, bounding each
    /// candidate (index children included) by `deadline`.
    #[must_use]
    pub const fn with_client(client: Client, deadline: Duration) -> Self {
        Self { client, deadline }
    }

    async fn fetch_candidate(&self, url: &Url) -> Result<Vec<SitemapEntry>> {
        tokio::time::timeout(self.deadline, fetch_sitemap(&self.client, url.as_str()))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "sitemap {url} not fetched within {:?}",
                    self.deadline
                ))
            })?
    }
}

#[async_trait]
impl DiscoveryStrategy for SitemapDiscoverer {
    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Sitemap
    }

    #[instrument(skip_all, fields(site = %site))]
    async fn discover(&self, site: &Url, options: &DiscoveryOptions) -> Result<Vec<DiscoveredUrl>> {
        for candidate in SITEMAP_CANDIDATES {
            let sitemap_url = site.join(candidate)?;

            match self.fetch_candidate(&sitemap_url).await {
                Ok(entries) => {
                    let total = entries.len();
                    let posts = entries_to_posts(entries, options.max_posts);
                    if !posts.is_empty() {
                        tracing::debug!(url = %sitemap_url, total, kept = posts.len(), "Sitemap yielded posts");
                        return Ok(posts);
                    }
                    tracing::debug!(url = %sitemap_url, total, "Sitemap had no blog entries");
                },
                Err(e) => {
                    tracing::debug!(url = %sitemap_url, error = %e, "Sitemap candidate failed");
                },
            }
        }

        Ok(Vec::new())
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
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SCENARIO_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://example.com/blog/my-post</loc><lastmod>2024-03-01</lastmod></url>
          <url><loc>https://example.com/about</loc></url>
        </urlset>"#;

    fn client() -> Client {
        http::build_client(Duration::from_secs(2)).unwrap()
    }

    fn options() -> DiscoveryOptions {
        DiscoveryOptions { max_posts: 50 }
    }

    #[test]
    fn test_parses_urlset() {
        let entries = parse_sitemap(SCENARIO_XML).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "https://example.com/blog/my-post");
        assert!(entries[0].lastmod.is_some());
        assert!(entries[1].lastmod.is_none());
    }

    #[test]
    fn test_parses_cdata_and_entities() {
        let xml = r#"<urlset>
            <url><loc><![CDATA[https://example.com/blog/a?x=1&y=2]]></loc></url>
            <url><loc>https://example.com/blog/b?x=1&amp;y=2</loc></url>
        </urlset>"#;
        let entries = parse_sitemap(xml).unwrap();
        assert_eq!(entries[0].url, "https://example.com/blog/a?x=1&y=2");
        assert_eq!(entries[1].url, "https://example.com/blog/b?x=1&y=2");
    }

    #[test]
    fn test_skips_urls_without_loc() {
        let xml = "<urlset><url><lastmod>2024-01-01</lastmod></url><url><loc>https://x.com/blog/a</loc></url></urlset>";
        let entries = parse_sitemap(xml).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_rejects_html_and_malformed_documents() {
        assert!(parse_sitemap("<html><body>Not found</body></html>").is_err());
        assert!(parse_sitemap("<urlset><url><loc>https://x.com</url>").is_err());
    }

    #[test]
    fn test_index_is_not_a_plain_sitemap() {
        let xml = "<sitemapindex><sitemap><loc>https://x.com/post-sitemap.xml</loc></sitemap></sitemapindex>";
        assert!(matches!(parse_sitemap(xml), Err(Error::Parse(_))));
        match parse_sitemap_content(xml).unwrap() {
            SitemapContent::Index(children) => assert_eq!(children.len(), 1),
            SitemapContent::Entries(_) => panic!("expected index"),
        }
    }

    #[test]
    fn test_entries_to_posts_filters_and_dates() {
        let entries = parse_sitemap(SCENARIO_XML).unwrap();
        let posts = entries_to_posts(entries, 50);
        assert_eq!(
            posts,
            vec![
                DiscoveredUrl::new("https://example.com/blog/my-post", "My Post")
                    .with_published_date(NaiveDate::from_ymd_opt(2024, 3, 1))
            ]
        );
    }

    #[test]
    fn test_entries_to_posts_falls_back_to_url_date_and_caps() {
        let entries = vec![
            SitemapEntry {
                url: "https://x.com/news/2023/07/04/holiday-hours/".into(),
                lastmod: None,
            },
            SitemapEntry {
                url: "https://x.com/blog/second".into(),
                lastmod: None,
            },
        ];
        let posts = entries_to_posts(entries, 1);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].published_date, NaiveDate::from_ymd_opt(2023, 7, 4));
        assert_eq!(posts[0].title, "Holiday Hours");
    }

    #[tokio::test]
    async fn test_discover_sitemap_scenario() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SCENARIO_XML))
            .mount(&server)
            .await;

        let site = Url::parse(&format!("{}/blog", server.uri())).unwrap();
        let posts = SitemapDiscoverer::with_client(client(), Duration::from_secs(2))
            .discover(&site, &options())
            .await
            .unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "https://example.com/blog/my-post");
        assert_eq!(posts[0].title, "My Post");
    }

    #[tokio::test]
    async fn test_discover_advances_past_failing_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap_index.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-sitemap.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<urlset><url><loc>https://x.com/pricing</loc></url></urlset>"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap-blog.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SCENARIO_XML))
            .expect(1)
            .mount(&server)
            .await;

        let site = Url::parse(&server.uri()).unwrap();
        let posts = SitemapDiscoverer::with_client(client(), Duration::from_secs(2))
            .discover(&site, &options())
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn test_discover_times_out_slow_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SCENARIO_XML)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap_index.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SCENARIO_XML))
            .mount(&server)
            .await;

        let site = Url::parse(&server.uri()).unwrap();
        let timeout = Duration::from_millis(300);
        let discoverer = SitemapDiscoverer::with_client(http::build_client(timeout).unwrap(), timeout);
        let posts = discoverer.discover(&site, &options()).await.unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn test_deadline_bounds_slow_index_children() {
        let server = MockServer::start().await;
        let children: String = (0..6)
            .map(|i| format!("<sitemap><loc>{}/child-{i}.xml</loc></sitemap>", server.uri()))
            .collect();
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<sitemapindex>{children}</sitemapindex>")),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/child-\d+\.xml$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SCENARIO_XML)
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&server)
            .await;

        // Every single fetch beats the client timeout, but the children
        // together overrun the candidate deadline.
        let site = Url::parse(&server.uri()).unwrap();
        let discoverer = SitemapDiscoverer::with_client(client(), Duration::from_millis(500));
        let started = std::time::Instant::now();
        let posts = discoverer.discover(&site, &options()).await.unwrap();

        assert!(posts.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_candidate_deadline_reports_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SCENARIO_XML)
                    .set_delay(Duration::from_secs(1)),
            )
            .mount(&server)
            .await;

        let discoverer = SitemapDiscoverer::with_client(client(), Duration::from_millis(100));
        let url = Url::parse(&format!("{}/sitemap.xml", server.uri())).unwrap();
        let err = discoverer.fetch_candidate(&url).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_follows_sitemap_index() {
        let server = MockServer::start().await;
        let index = format!(
            r#"<sitemapindex>
                <sitemap><loc>{0}/page-sitemap.xml</loc></sitemap>
                <sitemap><loc>{0}/post-sitemap.xml</loc></sitemap>
                <sitemap><loc>{0}/broken-sitemap.xml</loc></sitemap>
            </sitemapindex>"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/post-sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<urlset><url><loc>https://x.com/blog/first-post</loc></url></urlset>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page-sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<urlset><url><loc>https://x.com/blog/page-post</loc></url></urlset>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken-sitemap.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let entries = fetch_sitemap(&client(), &format!("{}/sitemap.xml", server.uri()))
            .await
            .unwrap();
        let urls: Vec<_> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://x.com/blog/first-post", "https://x.com/blog/page-post"]
        );
    }

    #[tokio::test]
    async fn test_repeated_discovery_is_identical() {
        let server = MockServer::start().await;
        let xml = "<urlset>
            <url><loc>https://x.com/blog/c</loc></url>
            <url><loc>https://x.com/blog/a</loc></url>
            <url><loc>https://x.com/blog/b</loc></url>
            <url><loc>https://x.com/blog/a</loc></url>
        </urlset>";
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xml))
            .mount(&server)
            .await;

        let site = Url::parse(&server.uri()).unwrap();
        let discoverer = SitemapDiscoverer::with_client(client(), Duration::from_secs(2));
        let first = discoverer.discover(&site, &options()).await.unwrap();
        let second = discoverer.discover(&site, &options()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].url, "https://x.com/blog/c");
    }
}
