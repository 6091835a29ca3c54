//! RSS 2.0 / Atom feed discovery: the second stage of the cascade.
//!
//! Feeds list posts directly, so unlike sitemaps no path filtering is
//! applied. Each `<item>` or `<entry>` yields one post:
//!
//! - **link**: `<link>` text, else the `href` attribute of an alternate
//!   `<link>`, else `<id>` when it is an http(s) URL
//! - **date**: `pubDate`, `published`, `updated`, `dc:date`, else the URL pattern
//! - **title**: `<title>`, else derived from the slug
//!
//! ```rust
//! use blogmap_core::discovery::feed::parse_feed;
//!
//! let xml = r#"<rss version="2.0"><channel>
//!   <item><title>Hello</title><link>https://example.com/hello</link></item>
//! </channel></rss>"#;
//!
//! let entries = parse_feed(xml)?;
//! assert_eq!(entries[0].link, "https://example.com/hello");
//! # Ok::<(), blogmap_core::Error>(())
//! ```

use crate::discovery::dates::resolve_date;
use crate::discovery::filter::dedup_by_url;
use crate::discovery::normalize::title_from_url;
use crate::discovery::orchestrator::{DiscoveryOptions, DiscoveryStrategy};
use crate::{DiscoveredUrl, DiscoveryMethod, Error, Result, http};
use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::Client;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// Feed file names tried under each prefix.
pub const FEED_PATHS: &[&str] = &["/feed", "/rss", "/rss.xml", "/feed.xml"];

/// Prefix tried after the site root.
const BLOG_PREFIX: &str = "/blog";

/// One entry of a feed, before resolution against the feed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Post link (possibly relative).
    pub link: String,
    /// Entry title, if present and non-empty.
    pub title: Option<String>,
    /// Raw date string by precedence: pubDate, published, updated, dc:date.
    pub published: Option<String>,
}

#[derive(Default)]
struct PendingEntry {
    link_text: Option<String>,
    link_href: Option<String>,
    id: Option<String>,
    title: Option<String>,
    pub_date: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    dc_date: Option<String>,
}

impl PendingEntry {
    fn finish(self) -> Option<FeedEntry> {
        let id = self
            .id
            .filter(|id| id.starts_with("http://") || id.starts_with("https://"));
        let link = self.link_text.or(self.link_href).or(id)?;
        Some(FeedEntry {
            link,
            title: self.title,
            published: self
                .pub_date
                .or(self.published)
                .or(self.updated)
                .or(self.dc_date),
        })
    }

    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Link => &mut self.link_text,
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::PubDate => &mut self.pub_date,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::DcDate => &mut self.dc_date,
        }
    }
}

#[derive(Clone, Copy)]
enum Field {
    Link,
    Id,
    Title,
    PubDate,
    Published,
    Updated,
    DcDate,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"link" => Some(Self::Link),
            b"id" => Some(Self::Id),
            b"title" => Some(Self::Title),
            b"pubDate" => Some(Self::PubDate),
            b"published" => Some(Self::Published),
            b"updated" => Some(Self::Updated),
            b"date" => Some(Self::DcDate),
            _ => None,
        }
    }
}

/// Parse an RSS 2.0, RSS 1.0 (RDF) or Atom document.
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed XML or a document that is not a feed.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut is_feed = false;
    let mut entries = Vec::new();
    let mut current: Option<PendingEntry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"rss" | b"feed" | b"RDF" => is_feed = true,
                    b"item" | b"entry" => current = Some(PendingEntry::default()),
                    other => {
                        if let Some(entry) = current.as_mut() {
                            if other == b"link" {
                                take_alternate_href(&e, entry);
                            }
                            field = Field::from_local_name(other);
                        }
                    },
                }
            },
            Ok(Event::Empty(e)) => {
                if let Some(entry) = current.as_mut() {
                    if e.local_name().as_ref() == b"link" {
                        take_alternate_href(&e, entry);
                    }
                }
            },
            Ok(Event::Text(text)) => {
                if let (Some(field), Some(entry)) = (field, current.as_mut()) {
                    let value = text.unescape().map_err(|e| Error::Parse(e.to_string()))?;
                    set_once(entry.slot(field), &value);
                }
            },
            Ok(Event::CData(data)) => {
                if let (Some(field), Some(entry)) = (field, current.as_mut()) {
                    set_once(entry.slot(field), &String::from_utf8_lossy(&data));
                }
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    if let Some(entry) = current.take().and_then(PendingEntry::finish) {
                        entries.push(entry);
                    }
                    field = None;
                },
                _ => field = None,
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

    if is_feed {
        Ok(entries)
    } else {
        Err(Error::Parse("document is not an RSS or Atom feed".to_string()))
    }
}

fn set_once(slot: &mut Option<String>, value: &str) {
    let value = value.trim();
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

/// Record the `href` of a `<link>` that points at the post itself.
fn take_alternate_href(element: &BytesStart<'_>, entry: &mut PendingEntry) {
    let mut href = None;
    let mut rel = None;
    for attr in element.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"href" => href = attr.unescape_value().ok().map(|v| v.into_owned()),
            b"rel" => rel = attr.unescape_value().ok().map(|v| v.into_owned()),
            _ => {},
        }
    }

    let is_alternate = rel.as_deref().is_none_or(|rel| rel == "alternate");
    if is_alternate {
        if let Some(href) = href {
            set_once(&mut entry.link_href, &href);
        }
    }
}

/// Resolve feed entries into discovered posts.
///
/// Relative links are resolved against `feed_url`; entries whose link cannot
/// be resolved to an http(s) URL are dropped.
#[must_use]
pub fn entries_to_posts(entries: Vec<FeedEntry>, feed_url: &Url, max_posts: usize) -> Vec<DiscoveredUrl> {
    let posts = entries
        .into_iter()
        .filter_map(|entry| {
            let link = feed_url.join(&entry.link).ok()?;
            if !matches!(link.scheme(), "http" | "https") {
                return None;
            }
            let href = link.as_str();
            let title = entry.title.unwrap_or_else(|| title_from_url(href));
            let date = resolve_date(entry.published.as_deref(), href);
            Some(DiscoveredUrl::new(href, title).with_published_date(date))
        })
        .collect();

    let mut posts = dedup_by_url(posts);
    posts.truncate(max_posts);
    posts
}

/// Feed locations tried for a site, in order.
///
/// Root feeds come first, then `/blog` feeds, then feeds under the input
/// URL's own path when it differs from both.
#[must_use]
pub fn feed_candidates(site: &Url) -> Vec<String> {
    let input_prefix = site.path().trim_end_matches('/');
    let mut prefixes = vec!["", BLOG_PREFIX];
    if !input_prefix.is_empty() && !input_prefix.eq_ignore_ascii_case(BLOG_PREFIX) {
        prefixes.push(input_prefix);
    }

    prefixes
        .into_iter()
        .flat_map(|prefix| FEED_PATHS.iter().map(move |path| format!("{prefix}{path}")))
        .collect()
}

/// Discovery strategy over well-known feed locations.
pub struct FeedDiscoverer {
    client: Client,
}

impl FeedDiscoverer {
    /// Create a discoverer whose candidate fetches time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(http::build_client(timeout)?))
    }

    /// Create a discoverer around an existing client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_feed(&self, feed_url: &Url) -> Result<Vec<FeedEntry>> {
        let xml = http::get_text(&self.client, feed_url.as_str()).await?;
        parse_feed(&xml)
    }
}

#[async_trait]
impl DiscoveryStrategy for FeedDiscoverer {
    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Rss
    }

    #[instrument(skip_all, fields(site = %site))]
    async fn discover(&self, site: &Url, options: &DiscoveryOptions) -> Result<Vec<DiscoveredUrl>> {
        for candidate in feed_candidates(site) {
            let feed_url = site.join(&candidate)?;

            match self.fetch_feed(&feed_url).await {
                Ok(entries) => {
                    let posts = entries_to_posts(entries, &feed_url, options.max_posts);
                    if !posts.is_empty() {
                        tracing::debug!(url = %feed_url, count = posts.len(), "Feed yielded posts");
                        return Ok(posts);
                    }
                    tracing::debug!(url = %feed_url, "Feed had no usable entries");
                },
                Err(e) => {
                    tracing::debug!(url = %feed_url, error = %e, "Feed candidate failed");
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
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0"?>
        <rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
          <channel>
            <title>Example Blog</title>
            <link>https://example.com/</link>
            <item>
              <title><![CDATA[Shipping &amp; Scaling]]></title>
              <link>https://example.com/blog/shipping-and-scaling</link>
              <pubDate>Fri, 01 Mar 2024 10:00:00 GMT</pubDate>
            </item>
            <item>
              <title>Dated By Dublin Core</title>
              <link>/blog/dublin-core</link>
              <dc:date>2024-02-10T08:00:00Z</dc:date>
            </item>
            <item>
              <title>No link here</title>
            </item>
          </channel>
        </rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
          <title>Atom Blog</title>
          <link href="https://example.com/" rel="alternate"/>
          <entry>
            <title type="html">Atom Post</title>
            <link rel="self" href="https://example.com/feed/atom-post.xml"/>
            <link rel="alternate" href="https://example.com/blog/atom-post"/>
            <id>urn:uuid:1225c695</id>
            <updated>2024-01-20T12:00:00Z</updated>
            <published>2024-01-15T12:00:00Z</published>
          </entry>
          <entry>
            <id>https://example.com/2023/11/05/id-only-entry/</id>
          </entry>
        </feed>"#;

    fn feed_url() -> Url {
        Url::parse("https://example.com/feed").unwrap()
    }

    #[test]
    fn test_parses_rss_items() {
        let entries = parse_feed(RSS).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title.as_deref(), Some("Shipping &amp; Scaling"));
        assert_eq!(entries[1].link, "/blog/dublin-core");
        assert_eq!(entries[1].published.as_deref(), Some("2024-02-10T08:00:00Z"));
    }

    #[test]
    fn test_parses_atom_entries() {
        let entries = parse_feed(ATOM).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].link, "https://example.com/blog/atom-post");
        assert_eq!(entries[0].published.as_deref(), Some("2024-01-15T12:00:00Z"));
        assert_eq!(entries[1].link, "https://example.com/2023/11/05/id-only-entry/");
        assert_eq!(entries[1].title, None);
    }

    #[test]
    fn test_rejects_non_feeds() {
        assert!(parse_feed("<html><head></head><body>404</body></html>").is_err());
        assert!(parse_feed("<rss><channel><item></channel></rss>").is_err());
    }

    #[test]
    fn test_entries_to_posts_resolves_links_and_dates() {
        let posts = entries_to_posts(parse_feed(RSS).unwrap(), &feed_url(), 10);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].published_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(posts[1].url, "https://example.com/blog/dublin-core");
        assert_eq!(posts[1].published_date, NaiveDate::from_ymd_opt(2024, 2, 10));
    }

    #[test]
    fn test_entries_without_title_or_date_fall_back_to_url() {
        let posts = entries_to_posts(parse_feed(ATOM).unwrap(), &feed_url(), 10);
        assert_eq!(posts[1].title, "Id Only Entry");
        assert_eq!(posts[1].published_date, NaiveDate::from_ymd_opt(2023, 11, 5));
    }

    #[test]
    fn test_feed_candidates_order() {
        let root = feed_candidates(&Url::parse("https://example.com").unwrap());
        assert_eq!(
            root,
            vec![
                "/feed", "/rss", "/rss.xml", "/feed.xml", "/blog/feed", "/blog/rss",
                "/blog/rss.xml", "/blog/feed.xml",
            ]
        );

        let insights = feed_candidates(&Url::parse("https://example.com/insights/").unwrap());
        assert_eq!(insights.len(), 12);
        assert_eq!(insights[8], "/insights/feed");

        let blog = feed_candidates(&Url::parse("https://example.com/blog/").unwrap());
        assert_eq!(blog.len(), 8);
    }

    #[tokio::test]
    async fn test_discover_uses_blog_prefixed_feed() {
        let server = MockServer::start().await;
        for missing in ["/feed", "/rss", "/rss.xml", "/feed.xml"] {
            Mock::given(method("GET"))
                .and(path(missing))
                .respond_with(ResponseTemplate::new(404))
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/blog/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ATOM))
            .mount(&server)
            .await;

        let discoverer = FeedDiscoverer::new(Duration::from_secs(2)).unwrap();
        let site = Url::parse(&format!("{}/blog", server.uri())).unwrap();
        let posts = discoverer
            .discover(&site, &DiscoveryOptions { max_posts: 50 })
            .await
            .unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "Atom Post");
    }

    #[tokio::test]
    async fn test_discover_returns_empty_when_no_feed() {
        let server = MockServer::start().await;
        let discoverer = FeedDiscoverer::new(Duration::from_secs(2)).unwrap();
        let site = Url::parse(&server.uri()).unwrap();
        let posts = discoverer
            .discover(&site, &DiscoveryOptions { max_posts: 50 })
            .await
            .unwrap();
        assert!(posts.is_empty());
    }
}
