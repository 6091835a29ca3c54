//! Asset type detection.

use crate::enrich::html::extract_metadata;
use async_trait::async_trait;

/// Label for regular blog articles.
pub const BLOG_POST: &str = "Blog Post";

/// Classifies a post into an asset type label.
#[async_trait]
pub trait AssetTypeDetector: Send + Sync {
    /// Classify from the URL alone.
    fn detect_from_url(&self, url: &str) -> Option<String>;

    /// Classify from the fetched page. `None` keeps the URL-based result.
    async fn detect_from_html(&self, url: &str, html: &str) -> Option<String>;
}

/// URL keywords checked against the lower-cased path, first match wins.
const URL_RULES: &[(&str, &str)] = &[
    ("case-stud", "Case Study"),
    ("customer-stor", "Case Study"),
    ("whitepaper", "Whitepaper"),
    ("white-paper", "Whitepaper"),
    ("ebook", "eBook"),
    ("e-book", "eBook"),
    ("webinar", "Webinar"),
    ("podcast", "Podcast"),
    ("press-release", "Press Release"),
    ("/press/", "Press Release"),
    ("/video", "Video"),
];

/// schema.org types mapped to labels.
const SCHEMA_RULES: &[(&str, &str)] = &[
    ("BlogPosting", BLOG_POST),
    ("NewsArticle", "News"),
    ("VideoObject", "Video"),
    ("PodcastEpisode", "Podcast"),
    ("Report", "Whitepaper"),
];

/// Title keywords checked case-insensitively.
const TITLE_RULES: &[(&str, &str)] = &[
    ("case study", "Case Study"),
    ("whitepaper", "Whitepaper"),
    ("white paper", "Whitepaper"),
    ("webinar", "Webinar"),
    ("ebook", "eBook"),
];

/// Keyword and metadata heuristics; no network access.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicDetector;

#[async_trait]
impl AssetTypeDetector for HeuristicDetector {
    fn detect_from_url(&self, url: &str) -> Option<String> {
        let path = url::Url::parse(url)
            .map_or_else(|_| url.to_ascii_lowercase(), |u| u.path().to_ascii_lowercase());

        URL_RULES
            .iter()
            .find(|(keyword, _)| path.contains(keyword))
            .map(|(_, label)| (*label).to_string())
    }

    async fn detect_from_html(&self, _url: &str, html: &str) -> Option<String> {
        let meta = extract_metadata(html);

        let from_schema = meta.schema_types.iter().find_map(|t| {
            SCHEMA_RULES
                .iter()
                .find(|(schema, _)| t == schema)
                .map(|(_, label)| *label)
        });

        let from_title = || {
            let title = meta.title.as_deref()?.to_lowercase();
            TITLE_RULES
                .iter()
                .find(|(keyword, _)| title.contains(keyword))
                .map(|(_, label)| *label)
        };

        let from_og = || match meta.og_type.as_deref()? {
            t if t.starts_with("video") => Some("Video"),
            _ => None,
        };

        from_schema
            .or_else(from_title)
            .or_else(from_og)
            .map(str::to_string)
    }
}

/// Whether a URL points at a PDF document.
#[must_use]
pub fn is_pdf(url: &str) -> bool {
    url::Url::parse(url).map_or_else(
        |_| url.to_ascii_lowercase().ends_with(".pdf"),
        |u| u.path().to_ascii_lowercase().ends_with(".pdf"),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;

    #[test]
    fn test_url_keywords() {
        let d = HeuristicDetector;
        assert_eq!(
            d.detect_from_url("https://x.com/resources/case-studies/acme-doubles-revenue").as_deref(),
            Some("Case Study")
        );
        assert_eq!(
            d.detect_from_url("https://x.com/resources/ebook-guide-to-seo").as_deref(),
            Some("eBook")
        );
        assert_eq!(d.detect_from_url("https://x.com/blog/my-post"), None);
        // Host names are not matched
        assert_eq!(d.detect_from_url("https://webinar.x.com/blog/my-post"), None);
    }

    #[tokio::test]
    async fn test_html_schema_types() {
        let html = r#"<script type="application/ld+json">{"@type": "BlogPosting"}</script>"#;
        assert_eq!(
            HeuristicDetector.detect_from_html("https://x.com/a", html).await.as_deref(),
            Some("Blog Post")
        );
    }

    #[tokio::test]
    async fn test_html_title_and_og_type() {
        let d = HeuristicDetector;
        let html = "<title>Acme: A Case Study in Scaling</title>";
        assert_eq!(d.detect_from_html("u", html).await.as_deref(), Some("Case Study"));

        let html = r#"<meta property="og:type" content="video.other"><title>Demo</title>"#;
        assert_eq!(d.detect_from_html("u", html).await.as_deref(), Some("Video"));

        assert_eq!(d.detect_from_html("u", "<title>Hello</title>").await, None);
    }

    #[test]
    fn test_pdf_detection() {
        assert!(is_pdf("https://x.com/files/Report.PDF"));
        assert!(is_pdf("https://x.com/files/report.pdf?dl=1"));
        assert!(!is_pdf("https://x.com/blog/pdf-tips"));
    }
}
