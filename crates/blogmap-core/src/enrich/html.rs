//! Article metadata extraction from fetched HTML.

use crate::discovery::dates::parse_date;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:literal) => {
        #[allow(clippy::unwrap_used)] // SAFETY: Pattern is a compile-time constant
        static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

selector!(OG_TITLE, r#"meta[property="og:title"]"#);
selector!(OG_TYPE, r#"meta[property="og:type"]"#);
selector!(TITLE, "title");
selector!(ARTICLE_PUBLISHED, r#"meta[property="article:published_time"]"#);
selector!(ITEMPROP_PUBLISHED, r#"[itemprop="datePublished"]"#);
selector!(JSON_LD, r#"script[type="application/ld+json"]"#);
selector!(TIME_DATETIME, "time[datetime]");

/// Metadata found in an article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlMetadata {
    /// `og:title`, else the `<title>` text.
    pub title: Option<String>,
    /// First parseable publication date.
    pub published: Option<NaiveDate>,
    /// `og:type` value, lower-cased.
    pub og_type: Option<String>,
    /// `@type` values from JSON-LD blocks, in document order.
    pub schema_types: Vec<String>,
}

/// Extract title, publication date and type hints from an HTML document.
///
/// Date sources in priority order: `article:published_time`,
/// `itemprop="datePublished"`, JSON-LD `datePublished`, then the first
/// `<time datetime>` element.
#[must_use]
pub fn extract_metadata(html: &str) -> HtmlMetadata {
    let document = Html::parse_document(html);

    let title = meta_content(&document, &OG_TITLE).or_else(|| {
        document
            .select(&TITLE)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    });

    let json_ld: Vec<Value> = document
        .select(&JSON_LD)
        .filter_map(|el| serde_json::from_str(&el.text().collect::<String>()).ok())
        .collect();

    let published = meta_content(&document, &ARTICLE_PUBLISHED)
        .and_then(|s| parse_date(&s))
        .or_else(|| {
            document
                .select(&ITEMPROP_PUBLISHED)
                .find_map(|el| itemprop_value(el).and_then(|s| parse_date(&s)))
        })
        .or_else(|| json_ld.iter().find_map(json_ld_published))
        .or_else(|| {
            document
                .select(&TIME_DATETIME)
                .find_map(|el| el.value().attr("datetime").and_then(parse_date))
        });

    let mut schema_types = Vec::new();
    for value in &json_ld {
        collect_schema_types(value, &mut schema_types);
    }

    HtmlMetadata {
        title,
        published,
        og_type: meta_content(&document, &OG_TYPE).map(|t| t.to_ascii_lowercase()),
        schema_types,
    }
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|content| !content.is_empty())
}

fn itemprop_value(el: ElementRef<'_>) -> Option<String> {
    let attrs = el.value();
    attrs
        .attr("content")
        .or_else(|| attrs.attr("datetime"))
        .map(str::to_string)
        .or_else(|| Some(el.text().collect::<String>()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn json_ld_published(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Object(map) => map
            .get("datePublished")
            .and_then(Value::as_str)
            .and_then(parse_date)
            .or_else(|| map.get("@graph").and_then(json_ld_published)),
        Value::Array(items) => items.iter().find_map(json_ld_published),
        _ => None,
    }
}

fn collect_schema_types(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            match map.get("@type") {
                Some(Value::String(t)) => out.push(t.clone()),
                Some(Value::Array(types)) => {
                    out.extend(types.iter().filter_map(Value::as_str).map(str::to_string));
                },
                _ => {},
            }
            if let Some(graph) = map.get("@graph") {
                collect_schema_types(graph, out);
            }
        },
        Value::Array(items) => {
            for item in items {
                collect_schema_types(item, out);
            }
        },
        _ => {},
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_open_graph_wins() {
        let html = r#"<html><head>
            <title>Fallback | Acme Blog</title>
            <meta property="og:title" content="  Shipping   Faster  ">
            <meta property="og:type" content="Article">
            <meta property="article:published_time" content="2024-03-01T09:30:00+01:00">
        </head><body><time datetime="2020-01-01">old</time></body></html>"#;

        let meta = extract_metadata(html);
        assert_eq!(meta.title.as_deref(), Some("Shipping Faster"));
        assert_eq!(meta.og_type.as_deref(), Some("article"));
        assert_eq!(meta.published, date(2024, 3, 1));
    }

    #[test]
    fn test_title_tag_and_time_element() {
        let html = "<html><head><title>\n  Hello\n  World </title></head>
            <body><article><time datetime=\"2023-11-05\">Nov 5</time></article></body></html>";
        let meta = extract_metadata(html);
        assert_eq!(meta.title.as_deref(), Some("Hello World"));
        assert_eq!(meta.published, date(2023, 11, 5));
    }

    #[test]
    fn test_itemprop_date() {
        let html = r#"<div><span itemprop="datePublished" content="2022-06-30">June</span></div>"#;
        assert_eq!(extract_metadata(html).published, date(2022, 6, 30));
    }

    #[test]
    fn test_json_ld_date_and_types() {
        let html = r#"<head><script type="application/ld+json">
            {"@context": "https://schema.org", "@graph": [
                {"@type": "WebPage"},
                {"@type": ["BlogPosting", "Article"], "datePublished": "2021-02-03T10:00:00Z"}
            ]}
        </script></head>"#;

        let meta = extract_metadata(html);
        assert_eq!(meta.published, date(2021, 2, 3));
        assert_eq!(meta.schema_types, vec!["WebPage", "BlogPosting", "Article"]);
    }

    #[test]
    fn test_broken_json_ld_is_ignored() {
        let html = r#"<script type="application/ld+json">{ not json</script><title>T</title>"#;
        let meta = extract_metadata(html);
        assert!(meta.schema_types.is_empty());
        assert_eq!(meta.title.as_deref(), Some("T"));
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(extract_metadata(""), HtmlMetadata::default());
    }
}
