#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{blogmap_cmd, config_file, json_output};
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test(flavor = "multi_thread")]
async fn discover_reads_sitemap() {
    let site = MockServer::start().await;
    let base = site.uri();
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{base}/blog/my-post</loc><lastmod>2024-03-01</lastmod></url>
  <url><loc>{base}/blog/another-post</loc></url>
  <url><loc>{base}/contact</loc></url>
</urlset>"#
        )))
        .mount(&site)
        .await;

    let json = json_output(
        blogmap_cmd()
            .args(["discover", &format!("{base}/blog"), "-f", "json"]),
    );

    assert_eq!(json["discoveryMethod"], "sitemap");
    assert_eq!(json["creditsUsed"], 0);
    assert_eq!(json["fallbackRequired"], false);
    let urls = json["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0]["url"], format!("{base}/blog/my-post"));
    assert_eq!(urls[0]["title"], "My Post");
    assert_eq!(urls[0]["publishedDate"], "2024-03-01");
}

#[tokio::test(flavor = "multi_thread")]
async fn discover_respects_max_posts() {
    let site = MockServer::start().await;
    let base = site.uri();
    let entries: String = (1..=5)
        .map(|i| format!("<url><loc>{base}/blog/post-number-{i}</loc></url>"))
        .collect();
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#
        )))
        .mount(&site)
        .await;

    let json = json_output(blogmap_cmd().args([
        "discover",
        &format!("{base}/blog"),
        "--max-posts",
        "2",
    ]));

    assert_eq!(json["urls"].as_array().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn discover_uses_firecrawl_when_free_methods_fail() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/map"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "links": ["https://x.com/blog/a-long-descriptive-slug-here"]
        })))
        .expect(1)
        .mount(&api)
        .await;

    let json = json_output(
        blogmap_cmd()
            .env("FIRECRAWL_API_KEY", "fc-test")
            .env("FIRECRAWL_API_URL", api.uri())
            .args(["discover", &format!("{}/blog", site.uri())]),
    );

    assert_eq!(json["discoveryMethod"], "firecrawl-map");
    assert_eq!(json["creditsUsed"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn discover_reports_fallback_required() {
    let site = MockServer::start().await;

    let json = json_output(blogmap_cmd().args(["discover", &format!("{}/blog", site.uri())]));

    assert_eq!(json["fallbackRequired"], true);
    assert_eq!(json["discoveryMethod"], serde_json::Value::Null);
    assert_eq!(json["creditsUsed"], 0);
}

#[test]
fn discover_text_output_for_single_post() {
    blogmap_cmd()
        .args([
            "discover",
            "blog.example.invalid/2024/01/15/why-we-rewrote-the-importer",
            "-f",
            "text",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Why We Rewrote The Importer"))
        .stdout(predicate::str::contains("via single-post"));
}

#[test]
fn invalid_config_fails() {
    let config = config_file("[enrichment]\nbatch_size = 0\n");
    blogmap_cmd()
        .arg("--config")
        .arg(config.path())
        .args(["discover", "example.com/blog"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("batch_size"));
}

#[test]
fn classify_single_post() {
    let json = json_output(blogmap_cmd().args([
        "classify",
        "example.com/de/2024/01/15/why-we-rewrote-the-importer",
    ]));

    assert_eq!(json["url"], "https://example.com/de/2024/01/15/why-we-rewrote-the-importer");
    assert_eq!(json["isSinglePost"], true);
    assert_eq!(json["title"], "Why We Rewrote The Importer");
    assert_eq!(json["publishedDate"], "2024-01-15");
    assert_eq!(json["language"], "de");
}

#[test]
fn classify_listing_page() {
    let json = json_output(blogmap_cmd().args(["classify", "https://example.com/blog/"]));
    assert_eq!(json["isSinglePost"], false);
}

#[test]
fn classify_rejects_garbage() {
    blogmap_cmd()
        .args(["classify", "not a url at all"])
        .assert()
        .failure();
}
