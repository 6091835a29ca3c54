#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used)]

use blogmap_core::config::Config;
use blogmap_core::{
    BlogDiscoverer, DiscoveryMethod, DiscoveryOptions, Error, InMemoryAssetIndex, NoDuplicates,
    PreviewPipeline, PreviewRequest,
};
use chrono::NaiveDate;
use std::sync::Arc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_html(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(html),
        )
        .mount(server)
        .await;
}

fn sitemap_for(base: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{base}/</loc></url>
  <url><loc>{base}/blog/first-post</loc><lastmod>2024-03-01</lastmod></url>
  <url><loc>{base}/blog/second-post</loc></url>
  <url><loc>{base}/blog/third-post</loc></url>
  <url><loc>{base}/pricing</loc></url>
</urlset>"#
    )
}

#[tokio::test]
async fn sitemap_preview_end_to_end() {
    let site = MockServer::start().await;
    let base = site.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_for(&base)))
        .expect(1)
        .mount(&site)
        .await;
    mount_html(
        &site,
        "/blog/first-post",
        r#"<head><meta property="og:title" content="First Post, Really"></head>"#,
    )
    .await;
    mount_html(
        &site,
        "/blog/second-post",
        r#"<head><title>Second</title><meta property="article:published_time" content="2024-04-10T12:00:00Z"></head>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/blog/third-post"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&site)
        .await;

    let mut existing = InMemoryAssetIndex::new();
    existing.insert("acct", &format!("{base}/blog/first-post/"), "asset-1");

    let pipeline = PreviewPipeline::from_config(&Config::default(), Arc::new(existing)).unwrap();
    let mut request = PreviewRequest::new(format!("{base}/blog"));
    request.account_id = "acct".to_string();
    request.include_duplicates = true;

    let response = pipeline.run(&request).await.unwrap();

    assert_eq!(response.discovery.method, Some(DiscoveryMethod::Sitemap));
    assert_eq!(response.discovery.credits_used, 0);
    assert!(response.credit_info.is_free);
    assert_eq!(response.total, 3);
    assert_eq!(response.duplicates, 1);
    assert_eq!(response.new, 2);

    let titles: Vec<_> = response.posts.iter().map(|p| p.post.title.as_str()).collect();
    assert_eq!(titles, vec!["Second", "First Post, Really", "Third Post"]);

    let second = &response.posts[0];
    assert_eq!(second.post.published_date, NaiveDate::from_ymd_opt(2024, 4, 10));
    assert_eq!(second.detected_asset_type.as_deref(), Some("Blog Post"));

    let first = &response.posts[1];
    assert!(first.is_duplicate);
    assert_eq!(first.existing_asset_id.as_deref(), Some("asset-1"));
    assert_eq!(first.post.published_date, NaiveDate::from_ymd_opt(2024, 3, 1));

    assert_eq!(response.posts[2].post.published_date, None);
    assert_eq!(response.date_stats.with_date, 2);
    assert_eq!(response.date_stats.without_date, 1);
}

#[tokio::test]
async fn firecrawl_map_is_used_after_free_methods_fail() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/map"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "links": [
                "https://x.com/about",
                "https://x.com/blog/a-long-descriptive-slug-here"
            ]
        })))
        .expect(1)
        .mount(&api)
        .await;

    let mut config = Config::default();
    config.firecrawl.api_key = Some("fc-test".to_string());
    config.firecrawl.api_url = api.uri();

    let discoverer = BlogDiscoverer::from_config(&config).unwrap();
    let result = discoverer
        .discover(&format!("{}/blog", site.uri()), &DiscoveryOptions::default())
        .await
        .unwrap();

    assert_eq!(result.discovery_method, Some(DiscoveryMethod::FirecrawlMap));
    assert_eq!(result.credits_used, 1);
    assert_eq!(result.urls.len(), 1);
    assert_eq!(result.urls[0].url, "https://x.com/blog/a-long-descriptive-slug-here");
}

#[tokio::test]
async fn nothing_found_requires_fallback() {
    let site = MockServer::start().await;

    let discoverer = BlogDiscoverer::from_config(&Config::default()).unwrap();
    let result = discoverer
        .discover(&format!("{}/blog", site.uri()), &DiscoveryOptions::default())
        .await
        .unwrap();

    assert!(result.fallback_required);
    assert!(result.urls.is_empty());
    assert_eq!(result.credits_used, 0);

    let pipeline = PreviewPipeline::from_config(&Config::default(), Arc::new(NoDuplicates)).unwrap();
    let err = pipeline
        .run(&PreviewRequest::new(format!("{}/blog", site.uri())))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DiscoveryFailed(_)));
}

#[tokio::test]
async fn jina_fallback_rescues_preview() {
    let site = MockServer::start().await;
    let reader = MockServer::start().await;
    let base = site.uri();

    Mock::given(method("GET"))
        .and(path_regex(r"^/http"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "# Blog\n\n- [Why we moved to Rust]({base}/blog/why-we-moved-to-rust)\n- [About]({base}/about)\n"
        )))
        .expect(1)
        .mount(&reader)
        .await;

    let mut config = Config::default();
    config.fallback.jina_enabled = true;
    config.fallback.jina_reader_url = reader.uri();
    config.enrichment.enabled = false;

    let pipeline = PreviewPipeline::from_config(&config, Arc::new(NoDuplicates)).unwrap();
    let response = pipeline
        .run(&PreviewRequest::new(format!("{base}/blog")))
        .await
        .unwrap();

    assert_eq!(response.discovery.method, Some(DiscoveryMethod::JinaFallback));
    assert_eq!(response.discovery.credits_used, 0);
    assert_eq!(response.total, 1);
    assert_eq!(response.posts[0].post.title, "Why we moved to Rust");
}

#[tokio::test]
async fn single_post_input_skips_network() {
    let discoverer = BlogDiscoverer::from_config(&Config::default()).unwrap();
    let result = discoverer
        .discover(
            "blog.example.invalid/2024/01/15/why-we-rewrote-the-importer",
            &DiscoveryOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.discovery_method, Some(DiscoveryMethod::SinglePost));
    assert_eq!(result.credits_used, 0);
    assert_eq!(result.urls[0].title, "Why We Rewrote The Importer");
    assert_eq!(
        result.urls[0].published_date,
        NaiveDate::from_ymd_opt(2024, 1, 15)
    );
}
