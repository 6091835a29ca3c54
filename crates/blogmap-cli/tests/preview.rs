#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{blogmap_cmd, config_file, json_output};
use predicates::prelude::*;
use std::io::Write;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn blog_with_sitemap() -> MockServer {
    let site = MockServer::start().await;
    let base = site.uri();
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{base}/blog/spring-launch-notes</loc><lastmod>2024-04-02</lastmod></url>
  <url><loc>{base}/blog/winter-retrospective</loc><lastmod>2023-12-20</lastmod></url>
  <url><loc>{base}/de/blog/fruehjahrs-neuigkeiten</loc><lastmod>2024-03-15</lastmod></url>
  <url><loc>{base}/blog/undated-thoughts</loc></url>
</urlset>"#
        )))
        .mount(&site)
        .await;
    site
}

fn no_enrich_config() -> tempfile::NamedTempFile {
    config_file("[enrichment]\nenabled = false\n")
}

#[tokio::test(flavor = "multi_thread")]
async fn preview_marks_duplicates_and_ranks() {
    let site = blog_with_sitemap().await;
    let base = site.uri();

    let mut existing = tempfile::NamedTempFile::new().unwrap();
    write!(
        existing,
        r#"[{{"url": "{base}/blog/winter-retrospective/", "assetId": "asset-42"}}]"#
    )
    .unwrap();
    let config = no_enrich_config();

    let json = json_output(
        blogmap_cmd()
            .arg("--config")
            .arg(config.path())
            .args(["preview", &format!("{base}/blog"), "--account", "acct"])
            .arg("--existing")
            .arg(existing.path())
            .arg("--include-duplicates"),
    );

    assert_eq!(json["success"], true);
    assert_eq!(json["total"], 4);
    assert_eq!(json["duplicates"], 1);
    assert_eq!(json["new"], 3);
    assert_eq!(json["discovery"]["method"], "sitemap");
    assert_eq!(json["creditInfo"]["isFree"], true);
    assert_eq!(json["creditInfo"]["message"], "Found via sitemap at no cost");
    assert_eq!(json["detectedLanguages"]["de"], 1);

    let urls: Vec<&str> = json["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["url"].as_str().unwrap())
        .collect();
    assert_eq!(
        urls,
        vec![
            format!("{base}/blog/spring-launch-notes"),
            format!("{base}/de/blog/fruehjahrs-neuigkeiten"),
            format!("{base}/blog/winter-retrospective"),
            format!("{base}/blog/undated-thoughts"),
        ]
    );

    let winter = &json["posts"][2];
    assert_eq!(winter["isDuplicate"], true);
    assert_eq!(winter["existingAssetId"], "asset-42");
}

#[tokio::test(flavor = "multi_thread")]
async fn preview_filters_dates_languages_and_duplicates() {
    let site = blog_with_sitemap().await;
    let base = site.uri();
    let config = no_enrich_config();

    let json = json_output(
        blogmap_cmd()
            .arg("--config")
            .arg(config.path())
            .args([
                "preview",
                &format!("{base}/blog"),
                "--since",
                "2024-01-01",
                "--language",
                "en",
            ]),
    );

    let posts = json["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["url"], format!("{base}/blog/spring-launch-notes"));
    assert_eq!(json["dateStats"]["withoutDate"], 1);
    assert_eq!(json["dateStats"]["filteredOut"], 2);
    assert_eq!(json["detectedLanguages"]["de"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn preview_without_posts_fails() {
    let site = MockServer::start().await;
    let config = no_enrich_config();

    blogmap_cmd()
        .arg("--config")
        .arg(config.path())
        .args(["preview", &format!("{}/blog", site.uri())])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to discover blog posts"));
}

#[test]
fn preview_rejects_inverted_range() {
    blogmap_cmd()
        .args([
            "preview",
            "example.com/blog",
            "--since",
            "2024-02-01",
            "--until",
            "2024-01-01",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date range"));
}

#[test]
fn preview_missing_existing_file_fails() {
    blogmap_cmd()
        .args([
            "preview",
            "example.com/blog",
            "--existing",
            "/nonexistent/assets.json",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load existing assets"));
}

#[test]
fn preview_single_post_text_output() {
    let config = no_enrich_config();
    blogmap_cmd()
        .arg("--config")
        .arg(config.path())
        .args([
            "preview",
            "blog.example.invalid/2024/01/15/why-we-rewrote-the-importer",
            "-f",
            "text",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Why We Rewrote The Importer"))
        .stdout(predicate::str::contains("Found via single-post at no cost"));
}
