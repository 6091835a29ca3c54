//! Discover command implementation

use anyhow::{Context, Result};
use blogmap_core::{BlogDiscoverer, Config, DiscoveryOptions, DiscoveryResult};
use colored::Colorize;

use crate::output::{OutputFormat, print_json};

/// Execute the discover command
pub async fn execute(
    config: &Config,
    url: &str,
    max_posts: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let discoverer =
        BlogDiscoverer::from_config(config).context("Failed to set up discovery")?;
    let options = DiscoveryOptions {
        max_posts: max_posts.map_or(config.discovery.max_posts, |n| n as usize),
    };

    let result = discoverer.discover(url, &options).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print_text(&result),
    }
    Ok(())
}

fn print_text(result: &DiscoveryResult) {
    let Some(method) = result.discovery_method else {
        println!("{}", "No posts found by sitemap, feed or map.".yellow());
        println!("Try `blogmap preview`, which can fall back to the reader extractor.");
        return;
    };

    for post in &result.urls {
        let date = post
            .published_date
            .map_or_else(|| "----------".to_string(), |d| d.to_string());
        println!("{} {}", date.bright_black(), post.title.bold());
        println!("           {}", post.url.cyan());
    }
    println!();
    println!(
        "{} posts via {} ({} credits)",
        result.urls.len(),
        method.to_string().green(),
        result.credits_used
    );
}
