//! Preview command implementation

use anyhow::{Context, Result};
use blogmap_core::preview::DEFAULT_ACCOUNT;
use blogmap_core::{
    Config, DateRange, DuplicateChecker, ExistingAsset, InMemoryAssetIndex, NoDuplicates,
    PreviewPipeline, PreviewRequest, PreviewResponse,
};
use colored::Colorize;
use std::sync::Arc;

use crate::cli::PreviewArgs;
use crate::output::{OutputFormat, print_json};

/// Execute the preview command
pub async fn execute(mut config: Config, args: PreviewArgs, format: OutputFormat) -> Result<()> {
    let account = args.account.unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());
    let date_range = DateRange::new(args.since, args.until).context("Invalid date range")?;

    let duplicates: Arc<dyn DuplicateChecker> = match &args.existing {
        Some(path) => {
            let assets = ExistingAsset::load_all(path)
                .with_context(|| format!("Failed to load existing assets from {}", path.display()))?;
            tracing::debug!(count = assets.len(), account = %account, "Loaded existing assets");
            Arc::new(InMemoryAssetIndex::new().with_assets(&account, assets))
        },
        None => Arc::new(NoDuplicates),
    };

    if args.no_enrich {
        config.enrichment.enabled = false;
    }
    let pipeline =
        PreviewPipeline::from_config(&config, duplicates).context("Failed to set up preview")?;

    let request = PreviewRequest {
        url: args.url,
        account_id: account,
        max_posts: args
            .max_posts
            .map_or(config.discovery.max_posts, |n| n as usize),
        date_range,
        include_duplicates: args.include_duplicates,
        languages: (!args.languages.is_empty()).then_some(args.languages),
    };

    let response = pipeline.run(&request).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Text => print_text(&response),
    }
    Ok(())
}

fn print_text(response: &PreviewResponse) {
    if response.posts.is_empty() {
        println!("{}", "No posts matched the filters.".yellow());
    }

    for entry in &response.posts {
        let date = entry
            .post
            .published_date
            .map_or_else(|| "----------".to_string(), |d| d.to_string());
        let mut line = format!("{} {}", date.bright_black(), entry.post.title.bold());
        if let Some(kind) = &entry.detected_asset_type {
            line.push_str(&format!(" [{kind}]"));
        }
        if let Some(language) = &entry.language {
            line.push_str(&format!(" ({language})"));
        }
        if entry.is_duplicate {
            line.push_str(&format!(" {}", "duplicate".red()));
        }
        println!("{line}");
        println!("           {}", entry.post.url.cyan());
    }

    println!();
    println!(
        "{} posts shown ({} new, {} already imported)",
        response.total, response.new, response.duplicates
    );

    let stats = &response.date_stats;
    match (stats.oldest, stats.newest) {
        (Some(oldest), Some(newest)) => println!(
            "Dates: {oldest} to {newest}; {} dated, {} undated",
            stats.with_date, stats.without_date
        ),
        _ => println!("Dates: none found"),
    }
    if stats.filtered_out > 0 {
        println!("{} posts outside the date range", stats.filtered_out);
    }

    if !response.detected_languages.is_empty() {
        let languages: Vec<String> = response
            .detected_languages
            .iter()
            .map(|(code, count)| format!("{code}: {count}"))
            .collect();
        println!("Languages: {}", languages.join(", "));
    }

    let message = &response.credit_info.message;
    if response.credit_info.is_free {
        println!("{}", message.green());
    } else {
        println!("{}", message.yellow());
    }
}
