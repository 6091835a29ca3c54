//! Classify command implementation

use anyhow::Result;
use blogmap_core::discovery::dates::date_from_url;
use blogmap_core::discovery::normalize::{is_single_post_url, normalize_url, title_from_url};
use blogmap_core::language::detect_language;
use chrono::NaiveDate;
use colored::Colorize;
use serde::Serialize;

use crate::output::{OutputFormat, print_json};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Classification {
    url: String,
    is_single_post: bool,
    title: String,
    published_date: Option<NaiveDate>,
    language: Option<&'static str>,
}

/// Execute the classify command
pub fn execute(input: &str, format: OutputFormat) -> Result<()> {
    let url = normalize_url(input)?;
    let classification = Classification {
        is_single_post: is_single_post_url(&url),
        title: title_from_url(url.as_str()),
        published_date: date_from_url(url.as_str()),
        language: detect_language(&url),
        url: url.into(),
    };

    match format {
        OutputFormat::Json => print_json(&classification)?,
        OutputFormat::Text => {
            let kind = if classification.is_single_post {
                "single post".green()
            } else {
                "listing".yellow()
            };
            println!("{} - {kind}", classification.url.bold());
            println!("  Title: {}", classification.title);
            if let Some(date) = classification.published_date {
                println!("  Date: {date}");
            }
            if let Some(language) = classification.language {
                println!("  Language: {language}");
            }
        },
    }
    Ok(())
}
