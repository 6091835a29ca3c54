//! # CLI Structure and Argument Parsing
//!
//! `blogmap` finds the individual posts of a blog and previews what an import
//! would bring in.
//!
//! ```bash
//! # Is this URL a post or a listing?
//! blogmap classify example.com/2024/01/15/hello-world
//!
//! # Run the discovery cascade only
//! blogmap discover https://example.com/blog --max-posts 20
//!
//! # Full preview against an account's existing assets
//! blogmap preview example.com/blog --existing assets.json --since 2024-01-01 -f json
//! ```
//!
//! Every command accepts `-f/--format text|json`; piped output defaults to JSON.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::FormatArg;

/// Top-level `blogmap` command.
#[derive(Parser, Clone, Debug)]
#[command(name = "blogmap")]
#[command(version)]
#[command(about = "Discover blog posts and preview imports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to a configuration file
    #[arg(long, global = true, env = "BLOGMAP_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Classify a URL as a single post or a listing page
    Classify {
        /// URL to classify; a missing scheme is treated as https
        url: String,

        #[command(flatten)]
        format: FormatArg,
    },

    /// Discover post URLs with the sitemap, feed and map cascade
    Discover {
        /// Blog URL
        url: String,

        /// Maximum number of posts to return
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
        max_posts: Option<u32>,

        #[command(flatten)]
        format: FormatArg,
    },

    /// Preview an import: discovery, duplicates, enrichment and filtering
    Preview(PreviewArgs),
}

impl Commands {
    /// The format argument of whichever command was chosen.
    #[must_use]
    pub const fn format(&self) -> &FormatArg {
        match self {
            Self::Classify { format, .. } | Self::Discover { format, .. } => format,
            Self::Preview(args) => &args.format,
        }
    }
}

/// Arguments of `blogmap preview`.
#[derive(clap::Args, Clone, Debug)]
pub struct PreviewArgs {
    /// Blog URL
    pub url: String,

    /// Account whose existing assets count as duplicates
    #[arg(long, value_name = "ID")]
    pub account: Option<String>,

    /// JSON file of existing assets: `[{"url": ..., "assetId": ...}]`
    #[arg(long, value_name = "FILE")]
    pub existing: Option<PathBuf>,

    /// Only posts published on or after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", value_parser = parse_day)]
    pub since: Option<NaiveDate>,

    /// Only posts published on or before this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", value_parser = parse_day)]
    pub until: Option<NaiveDate>,

    /// Keep posts that already exist as assets
    #[arg(long)]
    pub include_duplicates: bool,

    /// Keep only posts in these languages (repeatable)
    #[arg(long = "language", value_name = "CODE")]
    pub languages: Vec<String>,

    /// Skip HTML fetching; titles and dates come from discovery only
    #[arg(long)]
    pub no_enrich: bool,

    /// Maximum number of posts to discover
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_posts: Option<u32>,

    #[command(flatten)]
    pub format: FormatArg,
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected a date like 2024-01-31: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_preview_args() {
        let cli = Cli::try_parse_from([
            "blogmap",
            "preview",
            "example.com/blog",
            "--account",
            "acct-1",
            "--since",
            "2024-01-01",
            "--language",
            "en",
            "--language",
            "de",
            "--no-enrich",
            "-f",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Preview(args) => {
                assert_eq!(args.url, "example.com/blog");
                assert_eq!(args.account.as_deref(), Some("acct-1"));
                assert_eq!(args.since, NaiveDate::from_ymd_opt(2024, 1, 1));
                assert_eq!(args.until, None);
                assert_eq!(args.languages, vec!["en", "de"]);
                assert!(args.no_enrich);
                assert_eq!(args.format.format, Some(OutputFormat::Json));
            },
            other => panic!("Expected preview command, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_date_rejected() {
        let result = Cli::try_parse_from(["blogmap", "preview", "x.com", "--since", "01/02/2024"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_max_posts_rejected() {
        let result = Cli::try_parse_from(["blogmap", "discover", "x.com", "--max-posts", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["blogmap", "discover", "x.com", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Discover { .. }));
    }
}
