//! blogmap CLI - blog post discovery and import previews
//!
//! This is the main entry point for the blogmap command-line interface.
//! Each command lives in its own module under `commands`.
use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod output;
mod utils;

use crate::utils::{initialize_logging, load_config};
use cli::{Cli, Commands};

/// Execute the blogmap CLI with the current arguments and environment.
///
/// # Errors
///
/// Returns an error if logging setup, configuration loading, or the command fails.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli)?;

    let format = cli.command.format().resolve();
    match cli.command {
        Commands::Classify { url, .. } => commands::classify(&url, format)?,
        Commands::Discover { url, max_posts, .. } => {
            let config = load_config(cli.config.as_deref())?;
            commands::discover(&config, &url, max_posts, format).await?;
        },
        Commands::Preview(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::preview(config, args, format).await?;
        },
    }
    Ok(())
}
