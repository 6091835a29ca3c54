//! Logging initialization and color control.

use anyhow::Result;
use colored::control as color_control;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::Cli;

/// Install the stderr tracing subscriber for the parsed flags.
///
/// JSON output drops the level to ERROR unless `--verbose` or `--debug`
/// asked for more.
///
/// # Errors
///
/// Returns an error if the global tracing subscriber cannot be set.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let loud = cli.verbose || cli.debug;
    let machine_output = cli.command.format().resolve().is_machine_readable();

    let level = if loud {
        Level::DEBUG
    } else if cli.quiet || machine_output {
        Level::ERROR
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if std::env::var_os("NO_COLOR").is_some() || machine_output {
        color_control::set_override(false);
    }
    Ok(())
}
