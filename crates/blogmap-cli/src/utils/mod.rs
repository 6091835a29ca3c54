//! Shared CLI helpers.

mod logging;

pub use logging::initialize_logging;

use anyhow::{Context, Result};
use blogmap_core::Config;
use std::path::Path;

/// Load configuration from `path` when given, otherwise from the usual places.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds invalid settings.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().context("Failed to load config"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_explicit_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[enrichment]\nbatch_size = 5").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.enrichment.batch_size, 5);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/blogmap.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load config from"));
    }
}
