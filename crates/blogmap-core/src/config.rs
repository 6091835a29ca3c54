//! Configuration management for the discovery pipeline.
//!
//! Configuration is stored in TOML format. Every field has a default, so a
//! missing file (or a file that only sets a few keys) is valid.
//!
//! ## Resolution Order
//!
//! 1. **Explicit path**: `Config::load_from(path)` or the `BLOGMAP_CONFIG` variable
//! 2. **Platform config dir**: `<config_dir>/blogmap/config.toml` (see [`Config::load`])
//! 3. **Environment overrides**: `FIRECRAWL_API_KEY`, `FIRECRAWL_API_URL`
//!
//! ## Example Configuration File
//!
//! ```toml
//! [discovery]
//! candidate_timeout_secs = 10
//! max_posts = 50
//!
//! [enrichment]
//! enabled = true
//! batch_size = 3
//! fetch_timeout_secs = 5
//! breaker_threshold = 3
//! default_asset_type = "Blog Post"
//!
//! [firecrawl]
//! api_url = "https://api.firecrawl.dev/v1"
//!
//! [fallback]
//! jina_enabled = false
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "BLOGMAP_CONFIG";

/// Environment variable carrying the Firecrawl API key.
pub const FIRECRAWL_API_KEY_ENV: &str = "FIRECRAWL_API_KEY";

/// Environment variable overriding the Firecrawl API base URL.
pub const FIRECRAWL_API_URL_ENV: &str = "FIRECRAWL_API_URL";

/// Default Firecrawl API base URL.
pub const DEFAULT_FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// Default Jina reader endpoint.
pub const DEFAULT_JINA_READER_URL: &str = "https://r.jina.ai";

/// Top-level configuration for blogmap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sitemap/feed discovery settings
    pub discovery: DiscoveryConfig,
    /// HTML enrichment settings
    pub enrichment: EnrichmentConfig,
    /// Paid URL-mapping API settings
    pub firecrawl: FirecrawlConfig,
    /// Last-resort extraction settings
    pub fallback: FallbackConfig,
}

/// Settings for the free discovery stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Per-candidate fetch timeout, in seconds.
    pub candidate_timeout_secs: u64,
    /// Maximum number of URLs any stage returns.
    pub max_posts: usize,
}

/// Settings for the bounded-concurrency enricher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Whether HTML fetches are attempted at all.
    pub enabled: bool,
    /// Number of HTML fetches in flight per batch.
    pub batch_size: usize,
    /// Deadline for a single HTML fetch, in seconds.
    pub fetch_timeout_secs: u64,
    /// Failed attempts (with zero successes) before HTML fetching stops.
    pub breaker_threshold: usize,
    /// Asset type assigned to same-domain HTML pages nothing else classified.
    ///
    /// Set to an empty string in TOML to disable the default.
    pub default_asset_type: Option<String>,
}

/// Settings for the Firecrawl map API.
///
/// The stage is unavailable unless `api_key` is set here or in the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirecrawlConfig {
    /// Bearer token for the API.
    pub api_key: Option<String>,
    /// API base URL (without the `/map` suffix).
    pub api_url: String,
    /// Request timeout, in seconds.
    pub timeout_secs: u64,
}

/// Settings for the last-resort extractor used when discovery needs a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Whether the Jina reader extractor is used.
    pub jina_enabled: bool,
    /// Reader endpoint; the site URL is appended as a path.
    pub jina_reader_url: String,
    /// Request timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            candidate_timeout_secs: 10,
            max_posts: 50,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 3,
            fetch_timeout_secs: 5,
            breaker_threshold: 3,
            default_asset_type: Some("Blog Post".to_string()),
        }
    }
}

impl Default for FirecrawlConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_FIRECRAWL_API_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            jina_enabled: false,
            jina_reader_url: DEFAULT_JINA_READER_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl DiscoveryConfig {
    /// Per-candidate timeout as a [`Duration`].
    #[must_use]
    pub const fn candidate_timeout(&self) -> Duration {
        Duration::from_secs(self.candidate_timeout_secs)
    }
}

impl EnrichmentConfig {
    /// HTML fetch deadline as a [`Duration`].
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// The default asset type, treating an empty label as disabled.
    #[must_use]
    pub fn default_asset_type(&self) -> Option<&str> {
        self.default_asset_type
            .as_deref()
            .filter(|label| !label.trim().is_empty())
    }
}

impl Config {
    /// Load configuration from `BLOGMAP_CONFIG` or the platform config directory.
    ///
    /// Returns defaults (plus environment overrides) when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use blogmap_core::Config;
    ///
    /// let config = Config::load()?;
    /// println!("Batch size: {}", config.enrichment.batch_size);
    /// # Ok::<(), blogmap_core::Error>(())
    /// ```
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(Self::default_path);

        let mut config = match path {
            Some(path) if path.exists() => Self::read(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file, applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a value is out of range.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse config {}: {e}", path.display()))
        })
    }

    /// Path of the platform config file, if a config directory can be determined.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "outfitter", "blogmap")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply `FIRECRAWL_API_KEY` and `FIRECRAWL_API_URL` from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(FIRECRAWL_API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.firecrawl.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var(FIRECRAWL_API_URL_ENV) {
            if !url.trim().is_empty() {
                self.firecrawl.api_url = url;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.enrichment.batch_size == 0 {
            return Err(Error::Config(
                "enrichment.batch_size must be at least 1".into(),
            ));
        }
        if self.discovery.max_posts == 0 {
            return Err(Error::Config("discovery.max_posts must be at least 1".into()));
        }
        if self.discovery.candidate_timeout_secs == 0 || self.enrichment.fetch_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be at least 1 second".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = Config::default();
        assert_eq!(config.discovery.candidate_timeout(), Duration::from_secs(10));
        assert_eq!(config.enrichment.batch_size, 3);
        assert_eq!(config.enrichment.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(config.enrichment.breaker_threshold, 3);
        assert_eq!(config.enrichment.default_asset_type(), Some("Blog Post"));
        assert!(config.firecrawl.api_key.is_none());
        assert!(!config.fallback.jina_enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [enrichment]
            batch_size = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.enrichment.batch_size, 5);
        assert_eq!(config.enrichment.fetch_timeout_secs, 5);
        assert_eq!(config.discovery.max_posts, 50);
    }

    #[test]
    fn test_empty_default_asset_type_disables_policy() {
        let config = Config::from_toml(
            r#"
            [enrichment]
            default_asset_type = ""
            "#,
        )
        .unwrap();
        assert_eq!(config.enrichment.default_asset_type(), None);
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let err = Config::from_toml("[enrichment]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = Config::from_toml("[discovery\nmax_posts = ").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[discovery]\nmax_posts = 12\n\n[firecrawl]\napi_url = \"http://localhost:9999/v1\""
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.discovery.max_posts, 12);
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
