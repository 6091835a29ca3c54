//! Error types and handling for blogmap-core operations.
//!
//! Most failures inside the discovery pipeline are recovered locally: a
//! sitemap candidate that returns 404, a feed that does not parse, or an HTML
//! fetch that times out simply advances the pipeline to its next option. The
//! variants below are what remains visible to callers, plus the internal
//! failures that strategies report to the orchestrator before being logged
//! and swallowed.
//!
//! ## Error Categories
//!
//! - **Input Errors**: a blog URL that cannot be normalized
//! - **Network Errors**: HTTP requests, connectivity issues, timeouts
//! - **Parse Errors**: malformed sitemap, feed, or API payloads
//! - **Configuration Errors**: invalid settings or config files
//! - **Discovery Errors**: every strategy, including the last-resort fallback, came up empty
//!
//! ## Recovery Hints
//!
//! ```rust
//! use blogmap_core::{Error, Result};
//!
//! fn handle(result: Result<()>) {
//!     match result {
//!         Err(e) if e.is_recoverable() => println!("Temporary failure, retrying..."),
//!         Err(e) => println!("Permanent failure ({}): {e}", e.category()),
//!         Ok(()) => println!("Success"),
//!     }
//! }
//! # handle(Ok(()));
//! ```

use thiserror::Error;

/// The main error type for blogmap-core operations.
///
/// All public fallible functions in blogmap-core return `Result<T, Error>`.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed, typically while reading a configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Covers sitemap, feed, HTML, and mapping API requests. Connection and
    /// timeout errors are recoverable; everything else is treated as permanent.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote content could not be parsed.
    ///
    /// ## Common Causes
    ///
    /// - HTML error pages served with a 200 status at a sitemap location
    /// - Truncated or non-UTF-8 feed documents
    /// - Unexpected JSON from the mapping API
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The input URL could not be normalized, even after prepending `https://`.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Operation exceeded its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An optional collaborator is not configured (for example, no API key).
    ///
    /// Strategies report this so the orchestrator can skip them without
    /// treating the absence as a failure.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Every discovery strategy, including the last-resort fallback, failed.
    #[error("Failed to discover blog posts: {0}")]
    DiscoveryFailed(String),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use blogmap_core::Error;
    ///
    /// assert!(Error::Timeout("sitemap".into()).is_recoverable());
    /// assert!(!Error::InvalidUrl("::".into()).is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier for logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Parse(_) => "parse",
            Self::Config(_) => "config",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::Unavailable(_) => "unavailable",
            Self::DiscoveryFailed(_) => "discovery",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unwrap_used,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_display_includes_context() {
        let cases = [
            (Error::Parse("bad xml".into()), "Parse error: bad xml"),
            (Error::InvalidUrl("::".into()), "Invalid URL: ::"),
            (
                Error::DiscoveryFailed("no strategy succeeded".into()),
                "Failed to discover blog posts: no strategy succeeded",
            ),
            (Error::Unavailable("no key".into()), "Unavailable: no key"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_recoverability() {
        assert!(Error::Timeout("html fetch".into()).is_recoverable());
        assert!(Error::Io(io::Error::new(io::ErrorKind::TimedOut, "slow")).is_recoverable());
        assert!(!Error::Io(io::Error::new(io::ErrorKind::NotFound, "gone")).is_recoverable());
        assert!(!Error::Config("bad".into()).is_recoverable());
        assert!(!Error::DiscoveryFailed("empty".into()).is_recoverable());
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::Parse(String::new()).category(), "parse");
        assert_eq!(Error::InvalidUrl(String::new()).category(), "invalid_url");
        assert_eq!(Error::Unavailable(String::new()).category(), "unavailable");
        assert_eq!(Error::DiscoveryFailed(String::new()).category(), "discovery");
    }

    #[test]
    fn test_conversions() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(Error::from(json_err), Error::Serialization(_)));

        let url_err = url::Url::parse("not a url").unwrap_err();
        assert!(matches!(Error::from(url_err), Error::InvalidUrl(_)));
    }
}
