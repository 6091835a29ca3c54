//! # blogmap-core
//!
//! Core functionality for blogmap - discovers the individual posts of a blog
//! and prepares them for import.
//!
//! Given a blog address, the crate finds post URLs through an ordered cascade
//! of cheap strategies (sitemap, RSS/Atom feed, then a paid URL-mapping API),
//! marks posts that already exist in an account, detects their language,
//! enriches them from their HTML under a bounded concurrency budget, and
//! returns a filtered, ranked preview.
//!
//! ## Architecture
//!
//! - **Discovery**: URL normalization, single-post detection and the strategy cascade
//! - **Duplicates**: account-scoped lookup of existing assets
//! - **Language**: URL locale markers and an optional language filter
//! - **Enrichment**: batched HTML fetches with a deadline and a circuit breaker
//! - **Filtering**: date ranges, duplicate exclusion and ranking
//! - **Preview**: the pipeline composing all of the above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blogmap_core::{Config, NoDuplicates, PreviewPipeline, PreviewRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> blogmap_core::Result<()> {
//! let config = Config::load()?;
//! let pipeline = PreviewPipeline::from_config(&config, Arc::new(NoDuplicates))?;
//!
//! let response = pipeline.run(&PreviewRequest::new("example.com/blog")).await?;
//! for post in &response.posts {
//!     println!("{} {}", post.post.url, post.post.title);
//! }
//! println!("{}", response.credit_info.message);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Most failures are absorbed by the pipeline. What remains is structured:
//!
//! ```rust
//! use blogmap_core::{Error, discovery::normalize_url};
//!
//! match normalize_url("not a url") {
//!     Ok(url) => println!("Normalized to {url}"),
//!     Err(Error::InvalidUrl(msg)) => eprintln!("Bad input: {msg}"),
//!     Err(e) => eprintln!("Unexpected ({}): {e}", e.category()),
//! }
//! ```

/// Configuration loading and defaults
pub mod config;
/// Blog post URL discovery strategies and orchestration
pub mod discovery;
/// Duplicate checking against existing assets
pub mod duplicates;
/// HTML enrichment with bounded concurrency
pub mod enrich;
/// Error types and result aliases
pub mod error;
/// Last-resort extraction when discovery fails
pub mod fallback;
/// Date range filtering and ranking
pub mod filter;
/// Shared HTTP client construction
pub mod http;
/// URL-based language detection
pub mod language;
/// End-to-end preview pipeline
pub mod preview;
/// Core data types and structures
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use discovery::{BlogDiscoverer, DiscoveryOptions, DiscoveryStrategy};
pub use duplicates::{DuplicateChecker, ExistingAsset, InMemoryAssetIndex, NoDuplicates};
pub use enrich::{AssetTypeDetector, Enricher, HtmlFetcher};
pub use error::{Error, Result};
pub use fallback::LegacyExtractor;
pub use filter::{DateRange, DateStats};
pub use preview::{CreditInfo, PreviewPipeline, PreviewRequest, PreviewResponse};
pub use types::*;
