//! Blog post URL discovery.
//!
//! Discovery turns a user-supplied blog address into a list of post URLs by
//! walking a cascade of strategies ordered by cost:
//!
//! | Stage | Module | Credits |
//! |-------|--------|---------|
//! | Sitemap | [`sitemap`] | 0 |
//! | RSS / Atom feed | [`feed`] | 0 |
//! | Firecrawl map | [`firecrawl`] | 1 per call |
//!
//! Inputs that already point at a single article skip the cascade (see
//! [`normalize::is_single_post_url`]). When every stage fails the result
//! carries `fallback_required = true` instead of an error.

pub mod dates;
pub mod feed;
pub mod filter;
pub mod firecrawl;
pub mod normalize;
pub mod orchestrator;
pub mod sitemap;

pub use feed::FeedDiscoverer;
pub use firecrawl::{FirecrawlMapStrategy, FirecrawlMapper, UrlMapper};
pub use normalize::{is_single_post_url, normalize_url};
pub use orchestrator::{BlogDiscoverer, DiscoveryOptions, DiscoveryStrategy};
pub use sitemap::SitemapDiscoverer;
