//! Duplicate checking against an account's existing assets.
//!
//! The preview pipeline treats the checker's report as authoritative: it
//! filters purely on `is_duplicate` and copies the stats into the response.

use crate::{CheckedUrl, DiscoveredUrl, DuplicateReport, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use url::Url;

/// Decides which discovered URLs already exist as assets in an account.
#[async_trait]
pub trait DuplicateChecker: Send + Sync {
    /// Annotate every URL (input order preserved) and count new vs duplicate.
    async fn check_for_duplicates(
        &self,
        urls: &[DiscoveredUrl],
        account_id: &str,
    ) -> Result<DuplicateReport>;
}

/// Reports every URL as new.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDuplicates;

#[async_trait]
impl DuplicateChecker for NoDuplicates {
    async fn check_for_duplicates(
        &self,
        urls: &[DiscoveredUrl],
        _account_id: &str,
    ) -> Result<DuplicateReport> {
        Ok(DuplicateReport::from_checked(
            urls.iter()
                .map(|post| CheckedUrl {
                    post: post.clone(),
                    is_duplicate: false,
                    existing_asset_id: None,
                })
                .collect(),
        ))
    }
}

/// An asset already stored in an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingAsset {
    /// Source URL of the asset.
    pub url: String,
    /// Asset identifier.
    pub asset_id: String,
}

impl ExistingAsset {
    /// Load a JSON array of `{ "url", "assetId" }` records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load_all(path: &Path) -> Result<Vec<Self>> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Account-scoped index of existing assets, matched by canonical URL.
///
/// Canonical keys ignore scheme, case of the host, a leading `www.`, a
/// trailing slash, the query and the fragment.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAssetIndex {
    accounts: HashMap<String, HashMap<String, String>>,
}

impl InMemoryAssetIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one asset for an account. A later asset with the same
    /// canonical URL replaces the earlier one.
    pub fn insert(&mut self, account_id: &str, url: &str, asset_id: impl Into<String>) {
        self.accounts
            .entry(account_id.to_string())
            .or_default()
            .insert(canonical_key(url), asset_id.into());
    }

    /// Register many assets for an account.
    #[must_use]
    pub fn with_assets(mut self, account_id: &str, assets: impl IntoIterator<Item = ExistingAsset>) -> Self {
        for asset in assets {
            self.insert(account_id, &asset.url, asset.asset_id);
        }
        self
    }

    /// Asset id for `url` in `account_id`, if any.
    #[must_use]
    pub fn lookup(&self, account_id: &str, url: &str) -> Option<&str> {
        self.accounts
            .get(account_id)?
            .get(&canonical_key(url))
            .map(String::as_str)
    }

    /// Number of assets registered for `account_id`.
    #[must_use]
    pub fn len(&self, account_id: &str) -> usize {
        self.accounts.get(account_id).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl DuplicateChecker for InMemoryAssetIndex {
    async fn check_for_duplicates(
        &self,
        urls: &[DiscoveredUrl],
        account_id: &str,
    ) -> Result<DuplicateReport> {
        let report = DuplicateReport::from_checked(
            urls.iter()
                .map(|post| {
                    let existing = self.lookup(account_id, &post.url).map(str::to_string);
                    CheckedUrl {
                        post: post.clone(),
                        is_duplicate: existing.is_some(),
                        existing_asset_id: existing,
                    }
                })
                .collect(),
        );

        tracing::debug!(
            account = account_id,
            new = report.stats.new,
            duplicate = report.stats.duplicate,
            "Checked for duplicates"
        );
        Ok(report)
    }
}

/// Canonical comparison key for a URL.
///
/// Unparseable input is compared verbatim after trimming.
#[must_use]
pub fn canonical_key(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    let path = parsed.path().trim_end_matches('/');

    format!("{host}{port}{path}")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use std::io::Write;

    fn posts(urls: &[&str]) -> Vec<DiscoveredUrl> {
        urls.iter().map(|u| DiscoveredUrl::new(*u, "T")).collect()
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(
            canonical_key("https://WWW.Example.com/blog/post/?utm=x#top"),
            "example.com/blog/post"
        );
        assert_eq!(canonical_key("http://example.com/blog/post"), "example.com/blog/post");
        assert_eq!(canonical_key("http://example.com:8080/a/"), "example.com:8080/a");
        assert_eq!(canonical_key("  not a url "), "not a url");
    }

    #[tokio::test]
    async fn test_no_duplicates_reports_everything_new() {
        let report = NoDuplicates
            .check_for_duplicates(&posts(&["https://x.com/blog/a", "https://x.com/blog/b"]), "acct")
            .await
            .unwrap();
        assert_eq!(report.stats.new, 2);
        assert_eq!(report.stats.duplicate, 0);
        assert!(report.all.iter().all(|c| !c.is_duplicate));
    }

    #[tokio::test]
    async fn test_index_matches_by_account_and_canonical_url() {
        let mut index = InMemoryAssetIndex::new();
        index.insert("acct-1", "https://www.x.com/blog/a/", "asset-a");
        index.insert("acct-2", "https://x.com/blog/b", "asset-b");

        let report = index
            .check_for_duplicates(
                &posts(&["https://x.com/blog/a", "https://x.com/blog/b", "https://x.com/blog/c"]),
                "acct-1",
            )
            .await
            .unwrap();

        assert_eq!(report.stats.duplicate, 1);
        assert_eq!(report.stats.new, 2);
        assert!(report.all[0].is_duplicate);
        assert_eq!(report.all[0].existing_asset_id.as_deref(), Some("asset-a"));
        assert!(!report.all[1].is_duplicate, "other account's asset must not match");
        assert_eq!(report.all[2].post.url, "https://x.com/blog/c");
    }

    #[test]
    fn test_load_existing_assets() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"url": "https://x.com/blog/a", "assetId": "asset-a"}}]"#
        )
        .unwrap();

        let assets = ExistingAsset::load_all(file.path()).unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].asset_id, "asset-a");

        let index = InMemoryAssetIndex::new().with_assets("acct", assets);
        assert_eq!(index.len("acct"), 1);
        assert_eq!(index.lookup("acct", "http://x.com/blog/a?ref=rss"), Some("asset-a"));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(ExistingAsset::load_all(file.path()).is_err());
    }
}
