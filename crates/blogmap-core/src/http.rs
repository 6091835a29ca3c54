//! Shared HTTP client construction.

use crate::{Error, Result};
use reqwest::Client;
use std::time::Duration;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("outfitter-blogmap/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client with the crate user agent and a bounded redirect policy.
///
/// `timeout` applies to the whole request, so a candidate that hangs
/// counts as a failed candidate instead of stalling its stage.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(Error::Network)
}

/// GET `url` and return the body when the response status is 2xx.
pub(crate) async fn get_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(Error::Network)?;
    response.text().await.map_err(Error::Network)
}
