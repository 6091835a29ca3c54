//! blogmap - discover the posts of a blog and preview their import

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    blogmap_cli::run().await
}
