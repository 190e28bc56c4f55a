//! HTTP collaborator that pulls raw availability records.

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use std::future::Future;
use tracing::{debug, info, warn};

use crate::dataset::RawCarpark;
use crate::parser::parse_carparks;

/// Stop paging after this many requests even if the server keeps answering.
pub const MAX_PAGES: usize = 100;

/// GETs `url`, failing on a non-success status with the response body attached.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid URL {url}"))?,
    );

    let resp = client.execute(req).await?;
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if !status.is_success() {
        anyhow::bail!(
            "GET {url} returned {status}: {}",
            String::from_utf8_lossy(&bytes).trim()
        );
    }
    Ok(bytes.to_vec())
}

/// Fetches every page of the OData endpoint at `endpoint`.
pub async fn fetch_carparks<C: HttpClient>(
    client: &C,
    endpoint: &str,
    page_size: usize,
) -> Result<Vec<RawCarpark>> {
    collect_pages(page_size, |skip| async move {
        let url = page_url(endpoint, skip);
        let bytes = fetch_bytes(client, &url).await?;
        parse_carparks(&bytes).with_context(|| format!("failed to parse page at {url}"))
    })
    .await
}

/// Requests pages at offsets 0, `page_size`, `2 * page_size`, ... until one
/// comes back empty.
pub async fn collect_pages<F, Fut>(page_size: usize, mut fetch_page: F) -> Result<Vec<RawCarpark>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<RawCarpark>>>,
{
    anyhow::ensure!(page_size > 0, "page size must be greater than zero");

    let mut records = Vec::new();
    for page in 0..MAX_PAGES {
        let skip = page * page_size;
        let batch = fetch_page(skip).await?;
        debug!(skip, count = batch.len(), "Fetched page");

        if batch.is_empty() {
            info!(pages = page, total = records.len(), "Fetched all carpark pages");
            return Ok(records);
        }
        records.extend(batch);
    }

    warn!(
        max_pages = MAX_PAGES,
        total = records.len(),
        "Page limit reached before an empty page"
    );
    Ok(records)
}

/// `endpoint` with an OData `$skip` offset appended.
pub fn page_url(endpoint: &str, skip: usize) -> String {
    let sep = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{sep}$skip={skip}")
}
