//! Upstream file manifest
//!
//! Mirrors publish `.scan.list` at their root: one line per file,
//! `YYYY-MM-DD HH:MM /path`. The number of lines under the mirrored
//! categories is the expected file count used to gate purging.

use crate::url::is_hidden_path;
use anyhow::Context;
use regex::Regex;
use reqwest::Client;
use url::Url;

/// Manifest file name relative to the endpoint root
pub const MANIFEST_FILE: &str = ".scan.list";

const LINE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2} /(.*)$";

/// Counts manifest lines that fall under one of `categories`
///
/// Lines with a hidden path segment are not counted, matching what the
/// observed snapshot records.
pub fn count_manifest_entries(body: &str, categories: &[String]) -> anyhow::Result<u64> {
    let pattern = Regex::new(LINE_PATTERN).context("compiling manifest pattern")?;

    let count = body
        .lines()
        .filter_map(|line| pattern.captures(line.trim_end()))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .filter(|path| {
            categories.iter().any(|category| path.starts_with(category.as_str()))
                && !is_hidden_path(path)
        })
        .count();

    Ok(count as u64)
}

async fn fetch_manifest(client: &Client, url: &Url) -> anyhow::Result<String> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("requesting {}", url))?
        .error_for_status()
        .with_context(|| format!("fetching {}", url))?;

    response.text().await.context("reading manifest body")
}

async fn fetch_expected_total(
    client: &Client,
    endpoint: &Url,
    categories: &[String],
) -> anyhow::Result<u64> {
    let url = endpoint.join(MANIFEST_FILE)?;
    let body = fetch_manifest(client, &url).await?;
    count_manifest_entries(&body, categories)
}

/// Fetches the manifest from `endpoint` and counts the expected files
///
/// Returns `None` when the manifest cannot be fetched; the caller treats that
/// as an unbounded gap.
pub async fn expected_total(client: &Client, endpoint: &Url, categories: &[String]) -> Option<u64> {
    match fetch_expected_total(client, endpoint, categories).await {
        Ok(total) => {
            tracing::info!("Upstream manifest lists {} files", total);
            Some(total)
        }
        Err(e) => {
            tracing::warn!("Expected file count unavailable: {:#}", e);
            None
        }
    }
}
