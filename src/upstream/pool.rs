//! Mirror pool selection

use crate::url::parse_http_url;
use rand::seq::SliceRandom;
use reqwest::{Client, StatusCode};
use url::Url;

/// Picks a reachable endpoint from the configured pool
///
/// Members are probed in random order; the first one answering `200 OK` wins.
/// Returns `None` when no member answers.
pub async fn select_endpoint(client: &Client, pool: &[String]) -> Option<Url> {
    let mut candidates: Vec<Url> = pool
        .iter()
        .filter_map(|member| match parse_http_url(member) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Ignoring pool member {}: {}", member, e);
                None
            }
        })
        .collect();
    candidates.shuffle(&mut rand::thread_rng());

    probe_in_order(client, &candidates).await
}

/// Returns the first candidate answering `200 OK`
pub async fn probe_in_order(client: &Client, candidates: &[Url]) -> Option<Url> {
    for candidate in candidates {
        match client.get(candidate.clone()).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                tracing::info!("Picked endpoint: {}", candidate);
                return Some(candidate.clone());
            }
            Ok(response) => {
                tracing::info!("Endpoint {} answered {}", candidate, response.status());
            }
            Err(e) => {
                tracing::info!("Error accessing {}: {}", candidate, e);
            }
        }
    }

    tracing::error!("No endpoint in the pool is reachable");
    None
}
