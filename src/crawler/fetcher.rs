//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made during a pass, including:
//! - Building the HTTP client with the configured user agent
//! - A single concurrency budget shared by listing pages and downloads
//! - Fixed-delay retry of transient failures
//! - Error classification into fail-soft outcomes

use crate::config::{Config, RemoteConfig};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Why a fetch gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Server answered with a non-success status
    Status(u16),

    /// Request timed out
    Timeout,

    /// Connection could not be established
    Connect(String),

    /// Any other transport-level error (reset, bad body, redirect loop...)
    Transport(String),

    /// Writing the response body to disk failed
    Io(String),
}

impl FetchFailure {
    /// Returns true if another attempt might succeed
    ///
    /// Local filesystem errors are not retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Timeout => write!(f, "request timeout"),
            Self::Connect(e) => write!(f, "connection failed: {}", e),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Io(e) => write!(f, "write failed: {}", e),
        }
    }
}

/// Retry behavior for one kind of request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub attempts: u32,

    /// Fixed pause between attempts
    pub delay: Duration,

    /// Per-attempt timeout, if any
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Policy for directory listing pages
    pub fn listing(config: &Config) -> Self {
        Self {
            attempts: config.retry.listing_retries.saturating_add(1),
            delay: Duration::from_secs(config.retry.listing_delay_secs),
            timeout: Some(Duration::from_secs(config.remote.listing_timeout_secs)),
        }
    }

    /// Policy for file downloads (no overall timeout; large files take long)
    pub fn download(config: &Config) -> Self {
        Self {
            attempts: config.retry.download_attempts,
            delay: Duration::from_secs(config.retry.download_delay_secs),
            timeout: None,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use autoindex_mirror::config::RemoteConfig;
/// use autoindex_mirror::crawler::build_http_client;
///
/// let client = build_http_client(&RemoteConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &RemoteConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(Duration::from_secs(10))
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Classifies a reqwest error into a fetch failure
fn classify_error(e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout
    } else if e.is_connect() {
        FetchFailure::Connect(e.to_string())
    } else {
        FetchFailure::Transport(e.to_string())
    }
}

fn io_failure(e: std::io::Error) -> FetchFailure {
    FetchFailure::Io(e.to_string())
}

/// Counts one in-flight request for as long as it lives
struct InFlight<'a> {
    gate: &'a FetchGate,
}

impl<'a> InFlight<'a> {
    fn enter(gate: &'a FetchGate) -> Self {
        let now = gate.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        gate.peak.fetch_max(now, Ordering::SeqCst);
        Self { gate }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounded-concurrency, retrying HTTP GET
///
/// Every remote call of a pass goes through one gate, so listing pages and
/// downloads compete for the same permits. A permit covers one attempt
/// (request and body) and is released while waiting to retry.
pub struct FetchGate {
    client: Client,
    permits: Arc<Semaphore>,
    limit: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FetchGate {
    /// Creates a gate allowing at most `limit` concurrent requests
    pub fn new(client: Client, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            client,
            permits: Arc::new(Semaphore::new(limit)),
            limit,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Configured concurrency limit
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Requests currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous requests seen so far
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, FetchFailure> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchFailure::Transport("fetch gate closed".to_string()))
    }

    /// Runs `attempt` under a permit, retrying retryable failures
    async fn run_with_retry<T, F, Fut>(
        &self,
        url: &Url,
        policy: RetryPolicy,
        mut attempt: F,
    ) -> Result<T, FetchFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchFailure>>,
    {
        let attempts = policy.attempts.max(1);
        let mut last_failure = FetchFailure::Transport("no attempt made".to_string());

        for n in 1..=attempts {
            let result = {
                let _permit = self.acquire().await?;
                let _slot = InFlight::enter(self);
                attempt().await
            };

            match result {
                Ok(value) => return Ok(value),
                Err(failure) if !failure.is_retryable() => return Err(failure),
                Err(failure) => {
                    tracing::warn!("Attempt {}/{} for {} failed: {}", n, attempts, url, failure);
                    last_failure = failure;
                    if n < attempts {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }

        Err(last_failure)
    }

    /// Fetches a page body as text
    pub async fn fetch_text(&self, url: &Url, policy: RetryPolicy) -> Result<String, FetchFailure> {
        let client = &self.client;
        self.run_with_retry(url, policy, move || async move {
            let mut request = client.get(url.clone());
            if let Some(timeout) = policy.timeout {
                request = request.timeout(timeout);
            }

            let response = request.send().await.map_err(classify_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchFailure::Status(status.as_u16()));
            }

            response.text().await.map_err(classify_error)
        })
        .await
    }

    /// Streams a response body into `dest`, truncating it on every attempt
    ///
    /// Only `200 OK` counts as success. Returns the number of bytes written.
    pub async fn download_to(
        &self,
        url: &Url,
        dest: &Path,
        policy: RetryPolicy,
    ) -> Result<u64, FetchFailure> {
        let client = &self.client;
        self.run_with_retry(url, policy, move || async move {
            let mut request = client.get(url.clone());
            if let Some(timeout) = policy.timeout {
                request = request.timeout(timeout);
            }

            let mut response = request.send().await.map_err(classify_error)?;
            let status = response.status();
            if status != StatusCode::OK {
                return Err(FetchFailure::Status(status.as_u16()));
            }

            let mut file = tokio::fs::File::create(dest).await.map_err(io_failure)?;
            let mut written = 0u64;
            while let Some(chunk) = response.chunk().await.map_err(classify_error)? {
                file.write_all(&chunk).await.map_err(io_failure)?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(io_failure)?;

            Ok(written)
        })
        .await
    }
}
