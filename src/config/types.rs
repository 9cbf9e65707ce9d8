use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Autoindex-Mirror
///
/// Every field has a default so a config file may be partial or absent;
/// command-line flags are applied on top in `main`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mirror: MirrorConfig,
    pub remote: RemoteConfig,
    pub retry: RetryConfig,
    pub scan: ScanConfig,
    pub reconcile: ReconcileConfig,
}

/// Local mirror behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MirrorConfig {
    /// Directory the remote tree is mirrored into
    pub media_root: PathBuf,

    /// Maximum number of in-flight HTTP requests (listings and downloads combined)
    pub max_concurrent_fetches: usize,

    /// Refresh existing `.nfo` files when the remote copy differs
    pub download_nfo: bool,

    /// Record the observed snapshot of this pass to disk
    pub persist_state: bool,

    /// Delete local files that disappeared remotely
    pub purge: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::new(),
            max_concurrent_fetches: 100,
            download_nfo: false,
            persist_state: false,
            purge: true,
        }
    }
}

/// Remote source configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RemoteConfig {
    /// Explicit starting URL; when unset an endpoint is picked from `pool`
    pub start_url: Option<String>,

    /// Candidate mirror roots, probed in random order
    pub pool: Vec<String>,

    /// Top-level category directories (decoded, trailing `/`) crawled in root mode
    pub categories: Vec<String>,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,

    /// Per-request timeout for listing pages, in seconds
    pub listing_timeout_secs: u64,

    /// Timezone the listing timestamps are written in
    pub listing_timezone: ListingTimezone,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            start_url: None,
            pool: vec![
                "https://emby.xiaoya.pro/".to_string(),
                "http://icyou.eu.org/".to_string(),
                "https://lanyuewan.cn/".to_string(),
            ],
            categories: vec![
                "每日更新/".to_string(),
                "电影/2023/".to_string(),
                "纪录片（已刮削）/".to_string(),
                "音乐/".to_string(),
            ],
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36"
                .to_string(),
            accept_invalid_certs: true,
            listing_timeout_secs: 60,
            listing_timezone: ListingTimezone::Local,
        }
    }
}

/// Timezone used to interpret `DD-Mon-YYYY HH:MM` listing timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingTimezone {
    #[default]
    Local,
    Utc,
}

/// Retry policy for remote fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Retries after a failed listing fetch (first try not included)
    pub listing_retries: u32,

    /// Total download attempts per file (first try included)
    pub download_attempts: u32,

    /// Delay between listing attempts, in seconds
    pub listing_delay_secs: u64,

    /// Delay between download attempts, in seconds
    pub download_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            listing_retries: 3,
            download_attempts: 3,
            listing_delay_secs: 10,
            download_delay_secs: 5,
        }
    }
}

/// Local baseline scan configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScanConfig {
    /// Extensions (with leading dot) left out of the bootstrapped baseline
    pub excluded_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            excluded_extensions: vec![".ass".to_string(), ".srt".to_string(), ".ssa".to_string()],
        }
    }
}

/// Reconciliation safety settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReconcileConfig {
    /// Purge is skipped when |observed - expected| reaches this value
    pub gap_threshold: u64,

    /// Promote the observed snapshot even when the purge was skipped
    pub commit_on_skipped_purge: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            gap_threshold: 10,
            commit_on_skipped_purge: true,
        }
    }
}
