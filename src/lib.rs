//! Autoindex-Mirror: a one-way mirror for autoindex-style file trees
//!
//! This crate crawls a remote HTML directory listing, downloads new or changed
//! files into a local media root, and purges local files that disappeared
//! remotely once a full pass has been cross-checked against the published
//! file count.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod sync;
pub mod upstream;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Autoindex-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No mirror endpoint is reachable")]
    NoReachableEndpoint,

    #[error("State persistence and purging require the tree root, got {url}")]
    ScopeMismatch { url: String },

    #[error("Media root is not a usable directory: {}", path.display())]
    MediaRoot { path: PathBuf },

    #[error("Invalid traversal transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::TraversalState,
        to: state::TraversalState,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Path is not valid UTF-8 after decoding: {0}")]
    Encoding(String),
}

/// Result type alias for Autoindex-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use state::TraversalState;
pub use sync::{run_mirror, RunReport};
pub use crate::url::{decode_remote_path, is_hidden_path, local_relative_path};
