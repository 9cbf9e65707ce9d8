//! Configuration module for Autoindex-Mirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key is optional; command-line flags are layered on top before the
//! final validation pass.
//!
//! # Example
//!
//! ```no_run
//! use autoindex_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Max concurrent fetches: {}", config.mirror.max_concurrent_fetches);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ListingTimezone, MirrorConfig, ReconcileConfig, RemoteConfig, RetryConfig, ScanConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, finalize_config, load_config, load_config_with_hash, parse_config,
};
