//! Crawler module for remote tree traversal and file syncing
//!
//! This module contains the core mirroring logic, including:
//! - HTTP fetching with a shared concurrency budget and retry
//! - Autoindex listing parsing
//! - Per-file download decisions and atomic writes
//! - Recursive traversal coordination

mod coordinator;
mod download;
mod fetcher;
mod parser;

pub use coordinator::Coordinator;
pub use download::{
    compare_local, need_download, staging_path, sweep_staging_files, DownloadManager,
    DownloadOutcome, LocalFile, LocalState,
};
pub use fetcher::{build_http_client, FetchFailure, FetchGate, RetryPolicy};
pub use parser::{parse_listing, parse_row_metadata, FileEntry, ParsedListing, MANIFEST_NAMES};
