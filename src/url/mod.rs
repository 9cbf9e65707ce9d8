//! URL and path handling module for Autoindex-Mirror
//!
//! This module turns remote listing URLs into decoded remote paths and maps
//! those onto safe relative paths under the local media root.

mod local;
mod remote;

// Re-export main functions
pub use local::{local_relative_path, sanitize_relative_path, to_local_path};
pub use remote::{decode_remote_path, is_hidden_path, is_tree_root, join_category, parse_http_url};
