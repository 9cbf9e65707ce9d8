//! Upstream collaborators
//!
//! This module handles the two things a mirror pass asks of the remote side
//! besides listings:
//! - choosing a reachable endpoint from the mirror pool
//! - reading the published file count used to gate purging

mod manifest;
mod pool;

pub use manifest::{count_manifest_entries, expected_total, MANIFEST_FILE};
pub use pool::{probe_in_order, select_endpoint};
