//! Output module for run reporting
//!
//! This module handles:
//! - Counting what a pass did
//! - Logging the end-of-run summary

pub mod stats;

pub use stats::{log_summary, RunStatistics, RunSummary};
