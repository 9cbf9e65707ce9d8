//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TraversalState`: the lifecycle of one directory visit (fetch, parse,
//!   process files, spawn and join children)

mod traversal;

// Re-export main types
pub use traversal::TraversalState;
