//! Storage traits and error types
//!
//! This module defines the trait interface for snapshot backends and
//! associated error types.

use crate::storage::SnapshotRecord;
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Snapshot lock poisoned")]
    LockPoisoned,

    #[error("{} has schema version {found}, newer than this build supports", path.display())]
    UnsupportedSchema { path: PathBuf, found: u32 },

    #[error("Snapshot is still shared and cannot be closed")]
    StillShared,

    #[error("Failed to promote {} to {}: {source}", from.display(), to.display())]
    Promote {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for snapshot backend implementations
///
/// A snapshot is a set of `SnapshotRecord`s keyed by relative path. Writes are
/// idempotent upserts: recording a path again replaces its metadata.
pub trait SnapshotStore {
    /// Inserts or replaces one record
    fn upsert(&mut self, record: &SnapshotRecord) -> StorageResult<()> {
        self.upsert_many(std::slice::from_ref(record)).map(|_| ())
    }

    /// Inserts or replaces many records in a single transaction
    ///
    /// Returns the number of records written.
    fn upsert_many(&mut self, records: &[SnapshotRecord]) -> StorageResult<usize>;

    /// Returns every relative path in the snapshot
    fn paths(&self) -> StorageResult<HashSet<String>>;

    /// Counts the distinct paths in the snapshot
    fn count(&self) -> StorageResult<u64>;
}
