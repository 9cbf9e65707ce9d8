//! Storage module for mirror snapshots
//!
//! This module handles the two snapshot databases kept under the media root:
//! - the *baseline* (`.localfiles.db`): what the local mirror is known to contain
//! - the *observed* snapshot (`.tempfiles.db`): what the current pass has seen
//!
//! At the end of a reconciling run the observed file is renamed over the
//! baseline, which replaces it atomically.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteSnapshot;
pub use traits::{SnapshotStore, StorageError, StorageResult};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// File name of the persistent baseline snapshot
pub const BASELINE_FILE: &str = ".localfiles.db";

/// File name of the per-run observed snapshot
pub const OBSERVED_FILE: &str = ".tempfiles.db";

/// Represents one file in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// Path relative to the media root, `/`-separated, no leading slash
    pub relative_path: String,
    /// Modification time (unix seconds)
    pub modified_at: i64,
    pub size_bytes: u64,
}

/// A snapshot handle shared between concurrent tasks
pub type SharedSnapshot = Arc<Mutex<SqliteSnapshot>>;

/// Wraps a snapshot for sharing between tasks
pub fn share(store: SqliteSnapshot) -> SharedSnapshot {
    Arc::new(Mutex::new(store))
}

/// Locks a shared snapshot
///
/// Guards must be dropped before the next `.await`.
pub fn lock_snapshot(store: &SharedSnapshot) -> StorageResult<MutexGuard<'_, SqliteSnapshot>> {
    store.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Takes a shared snapshot back once every other handle is gone
pub fn unshare(store: SharedSnapshot) -> StorageResult<SqliteSnapshot> {
    Arc::try_unwrap(store)
        .map_err(|_| StorageError::StillShared)?
        .into_inner()
        .map_err(|_| StorageError::LockPoisoned)
}

/// Locations of the two snapshot files for a media root
#[derive(Debug, Clone)]
pub struct SnapshotFiles {
    pub baseline: PathBuf,
    pub observed: PathBuf,
}

impl SnapshotFiles {
    /// Returns the snapshot file locations under `media_root`
    pub fn for_media_root(media_root: &Path) -> Self {
        Self {
            baseline: media_root.join(BASELINE_FILE),
            observed: media_root.join(OBSERVED_FILE),
        }
    }

    /// Returns true if a baseline from an earlier run exists
    pub fn baseline_exists(&self) -> bool {
        self.baseline.is_file()
    }

    /// Opens (or creates) the baseline snapshot
    pub fn open_baseline(&self) -> StorageResult<SqliteSnapshot> {
        SqliteSnapshot::new(&self.baseline)
    }

    /// Creates an empty observed snapshot, discarding any leftover from an aborted run
    pub fn recreate_observed(&self) -> StorageResult<SqliteSnapshot> {
        for leftover in [self.observed.clone(), journal_path(&self.observed)] {
            match std::fs::remove_file(&leftover) {
                Ok(()) => tracing::debug!("Removed stale snapshot file {}", leftover.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        SqliteSnapshot::new(&self.observed)
    }

    /// Closes the observed snapshot and renames it over the baseline
    pub fn promote_observed(&self, observed: SqliteSnapshot) -> StorageResult<()> {
        observed.close()?;
        std::fs::rename(&self.observed, &self.baseline).map_err(|source| {
            StorageError::Promote {
                from: self.observed.clone(),
                to: self.baseline.clone(),
                source,
            }
        })?;
        tracing::info!("Promoted observed snapshot to {}", self.baseline.display());
        Ok(())
    }
}

fn journal_path(db: &Path) -> PathBuf {
    let mut name = db.as_os_str().to_os_string();
    name.push("-journal");
    PathBuf::from(name)
}
