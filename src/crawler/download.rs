//! Per-file synchronization
//!
//! For every file row of a listing this module decides whether the local copy
//! is current, downloads it if not, and records the file in the observed
//! snapshot. Downloads are written to a hidden staging file next to the
//! target and renamed into place once complete, so a partially written file
//! never carries the final name. Observed records are buffered and written
//! in batches.

use crate::crawler::fetcher::{FetchFailure, FetchGate, RetryPolicy};
use crate::crawler::parser::FileEntry;
use crate::output::RunStatistics;
use crate::storage::{lock_snapshot, SharedSnapshot, SnapshotRecord, SnapshotStore};
use crate::url::to_local_path;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

#[cfg(unix)]
const FILE_MODE: u32 = 0o666;
#[cfg(unix)]
const DIR_MODE: u32 = 0o777;

const STAGING_SUFFIX: &str = ".part";
/// Hex digits of the name digest kept in a staging file name
const STAGING_DIGEST_LEN: usize = 16;

/// Observed records written per transaction
const OBSERVED_BATCH: usize = 1000;

/// What happened to one file row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A fresh copy was written
    Downloaded { bytes: u64 },

    /// Local copy already matches the listing
    UpToDate,

    /// An existing `.nfo` was left alone
    NfoKept,

    /// Every attempt failed
    Failed(FetchFailure),
}

impl DownloadOutcome {
    /// Returns true if the file belongs in the observed snapshot regardless of disk state
    fn is_present(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Result of comparing a listing row with the local file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    Missing,
    Stale,
    Current,
    NfoKept,
}

impl LocalState {
    pub fn needs_download(self) -> bool {
        matches!(self, Self::Missing | Self::Stale)
    }
}

/// Local file facts used by the download decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFile {
    pub size_bytes: u64,
    /// Modification time (unix seconds, truncated)
    pub modified_at: i64,
}

fn is_nfo(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("nfo"))
        .unwrap_or(false)
}

/// Pure download decision
///
/// A present file is current iff its size equals the listed size and the
/// listed mtime is not newer than the local one.
pub fn compare_local(
    entry: &FileEntry,
    local_path: &Path,
    local: Option<LocalFile>,
    download_nfo: bool,
) -> LocalState {
    let local = match local {
        Some(l) => l,
        None => return LocalState::Missing,
    };

    if is_nfo(local_path) && !download_nfo {
        return LocalState::NfoKept;
    }

    if local.size_bytes == entry.size_bytes && entry.modified_at <= local.modified_at {
        LocalState::Current
    } else {
        LocalState::Stale
    }
}

async fn stat_local(path: &Path) -> Option<LocalFile> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }

    let modified_at = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(i64::MIN);

    Some(LocalFile {
        size_bytes: metadata.len(),
        modified_at,
    })
}

/// Returns true if `local_path` must be (re)downloaded for `entry`
pub async fn need_download(entry: &FileEntry, local_path: &Path, download_nfo: bool) -> bool {
    let state = compare_local(entry, local_path, stat_local(local_path).await, download_nfo);
    tracing::debug!("{}: {:?}", local_path.display(), state);
    state.needs_download()
}

/// Staging file used while `target` is being written
///
/// The name is a digest of the target name, so it fits wherever the target
/// name fits and the same target always reuses the same staging file.
pub fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    target.with_file_name(format!(
        ".{}{}",
        &digest[..STAGING_DIGEST_LEN],
        STAGING_SUFFIX
    ))
}

fn is_staging_name(name: &str) -> bool {
    name.strip_prefix('.')
        .and_then(|rest| rest.strip_suffix(STAGING_SUFFIX))
        .map(|digest| {
            digest.len() == STAGING_DIGEST_LEN && digest.bytes().all(|b| b.is_ascii_hexdigit())
        })
        .unwrap_or(false)
}

/// Removes staging files left under `root` by an interrupted run
///
/// Returns the number of files removed.
pub fn sweep_staging_files(root: &Path) -> usize {
    let mut removed = 0;
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_staging = entry.file_name().to_str().map(is_staging_name).unwrap_or(false);
        if !is_staging {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                tracing::debug!("Removed leftover {}", entry.path().display());
                removed += 1;
            }
            Err(e) => tracing::warn!("Cannot remove {}: {}", entry.path().display(), e),
        }
    }
    removed
}

async fn create_parent_dirs(dir: &Path) -> std::io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    builder.create(dir).await
}

async fn open_permissions(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(FILE_MODE)).await?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Syncs file rows into the media root
pub struct DownloadManager {
    gate: Arc<FetchGate>,
    media_root: PathBuf,
    download_nfo: bool,
    policy: RetryPolicy,
    observed: Option<SharedSnapshot>,
    pending: Mutex<Vec<SnapshotRecord>>,
    stats: Arc<RunStatistics>,
}

impl DownloadManager {
    pub fn new(
        gate: Arc<FetchGate>,
        media_root: PathBuf,
        download_nfo: bool,
        policy: RetryPolicy,
        observed: Option<SharedSnapshot>,
        stats: Arc<RunStatistics>,
    ) -> Self {
        Self {
            gate,
            media_root,
            download_nfo,
            policy,
            observed,
            pending: Mutex::new(Vec::new()),
            stats,
        }
    }

    /// Local destination of a listing row
    pub fn local_path(&self, entry: &FileEntry) -> PathBuf {
        to_local_path(&self.media_root, &entry.relative_path())
    }

    /// Brings one file up to date and records it
    pub async fn sync_entry(&self, entry: &FileEntry) -> DownloadOutcome {
        let local_path = self.local_path(entry);

        let outcome = if need_download(entry, &local_path, self.download_nfo).await {
            self.download(entry, &local_path).await
        } else if is_nfo(&local_path) && !self.download_nfo {
            tracing::debug!("Keeping existing {}", entry.remote_path);
            DownloadOutcome::NfoKept
        } else {
            tracing::debug!("Up to date: {}", entry.remote_path);
            DownloadOutcome::UpToDate
        };

        let keep = outcome.is_present() || stat_local(&local_path).await.is_some();
        if keep && !entry.is_hidden() {
            self.record_observed(entry);
        }

        self.stats.record_outcome(&outcome);
        outcome
    }

    async fn download(&self, entry: &FileEntry, local_path: &Path) -> DownloadOutcome {
        tracing::debug!("Downloading {}", entry.remote_path);

        if let Some(parent) = local_path.parent() {
            if let Err(e) = create_parent_dirs(parent).await {
                tracing::error!("Cannot create {}: {}", parent.display(), e);
                return DownloadOutcome::Failed(FetchFailure::Io(e.to_string()));
            }
        }

        let staging = staging_path(local_path);
        let bytes = match self.gate.download_to(&entry.url, &staging, self.policy).await {
            Ok(bytes) => bytes,
            Err(failure) => {
                let _ = tokio::fs::remove_file(&staging).await;
                tracing::error!(
                    "Failed to download {} after {} attempts: {}",
                    entry.remote_path,
                    self.policy.attempts,
                    failure
                );
                return DownloadOutcome::Failed(failure);
            }
        };

        if bytes != entry.size_bytes {
            tracing::warn!(
                "{}: listed {} bytes, received {}",
                entry.remote_path,
                entry.size_bytes,
                bytes
            );
        }

        if let Err(e) = self.finish(&staging, local_path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            tracing::error!("Failed to store {}: {}", local_path.display(), e);
            return DownloadOutcome::Failed(FetchFailure::Io(e.to_string()));
        }

        tracing::info!("Downloaded: {}", entry.remote_path);
        DownloadOutcome::Downloaded { bytes }
    }

    async fn finish(&self, staging: &Path, target: &Path) -> std::io::Result<()> {
        open_permissions(staging).await?;
        tokio::fs::rename(staging, target).await
    }

    fn record_observed(&self, entry: &FileEntry) {
        if self.observed.is_none() {
            return;
        }

        let batch = match self.pending.lock() {
            Ok(mut pending) => {
                pending.push(entry.to_record());
                if pending.len() < OBSERVED_BATCH {
                    return;
                }
                std::mem::take(&mut *pending)
            }
            Err(_) => {
                tracing::error!("Observed buffer poisoned, dropping {}", entry.remote_path);
                return;
            }
        };
        self.write_observed(&batch);
    }

    /// Writes every buffered observed record
    pub fn flush_observed(&self) {
        let batch = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => {
                tracing::error!("Observed buffer poisoned, nothing flushed");
                return;
            }
        };
        if !batch.is_empty() {
            self.write_observed(&batch);
        }
    }

    fn write_observed(&self, batch: &[SnapshotRecord]) {
        let observed = match &self.observed {
            Some(o) => o,
            None => return,
        };

        match lock_snapshot(observed).and_then(|mut store| store.upsert_many(batch)) {
            Ok(written) => tracing::debug!("Recorded {} observed files", written),
            Err(e) => tracing::error!("Failed to record {} observed files: {}", batch.len(), e),
        }
    }
}
