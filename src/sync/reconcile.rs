//! Reconciliation of the baseline with the observed snapshot
//!
//! After a full pass, anything in the baseline that the pass did not observe
//! has disappeared upstream and is deleted locally. Purging only happens when
//! the observed count is close to the count published upstream; a large gap
//! means the pass saw an incomplete tree (failed listings, a broken mirror)
//! and deleting would destroy good files.

use crate::config::ReconcileConfig;
use crate::storage::{SnapshotFiles, SnapshotStore, SqliteSnapshot, StorageResult};
use crate::url::to_local_path;
use std::path::Path;

/// Absolute difference between observed and expected counts
///
/// A missing expected count yields `None`, an unbounded gap.
pub fn compute_gap(observed: u64, expected: Option<u64>) -> Option<u64> {
    expected.map(|expected| observed.abs_diff(expected))
}

/// Returns true if a gap permits purging
pub fn purge_allowed(gap: Option<u64>, threshold: u64) -> bool {
    matches!(gap, Some(gap) if gap < threshold)
}

/// Paths recorded in `baseline` but not in `observed`, sorted
pub fn stale_paths<B: SnapshotStore, O: SnapshotStore>(
    baseline: &B,
    observed: &O,
) -> StorageResult<Vec<String>> {
    let seen = observed.paths()?;
    let mut stale: Vec<String> = baseline
        .paths()?
        .into_iter()
        .filter(|path| !seen.contains(path))
        .collect();
    stale.sort();
    Ok(stale)
}

/// What reconciliation did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Distinct paths observed this pass
    pub observed: u64,

    /// Count published upstream, if it could be fetched
    pub expected: Option<u64>,

    /// `None` when the expected count was unavailable
    pub gap: Option<u64>,

    pub purge_skipped: bool,

    /// Files deleted
    pub purged: Vec<String>,

    /// Stale paths that were already gone
    pub already_missing: Vec<String>,

    /// Stale paths that could not be deleted
    pub failed: Vec<String>,

    /// True if the observed snapshot replaced the baseline
    pub committed: bool,
}

/// Deletes stale files from the media root
///
/// A file that is already missing is not an error. Other deletion failures
/// are logged and reported; they never abort the purge.
pub async fn purge_files(media_root: &Path, stale: Vec<String>, report: &mut ReconcileReport) {
    for relative in stale {
        let path = to_local_path(media_root, &relative);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("Purged: {}", relative);
                report.purged.push(relative);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Already gone: {}", relative);
                report.already_missing.push(relative);
            }
            Err(e) => {
                tracing::error!("Failed to purge {}: {}", path.display(), e);
                report.failed.push(relative);
            }
        }
    }
}

/// Purges files that disappeared upstream and commits the observed snapshot
///
/// # Arguments
///
/// * `files` - Snapshot file locations
/// * `baseline` - The opened baseline snapshot
/// * `observed` - The observed snapshot of the finished pass
/// * `media_root` - Local mirror root
/// * `expected` - Upstream file count, if available
/// * `options` - Gap threshold and commit policy
pub async fn reconcile(
    files: &SnapshotFiles,
    baseline: SqliteSnapshot,
    observed: SqliteSnapshot,
    media_root: &Path,
    expected: Option<u64>,
    options: &ReconcileConfig,
) -> StorageResult<ReconcileReport> {
    let observed_count = observed.count()?;
    let gap = compute_gap(observed_count, expected);

    let mut report = ReconcileReport {
        observed: observed_count,
        expected,
        gap,
        ..Default::default()
    };

    match expected {
        Some(expected) => tracing::info!(
            "Observed {} files, expected {} (gap {})",
            observed_count,
            expected,
            observed_count.abs_diff(expected)
        ),
        None => tracing::info!("Observed {} files, expected count unknown", observed_count),
    }

    if purge_allowed(gap, options.gap_threshold) {
        if gap.unwrap_or(0) > 0 {
            tracing::warn!("Observed count differs from the expected count, purging anyway");
        }
        let stale = stale_paths(&baseline, &observed)?;
        tracing::info!("{} files disappeared upstream", stale.len());
        purge_files(media_root, stale, &mut report).await;
    } else {
        report.purge_skipped = true;
        tracing::error!(
            "Skipping purge: observed count is not within {} of the expected count",
            options.gap_threshold
        );
    }

    baseline.close()?;

    if report.purge_skipped && !options.commit_on_skipped_purge {
        observed.close()?;
        tracing::warn!(
            "Keeping previous baseline; observed snapshot left in {}",
            files.observed.display()
        );
        return Ok(report);
    }

    if report.purge_skipped {
        tracing::warn!("Committing observed snapshot although purge was skipped");
    }
    files.promote_observed(observed)?;
    report.committed = true;

    Ok(report)
}
