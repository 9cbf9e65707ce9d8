//! Baseline bootstrapping
//!
//! On the first reconciling run there is no baseline yet. Seeding it from the
//! files already under each category directory means files that disappeared
//! upstream before the first run can still be purged.

use crate::storage::{SnapshotRecord, SnapshotStore, StorageResult};
use crate::url::{is_hidden_path, sanitize_relative_path, to_local_path};
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Records written per transaction
const BATCH_SIZE: usize = 1000;

/// What seeding the baseline found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Files recorded in the baseline
    pub recorded: u64,

    /// Files left out (hidden, excluded extension, unreadable)
    pub skipped: u64,
}

fn is_excluded(name: &str, excluded_extensions: &[String]) -> bool {
    let name = name.to_lowercase();
    excluded_extensions
        .iter()
        .any(|ext| name.ends_with(&ext.to_lowercase()))
}

/// Snapshot key for a file under the media root, if it has a usable name
fn relative_key(media_root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(media_root).ok()?;
    let segments = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(sanitize_relative_path(&segments.join("/")))
}

/// Seeds `store` with every regular file under the category directories
///
/// Hidden paths (any segment starting with `.`) and files whose name ends in
/// one of `excluded_extensions` (case-insensitive) are skipped. Missing
/// category directories are not an error.
///
/// # Arguments
///
/// * `store` - The baseline snapshot to seed
/// * `media_root` - Local mirror root
/// * `categories` - Decoded category prefixes (`movies/2023/`)
/// * `excluded_extensions` - Extensions to leave out, with leading dot
pub fn seed_baseline<S: SnapshotStore>(
    store: &mut S,
    media_root: &Path,
    categories: &[String],
    excluded_extensions: &[String],
) -> StorageResult<BootstrapReport> {
    let mut report = BootstrapReport::default();
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    for category in categories {
        let category_root = to_local_path(media_root, category);
        if !category_root.is_dir() {
            tracing::debug!("Category directory {} does not exist yet", category_root.display());
            continue;
        }

        for entry in WalkDir::new(&category_root).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Cannot read entry under {}: {}", category_root.display(), e);
                    report.skipped += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let key = match relative_key(media_root, entry.path()) {
                Some(k) => k,
                None => {
                    tracing::warn!("Skipping non UTF-8 path {}", entry.path().display());
                    report.skipped += 1;
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy();
            if is_hidden_path(&key) || is_excluded(&name, excluded_extensions) {
                report.skipped += 1;
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("Cannot stat {}: {}", entry.path().display(), e);
                    report.skipped += 1;
                    continue;
                }
            };

            let modified_at = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            batch.push(SnapshotRecord {
                relative_path: key,
                modified_at,
                size_bytes: metadata.len(),
            });

            if batch.len() >= BATCH_SIZE {
                report.recorded += store.upsert_many(&batch)? as u64;
                batch.clear();
            }
        }
    }

    if !batch.is_empty() {
        report.recorded += store.upsert_many(&batch)? as u64;
    }

    tracing::info!(
        "Seeded baseline with {} local files ({} skipped)",
        report.recorded,
        report.skipped
    );
    Ok(report)
}
