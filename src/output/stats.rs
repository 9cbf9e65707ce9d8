//! Run statistics
//!
//! Counters are updated concurrently by traversal and download tasks and
//! read once at the end of the pass.

use crate::crawler::DownloadOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one pass
#[derive(Debug, Default)]
pub struct RunStatistics {
    directories_visited: AtomicU64,
    listing_failures: AtomicU64,
    files_listed: AtomicU64,
    rows_skipped: AtomicU64,
    downloaded: AtomicU64,
    bytes_downloaded: AtomicU64,
    up_to_date: AtomicU64,
    nfo_kept: AtomicU64,
    download_failures: AtomicU64,
}

impl RunStatistics {
    pub fn record_directory(&self) {
        self.directories_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listing_failure(&self) {
        self.listing_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one parsed listing
    pub fn record_listing(&self, files: usize, skipped: usize) {
        self.files_listed.fetch_add(files as u64, Ordering::Relaxed);
        self.rows_skipped.fetch_add(skipped as u64, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Downloaded { bytes } => {
                self.downloaded.fetch_add(1, Ordering::Relaxed);
                self.bytes_downloaded.fetch_add(*bytes, Ordering::Relaxed);
            }
            DownloadOutcome::UpToDate => {
                self.up_to_date.fetch_add(1, Ordering::Relaxed);
            }
            DownloadOutcome::NfoKept => {
                self.nfo_kept.fetch_add(1, Ordering::Relaxed);
            }
            DownloadOutcome::Failed(_) => {
                self.download_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Takes a point-in-time copy of the counters
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            directories_visited: self.directories_visited.load(Ordering::Relaxed),
            listing_failures: self.listing_failures.load(Ordering::Relaxed),
            files_listed: self.files_listed.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            up_to_date: self.up_to_date.load(Ordering::Relaxed),
            nfo_kept: self.nfo_kept.load(Ordering::Relaxed),
            download_failures: self.download_failures.load(Ordering::Relaxed),
            purged: 0,
            peak_in_flight: 0,
        }
    }
}

/// Final statistics of a pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Directory units run, including degraded ones
    pub directories_visited: u64,

    /// Listings that failed after every retry
    pub listing_failures: u64,

    pub files_listed: u64,
    pub rows_skipped: u64,
    pub downloaded: u64,
    pub bytes_downloaded: u64,
    pub up_to_date: u64,
    pub nfo_kept: u64,
    pub download_failures: u64,

    /// Local files deleted by reconciliation
    pub purged: u64,

    /// Highest number of simultaneous HTTP requests
    pub peak_in_flight: usize,
}

/// Logs the summary of a finished pass
pub fn log_summary(summary: &RunSummary) {
    tracing::info!("=== Run Statistics ===");
    tracing::info!(
        "Directories: {} ({} failed)",
        summary.directories_visited,
        summary.listing_failures
    );
    tracing::info!(
        "Files listed: {} ({} malformed rows skipped)",
        summary.files_listed,
        summary.rows_skipped
    );
    tracing::info!(
        "Downloaded: {} ({} bytes), up to date: {}, nfo kept: {}, failed: {}",
        summary.downloaded,
        summary.bytes_downloaded,
        summary.up_to_date,
        summary.nfo_kept,
        summary.download_failures
    );
    tracing::info!("Purged: {}", summary.purged);
    tracing::info!("Peak concurrent requests: {}", summary.peak_in_flight);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchFailure;

    #[test]
    fn test_outcomes_counted() {
        let stats = RunStatistics::default();
        stats.record_outcome(&DownloadOutcome::Downloaded { bytes: 10 });
        stats.record_outcome(&DownloadOutcome::Downloaded { bytes: 5 });
        stats.record_outcome(&DownloadOutcome::UpToDate);
        stats.record_outcome(&DownloadOutcome::NfoKept);
        stats.record_outcome(&DownloadOutcome::Failed(FetchFailure::Status(404)));

        let summary = stats.summary();
        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.bytes_downloaded, 15);
        assert_eq!(summary.up_to_date, 1);
        assert_eq!(summary.nfo_kept, 1);
        assert_eq!(summary.download_failures, 1);
    }

    #[test]
    fn test_listing_counters() {
        let stats = RunStatistics::default();
        stats.record_directory();
        stats.record_directory();
        stats.record_listing_failure();
        stats.record_listing(7, 2);

        let summary = stats.summary();
        assert_eq!(summary.directories_visited, 2);
        assert_eq!(summary.listing_failures, 1);
        assert_eq!(summary.files_listed, 7);
        assert_eq!(summary.rows_skipped, 2);
    }
}
