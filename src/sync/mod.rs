//! Mirror pass orchestration
//!
//! This module ties one complete pass together:
//! - choosing the start URL
//! - preparing the baseline and observed snapshots
//! - crawling the remote tree
//! - reconciling and committing the result

mod bootstrap;
mod reconcile;

pub use bootstrap::{seed_baseline, BootstrapReport};
pub use reconcile::{
    compute_gap, purge_allowed, purge_files, reconcile, stale_paths, ReconcileReport,
};

use crate::config::Config;
use crate::crawler::{build_http_client, sweep_staging_files, Coordinator, FetchGate};
use crate::output::{log_summary, RunStatistics, RunSummary};
use crate::storage::{share, unshare, SnapshotFiles};
use crate::upstream::{expected_total, select_endpoint};
use crate::url::{is_tree_root, parse_http_url};
use crate::{MirrorError, Result};
use std::sync::Arc;
use url::Url;

/// Everything a finished pass reports
#[derive(Debug, Clone)]
pub struct RunReport {
    /// URL the traversal started from
    pub start_url: Url,

    pub statistics: RunSummary,

    /// Present when the baseline was seeded from disk this run
    pub bootstrap: Option<BootstrapReport>,

    /// Present when the pass reconciled
    pub reconcile: Option<ReconcileReport>,
}

/// Runs one mirror pass
///
/// # Arguments
///
/// * `config` - A finalized configuration
///
/// # Returns
///
/// * `Ok(RunReport)` - The pass finished; individual listing or download
///   failures are reported in the statistics, not as errors
/// * `Err(MirrorError)` - The pass could not start or its snapshots could not
///   be written
pub async fn run_mirror(config: Config) -> Result<RunReport> {
    let media_root = config.mirror.media_root.clone();
    if !media_root.is_dir() {
        return Err(MirrorError::MediaRoot { path: media_root });
    }

    let client = build_http_client(&config.remote)?;

    let start_url = match &config.remote.start_url {
        Some(url) => parse_http_url(url)?,
        None => select_endpoint(&client, &config.remote.pool)
            .await
            .ok_or(MirrorError::NoReachableEndpoint)?,
    };

    let reconciling = config.mirror.purge;
    let persisting = reconciling || config.mirror.persist_state;
    if persisting && !is_tree_root(&start_url) {
        return Err(MirrorError::ScopeMismatch {
            url: start_url.to_string(),
        });
    }

    let files = SnapshotFiles::for_media_root(&media_root);
    let mut bootstrap = None;
    let observed = if persisting {
        if !files.baseline_exists() {
            tracing::info!("No baseline found, scanning {}", media_root.display());
            let mut baseline = files.open_baseline()?;
            bootstrap = Some(seed_baseline(
                &mut baseline,
                &media_root,
                &config.remote.categories,
                &config.scan.excluded_extensions,
            )?);
            baseline.close()?;
        }
        Some(share(files.recreate_observed()?))
    } else {
        None
    };

    let expected = if reconciling {
        expected_total(&client, &start_url, &config.remote.categories).await
    } else {
        None
    };

    let gate = Arc::new(FetchGate::new(client, config.mirror.max_concurrent_fetches));
    let stats = Arc::new(RunStatistics::default());
    let coordinator = Arc::new(Coordinator::new(
        &config,
        Arc::clone(&gate),
        observed.clone(),
        Arc::clone(&stats),
    ));

    coordinator.crawl(start_url.clone()).await?;

    let swept = sweep_staging_files(&media_root);
    if swept > 0 {
        tracing::info!("Removed {} leftover partial downloads", swept);
    }

    let observed = observed.map(unshare).transpose()?;
    let reconcile_report = match observed {
        Some(observed) if reconciling => {
            let baseline = files.open_baseline()?;
            Some(
                reconcile(
                    &files,
                    baseline,
                    observed,
                    &media_root,
                    expected,
                    &config.reconcile,
                )
                .await?,
            )
        }
        Some(observed) => {
            observed.close()?;
            tracing::info!("Observed snapshot saved to {}", files.observed.display());
            None
        }
        None => None,
    };

    let mut statistics = stats.summary();
    statistics.peak_in_flight = gate.peak_in_flight();
    if let Some(report) = &reconcile_report {
        statistics.purged = report.purged.len() as u64;
    }
    log_summary(&statistics);

    Ok(RunReport {
        start_url,
        statistics,
        bootstrap,
        reconcile: reconcile_report,
    })
}
