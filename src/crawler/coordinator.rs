//! Crawler coordinator - recursive traversal of the remote tree
//!
//! Every directory URL is one traversal unit:
//! 1. Fetch the listing (through the shared fetch gate)
//! 2. Parse it into file rows and child directories
//! 3. Sync every file row concurrently and wait for all of them
//! 4. Spawn a unit per child directory and wait for all of them
//!
//! A unit only finishes once its whole subtree has finished, so awaiting the
//! root unit awaits the entire pass. A listing that fails after every retry
//! degrades to an empty listing; siblings and ancestors carry on.
//!
//! When the start URL is the tree root, the root page is not fetched: the
//! configured categories are the only children.

use crate::config::{Config, ListingTimezone};
use crate::crawler::download::DownloadManager;
use crate::crawler::fetcher::{FetchGate, RetryPolicy};
use crate::crawler::parser::{parse_listing, FileEntry};
use crate::output::RunStatistics;
use crate::state::TraversalState;
use crate::storage::SharedSnapshot;
use crate::url::{decode_remote_path, is_tree_root, join_category};
use crate::MirrorError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// One directory being processed
struct TraversalUnit {
    url: Url,
    display: String,
    state: TraversalState,
}

impl TraversalUnit {
    fn new(url: Url) -> Self {
        let display = decode_remote_path(&url).unwrap_or_else(|_| url.path().to_string());
        Self {
            url,
            display,
            state: TraversalState::Fetching,
        }
    }

    fn advance(&mut self, next: TraversalState) -> Result<(), MirrorError> {
        if !self.state.can_transition_to(next) {
            return Err(MirrorError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!("{}: {} -> {}", self.display, self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Main traversal coordinator
pub struct Coordinator {
    gate: Arc<FetchGate>,
    downloads: Arc<DownloadManager>,
    categories: Vec<String>,
    listing_policy: RetryPolicy,
    timezone: ListingTimezone,
    stats: Arc<RunStatistics>,
}

impl Coordinator {
    /// Creates a coordinator for one pass
    ///
    /// # Arguments
    ///
    /// * `config` - The finalized configuration
    /// * `gate` - Fetch gate shared by listings and downloads
    /// * `observed` - Observed snapshot to record files into, if persisting
    /// * `stats` - Counters for this pass
    pub fn new(
        config: &Config,
        gate: Arc<FetchGate>,
        observed: Option<SharedSnapshot>,
        stats: Arc<RunStatistics>,
    ) -> Self {
        let downloads = DownloadManager::new(
            Arc::clone(&gate),
            config.mirror.media_root.clone(),
            config.mirror.download_nfo,
            RetryPolicy::download(config),
            observed,
            Arc::clone(&stats),
        );

        Self {
            gate,
            downloads: Arc::new(downloads),
            categories: config.remote.categories.clone(),
            listing_policy: RetryPolicy::listing(config),
            timezone: config.remote.listing_timezone,
            stats,
        }
    }

    /// Traverses the tree below `start` and returns once every unit has finished
    pub async fn crawl(self: Arc<Self>, start: Url) -> Result<(), MirrorError> {
        tracing::info!("Starting crawl at {}", start);
        let started = std::time::Instant::now();

        let result = Arc::clone(&self).visit(start).await;
        self.downloads.flush_observed();
        result?;

        tracing::info!("Crawl completed in {:?}", started.elapsed());
        Ok(())
    }

    fn visit(self: Arc<Self>, url: Url) -> BoxFuture<Result<(), MirrorError>> {
        Box::pin(async move {
            let mut unit = TraversalUnit::new(url);
            self.stats.record_directory();

            let children = if is_tree_root(&unit.url) {
                unit.advance(TraversalState::SpawningChildren)?;
                self.category_urls(&unit.url)
            } else {
                self.list_directory(&mut unit).await?
            };

            let mut tasks = JoinSet::new();
            for child in children {
                tasks.spawn(Arc::clone(&self).visit(child));
            }

            unit.advance(TraversalState::JoiningChildren)?;
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!("Traversal below {} failed: {}", unit.display, e),
                    Err(e) => {
                        tracing::error!("Traversal task below {} panicked: {}", unit.display, e)
                    }
                }
            }

            unit.advance(TraversalState::Done)?;
            tracing::debug!("Finished {}", unit.display);
            Ok(())
        })
    }

    /// Fetches, parses and processes one listing; returns its child directories
    async fn list_directory(&self, unit: &mut TraversalUnit) -> Result<Vec<Url>, MirrorError> {
        let html = match self.gate.fetch_text(&unit.url, self.listing_policy).await {
            Ok(html) => html,
            Err(failure) => {
                tracing::error!(
                    "Failed to fetch {} after {} attempts: {}",
                    unit.display,
                    self.listing_policy.attempts,
                    failure
                );
                self.stats.record_listing_failure();
                unit.advance(TraversalState::SpawningChildren)?;
                return Ok(Vec::new());
            }
        };

        unit.advance(TraversalState::Parsing)?;
        let listing = parse_listing(&html, &unit.url, self.timezone);
        tracing::debug!(
            "{}: {} files, {} directories, {} skipped rows",
            unit.display,
            listing.files.len(),
            listing.dirs.len(),
            listing.skipped
        );
        self.stats.record_listing(listing.files.len(), listing.skipped);

        unit.advance(TraversalState::ProcessingFiles)?;
        self.process_files(listing.files).await;

        unit.advance(TraversalState::SpawningChildren)?;
        Ok(listing.dirs)
    }

    /// Syncs every file row concurrently and waits for all of them
    async fn process_files(&self, files: Vec<FileEntry>) {
        let mut tasks = JoinSet::new();
        for entry in files {
            let downloads = Arc::clone(&self.downloads);
            tasks.spawn(async move { downloads.sync_entry(&entry).await });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Download task panicked: {}", e);
            }
        }
    }

    /// Category directories synthesized in root mode
    fn category_urls(&self, root: &Url) -> Vec<Url> {
        self.categories
            .iter()
            .filter_map(|category| match join_category(root, category) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("Skipping category {}: {}", category, e);
                    None
                }
            })
            .collect()
    }
}
