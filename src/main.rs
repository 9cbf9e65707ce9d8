//! Autoindex-Mirror main entry point
//!
//! This is the command-line interface for mirroring an autoindex tree.

use autoindex_mirror::config::{finalize_config, load_config_with_hash, Config};
use autoindex_mirror::run_mirror;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Autoindex-Mirror: keep a local copy of a remote file listing
///
/// Crawls an nginx-style autoindex tree, downloads new or changed files, and
/// deletes local files that disappeared upstream once a full pass agrees with
/// the published file count.
#[derive(Parser, Debug)]
#[command(name = "autoindex-mirror")]
#[command(version = "1.0.0")]
#[command(about = "Mirror an autoindex file tree onto local storage", long_about = None)]
struct Cli {
    /// Path to store downloaded media files
    #[arg(long, value_name = "FOLDER")]
    media: Option<PathBuf>,

    /// Max concurrent HTTP requests (listings and downloads)
    #[arg(long, value_name = "NUMBER")]
    count: Option<usize>,

    /// Start from this URL instead of picking one from the mirror pool
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Refresh existing .nfo files
    #[arg(long)]
    nfo: bool,

    /// Save the observed snapshot into the media root
    #[arg(long)]
    db: bool,

    /// Do not delete local files that disappeared upstream
    #[arg(long)]
    no_purge: bool,

    /// Optional TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, visible_alias = "debug", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate the configuration and show what would be mirrored
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => Config::default(),
    };

    let config = match finalize_config(apply_overrides(config, &cli)) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        print_plan(&config);
        return Ok(());
    }

    match run_mirror(config).await {
        Ok(report) => {
            tracing::info!("Mirror pass from {} finished", report.start_url);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Mirror pass failed: {}", e);
            Err(e.into())
        }
    }
}

/// Layers command-line flags over the file configuration
fn apply_overrides(mut config: Config, cli: &Cli) -> Config {
    if let Some(media) = &cli.media {
        config.mirror.media_root = media.clone();
    }
    if let Some(count) = cli.count {
        config.mirror.max_concurrent_fetches = count;
    }
    if let Some(url) = &cli.url {
        config.remote.start_url = Some(url.clone());
    }
    if cli.nfo {
        config.mirror.download_nfo = true;
    }
    if cli.db {
        config.mirror.persist_state = true;
    }
    if cli.no_purge {
        config.mirror.purge = false;
    }
    config
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("autoindex_mirror=info,warn"),
            1 => EnvFilter::new("autoindex_mirror=debug,info"),
            _ => EnvFilter::new("autoindex_mirror=trace,debug"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --dry-run: shows the effective configuration
fn print_plan(config: &Config) {
    println!("=== Autoindex-Mirror Dry Run ===\n");

    println!("Mirror:");
    println!("  Media root: {}", config.mirror.media_root.display());
    println!("  Max concurrent fetches: {}", config.mirror.max_concurrent_fetches);
    println!("  Refresh .nfo files: {}", config.mirror.download_nfo);
    println!("  Persist observed snapshot: {}", config.mirror.persist_state);
    println!("  Purge: {}", config.mirror.purge);

    println!("\nRemote:");
    match &config.remote.start_url {
        Some(url) => println!("  Start URL: {}", url),
        None => {
            println!("  Pool ({}):", config.remote.pool.len());
            for member in &config.remote.pool {
                println!("    - {}", member);
            }
        }
    }
    println!("  Categories ({}):", config.remote.categories.len());
    for category in &config.remote.categories {
        println!("    - {}", category);
    }
    println!("  Listing timezone: {:?}", config.remote.listing_timezone);

    println!("\nRetry:");
    println!("  Listing retries: {}", config.retry.listing_retries);
    println!("  Download attempts: {}", config.retry.download_attempts);
    println!("  Listing delay: {}s", config.retry.listing_delay_secs);
    println!("  Download delay: {}s", config.retry.download_delay_secs);

    println!("\nReconcile:");
    println!("  Gap threshold: {}", config.reconcile.gap_threshold);
    println!(
        "  Commit when purge is skipped: {}",
        config.reconcile.commit_on_skipped_purge
    );

    println!("\nConfiguration is valid.");
}
