//! Integration tests for complete mirror passes
//!
//! These tests use wiremock to serve autoindex listings and files and run
//! full passes against a temporary media root.

use autoindex_mirror::config::{Config, ListingTimezone};
use autoindex_mirror::crawler::staging_path;
use autoindex_mirror::storage::{SnapshotFiles, SnapshotStore, SqliteSnapshot};
use autoindex_mirror::{run_mirror, MirrorError};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MUSIC_ENCODED: &str = "/%E9%9F%B3%E4%B9%90/";

/// Creates a test configuration: no purge, no persistence, no retry delays
fn create_test_config(media_root: &Path, start_url: Option<String>) -> Config {
    let mut config = Config::default();
    config.mirror.media_root = media_root.to_path_buf();
    config.mirror.max_concurrent_fetches = 4;
    config.mirror.purge = false;
    config.remote.start_url = start_url;
    config.remote.pool = vec![];
    config.remote.categories = vec!["movies/".to_string()];
    config.remote.listing_timezone = ListingTimezone::Utc;
    config.retry.listing_delay_secs = 0;
    config.retry.download_delay_secs = 0;
    config
}

/// Renders an nginx-style listing; a size of `-` marks a directory
fn listing(title: &str, rows: &[(&str, &str)]) -> String {
    let mut body = format!(
        "<html>\r\n<head><title>Index of {0}</title></head>\r\n<body>\r\n<h1>Index of {0}</h1><hr><pre><a href=\"../\">../</a>\r\n",
        title
    );
    for (href, size) in rows {
        body.push_str(&format!(
            "<a href=\"{0}\">{0}</a>                                   18-Oct-2023 10:12    {1}\r\n",
            href, size
        ));
    }
    body.push_str("</pre><hr></body>\r\n</html>\r\n");
    body
}

async fn mount_listing(server: &MockServer, dir: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(dir))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, file: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(file))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

/// `/movies/` holding `a.mkv` and `sub/b.mkv`
async fn mount_movies_tree(server: &MockServer) {
    mount_listing(
        server,
        "/movies/",
        listing("/movies/", &[("a.mkv", "3"), ("sub/", "-")]),
    )
    .await;
    mount_listing(server, "/movies/sub/", listing("/movies/sub/", &[("b.mkv", "5")])).await;
    mount_file(server, "/movies/a.mkv", b"abc").await;
    mount_file(server, "/movies/sub/b.mkv", b"bbbbb").await;
}

#[tokio::test]
async fn test_nested_crawl_downloads_files() {
    let server = MockServer::start().await;
    mount_movies_tree(&server).await;

    let media = TempDir::new().unwrap();
    let config = create_test_config(media.path(), Some(format!("{}/movies/", server.uri())));

    let report = run_mirror(config).await.unwrap();

    assert_eq!(fs::read(media.path().join("movies/a.mkv")).unwrap(), b"abc");
    assert_eq!(fs::read(media.path().join("movies/sub/b.mkv")).unwrap(), b"bbbbb");
    assert!(!staging_path(&media.path().join("movies/a.mkv")).exists());

    let stats = report.statistics;
    assert_eq!(stats.directories_visited, 2);
    assert_eq!(stats.files_listed, 2);
    assert_eq!(stats.downloaded, 2);
    assert_eq!(stats.bytes_downloaded, 8);
    assert_eq!(stats.download_failures, 0);
    assert!(report.reconcile.is_none());
    assert!(!media.path().join(".tempfiles.db").exists());
}

#[tokio::test]
async fn test_second_pass_downloads_nothing() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        "/movies/",
        listing("/movies/", &[("a.mkv", "3"), ("sub/", "-")]),
    )
    .await;
    mount_listing(&server, "/movies/sub/", listing("/movies/sub/", &[("b.mkv", "5")])).await;
    Mock::given(method("GET"))
        .and(path("/movies/a.mkv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/movies/sub/b.mkv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bbbbb".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let media = TempDir::new().unwrap();
    let start = Some(format!("{}/movies/", server.uri()));

    let first = run_mirror(create_test_config(media.path(), start.clone()))
        .await
        .unwrap();
    assert_eq!(first.statistics.downloaded, 2);

    let second = run_mirror(create_test_config(media.path(), start)).await.unwrap();
    assert_eq!(second.statistics.downloaded, 0);
    assert_eq!(second.statistics.up_to_date, 2);

    server.verify().await;
}

#[tokio::test]
async fn test_failed_listing_degrades_to_empty() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        "/movies/",
        listing("/movies/", &[("broken/", "-"), ("good/", "-")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/movies/broken/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;
    mount_listing(&server, "/movies/good/", listing("/movies/good/", &[("c.mkv", "1")])).await;
    mount_file(&server, "/movies/good/c.mkv", b"c").await;

    let media = TempDir::new().unwrap();
    let config = create_test_config(media.path(), Some(format!("{}/movies/", server.uri())));

    let report = run_mirror(config).await.unwrap();

    assert!(media.path().join("movies/good/c.mkv").exists());
    assert_eq!(report.statistics.directories_visited, 3);
    assert_eq!(report.statistics.listing_failures, 1);
    assert_eq!(report.statistics.downloaded, 1);
    server.verify().await;
}

#[tokio::test]
async fn test_concurrency_budget_respected() {
    let server = MockServer::start().await;
    let names: Vec<String> = (0..8).map(|i| format!("f{}.mkv", i)).collect();
    let rows: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "4")).collect();
    mount_listing(&server, "/movies/", listing("/movies/", &rows)).await;
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/movies/f\d\.mkv$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"data".to_vec())
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;

    let media = TempDir::new().unwrap();
    let mut config = create_test_config(media.path(), Some(format!("{}/movies/", server.uri())));
    config.mirror.max_concurrent_fetches = 2;

    let report = run_mirror(config).await.unwrap();

    assert_eq!(report.statistics.downloaded, 8);
    assert!(report.statistics.peak_in_flight >= 1);
    assert!(report.statistics.peak_in_flight <= 2);
}

#[tokio::test]
async fn test_concurrency_budget_across_sibling_directories() {
    let server = MockServer::start().await;
    let dirs: Vec<String> = (0..6).map(|i| format!("d{}/", i)).collect();
    let dir_rows: Vec<(&str, &str)> = dirs.iter().map(|d| (d.as_str(), "-")).collect();
    mount_listing(&server, "/movies/", listing("/movies/", &dir_rows)).await;

    let files = [("x0.mkv", "4"), ("x1.mkv", "4"), ("x2.mkv", "4")];
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/movies/d\d/$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing("/movies/dN/", &files))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(6)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/movies/d\d/x\d\.mkv$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"data".to_vec())
                .set_delay(Duration::from_millis(50)),
        )
        .expect(18)
        .mount(&server)
        .await;

    let media = TempDir::new().unwrap();
    let mut config = create_test_config(media.path(), Some(format!("{}/movies/", server.uri())));
    config.mirror.max_concurrent_fetches = 3;

    let report = run_mirror(config).await.unwrap();

    assert_eq!(report.statistics.directories_visited, 7);
    assert_eq!(report.statistics.downloaded, 18);
    assert!(report.statistics.peak_in_flight >= 2);
    assert!(report.statistics.peak_in_flight <= 3);
    assert!(media.path().join("movies/d5/x2.mkv").exists());
    server.verify().await;
}

#[tokio::test]
async fn test_leftover_partial_downloads_are_swept() {
    let server = MockServer::start().await;
    mount_movies_tree(&server).await;

    let media = TempDir::new().unwrap();
    fs::create_dir_all(media.path().join("movies/removed")).unwrap();
    let leftover = staging_path(&media.path().join("movies/removed/old.mkv"));
    fs::write(&leftover, b"partial").unwrap();

    run_mirror(create_test_config(media.path(), Some(format!("{}/movies/", server.uri()))))
        .await
        .unwrap();

    assert!(!leftover.exists());
    assert!(media.path().join("movies/a.mkv").exists());
}

/// Root-mode tree: categories `movies/` and `音乐/`, plus the manifest
async fn mount_root_tree(server: &MockServer, with_manifest: bool) {
    mount_listing(server, "/movies/", listing("/movies/", &[("a.mkv", "3")])).await;
    mount_file(server, "/movies/a.mkv", b"abc").await;
    mount_listing(server, MUSIC_ENCODED, listing("/音乐/", &[("x.flac", "2")])).await;
    mount_file(server, &format!("{}x.flac", MUSIC_ENCODED), b"xx").await;

    if with_manifest {
        Mock::given(method("GET"))
            .and(path("/.scan.list"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "2023-10-18 10:12 /movies/a.mkv\n2023-10-18 10:12 /音乐/x.flac\n2023-10-18 10:12 /other/y.mkv\n",
            ))
            .mount(server)
            .await;
    }
}

fn create_root_config(media_root: &Path, server: &MockServer) -> Config {
    let mut config = create_test_config(media_root, Some(format!("{}/", server.uri())));
    config.mirror.purge = true;
    config.remote.categories = vec!["movies/".to_string(), "音乐/".to_string()];
    config
}

fn seed_local_files(media_root: &Path) {
    fs::create_dir_all(media_root.join("movies")).unwrap();
    fs::write(media_root.join("movies/old.mkv"), b"stale").unwrap();
    fs::write(media_root.join("movies/old.srt"), b"subs").unwrap();
}

#[tokio::test]
async fn test_root_mode_reconciles_and_purges() {
    let server = MockServer::start().await;
    mount_root_tree(&server, true).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing("/", &[])))
        .expect(0)
        .mount(&server)
        .await;

    let media = TempDir::new().unwrap();
    seed_local_files(media.path());

    let report = run_mirror(create_root_config(media.path(), &server))
        .await
        .unwrap();

    assert!(media.path().join("movies/a.mkv").exists());
    assert!(media.path().join("音乐/x.flac").exists());
    assert!(!media.path().join("movies/old.mkv").exists());
    assert!(media.path().join("movies/old.srt").exists());

    let bootstrap = report.bootstrap.unwrap();
    assert_eq!(bootstrap.recorded, 1);

    let reconcile = report.reconcile.unwrap();
    assert_eq!(reconcile.observed, 2);
    assert_eq!(reconcile.expected, Some(2));
    assert_eq!(reconcile.gap, Some(0));
    assert_eq!(reconcile.purged, vec!["movies/old.mkv".to_string()]);
    assert!(reconcile.committed);
    assert_eq!(report.statistics.purged, 1);

    let files = SnapshotFiles::for_media_root(media.path());
    assert!(!files.observed.exists());
    let baseline = SqliteSnapshot::new(&files.baseline).unwrap();
    let paths = baseline.paths().unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths.contains("movies/a.mkv"));
    assert!(paths.contains("音乐/x.flac"));

    server.verify().await;
}

#[tokio::test]
async fn test_missing_manifest_skips_purge() {
    let server = MockServer::start().await;
    mount_root_tree(&server, false).await;

    let media = TempDir::new().unwrap();
    seed_local_files(media.path());

    let report = run_mirror(create_root_config(media.path(), &server))
        .await
        .unwrap();

    let reconcile = report.reconcile.unwrap();
    assert_eq!(reconcile.expected, None);
    assert!(reconcile.purge_skipped);
    assert!(reconcile.purged.is_empty());
    assert!(media.path().join("movies/old.mkv").exists());
}

#[tokio::test]
async fn test_persist_without_purge_keeps_observed_snapshot() {
    let server = MockServer::start().await;
    mount_root_tree(&server, false).await;

    let media = TempDir::new().unwrap();
    let mut config = create_root_config(media.path(), &server);
    config.mirror.purge = false;
    config.mirror.persist_state = true;

    let report = run_mirror(config).await.unwrap();
    assert!(report.reconcile.is_none());

    let files = SnapshotFiles::for_media_root(media.path());
    let observed = SqliteSnapshot::new(&files.observed).unwrap();
    assert_eq!(observed.count().unwrap(), 2);
}

#[tokio::test]
async fn test_endpoint_picked_from_pool() {
    let server = MockServer::start().await;
    mount_root_tree(&server, true).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let media = TempDir::new().unwrap();
    let mut config = create_root_config(media.path(), &server);
    config.remote.start_url = None;
    config.remote.pool = vec![format!("{}/", server.uri())];

    let report = run_mirror(config).await.unwrap();
    assert_eq!(report.start_url.as_str(), format!("{}/", server.uri()));
    assert_eq!(report.statistics.downloaded, 2);
    server.verify().await;
}

#[tokio::test]
async fn test_purge_requires_tree_root() {
    let media = TempDir::new().unwrap();
    let mut config = create_test_config(media.path(), Some("http://127.0.0.1:9/movies/".to_string()));
    config.mirror.purge = true;

    let err = run_mirror(config).await.unwrap_err();
    assert!(matches!(err, MirrorError::ScopeMismatch { .. }));
}

#[tokio::test]
async fn test_missing_media_root_is_fatal() {
    let media = TempDir::new().unwrap();
    let config = create_test_config(
        &media.path().join("missing"),
        Some("http://127.0.0.1:9/".to_string()),
    );

    let err = run_mirror(config).await.unwrap_err();
    assert!(matches!(err, MirrorError::MediaRoot { .. }));
}

#[tokio::test]
async fn test_empty_pool_is_fatal() {
    let media = TempDir::new().unwrap();
    let config = create_test_config(media.path(), None);

    let err = run_mirror(config).await.unwrap_err();
    assert!(matches!(err, MirrorError::NoReachableEndpoint));
}
