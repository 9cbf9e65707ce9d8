//! Listing parser for autoindex pages
//!
//! This module turns an nginx-style autoindex page into:
//! - File entries (name, modification time, size)
//! - Child directory URLs
//!
//! A listing row is an `<a href>` followed by a text node of the form
//! `DD-Mon-YYYY HH:MM <size>`. Rows whose metadata cannot be read are
//! counted and skipped; they never abort the listing.

use crate::config::ListingTimezone;
use crate::storage::SnapshotRecord;
use crate::url::{decode_remote_path, is_hidden_path, local_relative_path};
use chrono::{LocalResult, NaiveDateTime, TimeZone};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Names of the upstream manifest file, which is never mirrored
pub const MANIFEST_NAMES: &[&str] = &["scan.list", ".scan.list"];

const TIMESTAMP_FORMAT: &str = "%d-%b-%Y %H:%M";

/// A file row of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute URL of the file
    pub url: Url,

    /// Decoded path from the server root, starting with `/`
    pub remote_path: String,

    /// Modification time (unix seconds)
    pub modified_at: i64,

    pub size_bytes: u64,
}

impl FileEntry {
    /// Path relative to the media root, as used for snapshot keys
    pub fn relative_path(&self) -> String {
        local_relative_path(&self.remote_path)
    }

    /// Returns true if any path segment is hidden
    pub fn is_hidden(&self) -> bool {
        is_hidden_path(&self.remote_path)
    }

    /// Snapshot record carrying the remote metadata
    pub fn to_record(&self) -> SnapshotRecord {
        SnapshotRecord {
            relative_path: self.relative_path(),
            modified_at: self.modified_at,
            size_bytes: self.size_bytes,
        }
    }

    /// Returns the last path segment
    #[cfg(test)]
    pub fn file_name(&self) -> &str {
        self.remote_path
            .rsplit('/')
            .next()
            .unwrap_or(self.remote_path.as_str())
    }
}

/// Everything extracted from one listing page
#[derive(Debug, Clone, Default)]
pub struct ParsedListing {
    /// File rows in listing order
    pub files: Vec<FileEntry>,

    /// Child directories in listing order
    pub dirs: Vec<Url>,

    /// File rows dropped because their metadata was malformed
    pub skipped: usize,
}

/// Parses an autoindex page
///
/// # Row Rules
///
/// - `../` and links outside `base_url` are navigation, not rows
/// - an href ending in `/` is a child directory
/// - the upstream manifest (`scan.list`) is ignored
/// - any other href is a file; its metadata comes from the following text node
///
/// # Arguments
///
/// * `html` - The listing page body
/// * `base_url` - URL the page was fetched from (must end in `/`)
/// * `timezone` - Zone the server prints timestamps in
///
/// # Example
///
/// ```
/// use autoindex_mirror::config::ListingTimezone;
/// use autoindex_mirror::crawler::parse_listing;
/// use url::Url;
///
/// let html = r#"<pre><a href="../">../</a>
/// <a href="a.mkv">a.mkv</a>  18-Oct-2023 10:12   1000
/// <a href="sub/">sub/</a>    18-Oct-2023 10:12      -
/// </pre>"#;
/// let base = Url::parse("https://example.com/movies/").unwrap();
/// let listing = parse_listing(html, &base, ListingTimezone::Utc);
/// assert_eq!(listing.files.len(), 1);
/// assert_eq!(listing.dirs.len(), 1);
/// ```
pub fn parse_listing(html: &str, base_url: &Url, timezone: ListingTimezone) -> ParsedListing {
    let document = Html::parse_document(html);
    let mut listing = ParsedListing::default();

    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return listing,
    };

    for element in document.select(&selector) {
        let href = match element.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };

        if is_navigation(href) {
            continue;
        }

        let resolved = match base_url.join(href) {
            Ok(u) => u,
            Err(e) => {
                tracing::debug!("Skipping unresolvable link {}: {}", href, e);
                listing.skipped += 1;
                continue;
            }
        };

        if !is_within(&resolved, base_url) {
            continue;
        }

        if resolved.path().ends_with('/') {
            listing.dirs.push(resolved);
            continue;
        }

        match file_entry(element, resolved, timezone) {
            Ok(Some(entry)) => listing.files.push(entry),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Skipping row {} in {}: {}", href, base_url, e);
                listing.skipped += 1;
            }
        }
    }

    listing
}

/// Links that never describe a row
fn is_navigation(href: &str) -> bool {
    href.is_empty()
        || href == "../"
        || href == ".."
        || href.starts_with('?')
        || href.starts_with('#')
}

/// Returns true if `url` lies strictly below `base`
fn is_within(url: &Url, base: &Url) -> bool {
    url.origin() == base.origin()
        && url.path().len() > base.path().len()
        && url.path().starts_with(base.path())
}

/// Builds a file entry, or `None` for the manifest file
fn file_entry(
    element: ElementRef<'_>,
    url: Url,
    timezone: ListingTimezone,
) -> Result<Option<FileEntry>, String> {
    let remote_path = decode_remote_path(&url).map_err(|e| e.to_string())?;

    let name = remote_path.rsplit('/').next().unwrap_or_default();
    if MANIFEST_NAMES.contains(&name) {
        return Ok(None);
    }

    let metadata = element
        .next_sibling()
        .and_then(|node| node.value().as_text().map(|text| text.trim().to_string()))
        .ok_or_else(|| "no metadata after link".to_string())?;

    let (modified_at, size_bytes) = parse_row_metadata(&metadata, timezone)?;

    Ok(Some(FileEntry {
        url,
        remote_path,
        modified_at,
        size_bytes,
    }))
}

/// Parses `DD-Mon-YYYY HH:MM <size>` into (unix seconds, bytes)
pub fn parse_row_metadata(text: &str, timezone: ListingTimezone) -> Result<(i64, u64), String> {
    let mut tokens = text.split_whitespace();
    let (date, time, size) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(d), Some(t), Some(s)) => (d, t, s),
        _ => return Err(format!("expected `date time size`, got {:?}", text.trim())),
    };

    let naive = NaiveDateTime::parse_from_str(&format!("{} {}", date, time), TIMESTAMP_FORMAT)
        .map_err(|e| format!("bad timestamp {} {}: {}", date, time, e))?;

    let modified_at = match timezone {
        ListingTimezone::Utc => chrono::Utc.from_utc_datetime(&naive).timestamp(),
        ListingTimezone::Local => match chrono::Local.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.timestamp(),
            LocalResult::Ambiguous(earliest, _) => earliest.timestamp(),
            LocalResult::None => return Err(format!("nonexistent local time {}", naive)),
        },
    };

    let size_bytes = size
        .parse::<u64>()
        .map_err(|_| format!("size is not a byte count: {}", size))?;

    Ok((modified_at, size_bytes))
}
