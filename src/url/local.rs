use std::path::{Path, PathBuf};

/// Characters that cannot appear in local file names, with their replacements
const UNSAFE_CHARS: &[(char, &str)] = &[('|', "%7c")];

/// Normalizes a relative path to forward slashes and substitutes unsafe characters
pub fn sanitize_relative_path(path: &str) -> String {
    let mut sanitized = path.replace('\\', "/");
    for (ch, replacement) in UNSAFE_CHARS {
        sanitized = sanitized.replace(*ch, replacement);
    }
    sanitized
}

/// Converts a decoded remote path (`/a/b.mkv`) into the snapshot key (`a/b.mkv`)
///
/// The key is the path as written on disk relative to the media root, so the
/// same string is used for downloads, snapshots and purges.
///
/// ```
/// use autoindex_mirror::local_relative_path;
///
/// assert_eq!(local_relative_path("/shows/a|b.mkv"), "shows/a%7cb.mkv");
/// ```
pub fn local_relative_path(remote_path: &str) -> String {
    sanitize_relative_path(remote_path.trim_start_matches('/'))
}

/// Joins a snapshot key onto the media root
///
/// Empty, `.` and `..` segments are dropped so the result never escapes the root.
pub fn to_local_path(media_root: &Path, relative: &str) -> PathBuf {
    let mut path = media_root.to_path_buf();
    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        path.push(segment);
    }
    path
}
