use crate::UrlError;
use percent_encoding::percent_decode_str;
use url::Url;

/// Parses a URL string and requires an HTTP or HTTPS scheme
///
/// # Examples
///
/// ```
/// use autoindex_mirror::url::parse_http_url;
///
/// assert!(parse_http_url("https://example.com/").is_ok());
/// assert!(parse_http_url("ftp://example.com/").is_err());
/// ```
pub fn parse_http_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    Ok(url)
}

/// Returns the percent-decoded path component of a listing URL
///
/// The result always starts with `/`. Decoding is strict UTF-8; listings that
/// escape raw bytes outside UTF-8 are rejected.
pub fn decode_remote_path(url: &Url) -> Result<String, UrlError> {
    percent_decode_str(url.path())
        .decode_utf8()
        .map(|path| path.into_owned())
        .map_err(|e| UrlError::Encoding(format!("{}: {}", url.path(), e)))
}

/// Returns true if the URL points at the top of the mirrored tree
pub fn is_tree_root(url: &Url) -> bool {
    url.path() == "/"
}

/// Returns true if any segment of a `/`-separated path starts with a dot
///
/// ```
/// use autoindex_mirror::is_hidden_path;
///
/// assert!(is_hidden_path("/movies/.cache/a.mkv"));
/// assert!(!is_hidden_path("/movies/a.mkv"));
/// ```
pub fn is_hidden_path(path: &str) -> bool {
    path.split('/').any(|segment| segment.starts_with('.'))
}

/// Resolves a configured category (decoded, trailing `/`) against the tree root
///
/// Non-ASCII characters are percent-encoded by the URL parser.
pub fn join_category(root: &Url, category: &str) -> Result<Url, UrlError> {
    root.join(category.trim_start_matches('/'))
        .map_err(|e| UrlError::Parse(format!("{}: {}", category, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_url_accepts_http_and_https() {
        assert!(parse_http_url("http://example.com/").is_ok());
        assert!(parse_http_url("https://example.com/a/").is_ok());
    }

    #[test]
    fn test_parse_http_url_rejects_other_schemes() {
        let err = parse_http_url("file:///tmp").unwrap_err();
        assert!(matches!(err, UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_parse_http_url_rejects_garbage() {
        assert!(matches!(
            parse_http_url("not a url").unwrap_err(),
            UrlError::Parse(_)
        ));
    }

    #[test]
    fn test_decode_remote_path_unicode() {
        let url = Url::parse("https://example.com/%E7%94%B5%E5%BD%B1/a%20b.mkv").unwrap();
        assert_eq!(decode_remote_path(&url).unwrap(), "/电影/a b.mkv");
    }

    #[test]
    fn test_decode_remote_path_keeps_plus() {
        let url = Url::parse("https://example.com/a+b.mkv").unwrap();
        assert_eq!(decode_remote_path(&url).unwrap(), "/a+b.mkv");
    }

    #[test]
    fn test_decode_remote_path_invalid_utf8() {
        let url = Url::parse("https://example.com/%FF%FE.mkv").unwrap();
        assert!(matches!(
            decode_remote_path(&url).unwrap_err(),
            UrlError::Encoding(_)
        ));
    }

    #[test]
    fn test_is_tree_root() {
        assert!(is_tree_root(&Url::parse("https://example.com/").unwrap()));
        assert!(is_tree_root(&Url::parse("https://example.com").unwrap()));
        assert!(!is_tree_root(&Url::parse("https://example.com/a/").unwrap()));
    }

    #[test]
    fn test_is_hidden_path() {
        assert!(is_hidden_path(".hidden"));
        assert!(is_hidden_path("/a/.b/c"));
        assert!(is_hidden_path("/a/b/.c"));
        assert!(!is_hidden_path("/a/b.c/d"));
        assert!(!is_hidden_path("/"));
    }

    #[test]
    fn test_join_category_encodes_unicode() {
        let root = Url::parse("https://example.com/").unwrap();
        let joined = join_category(&root, "纪录片/").unwrap();
        assert_eq!(joined.as_str(), "https://example.com/%E7%BA%AA%E5%BD%95%E7%89%87/");
        assert_eq!(decode_remote_path(&joined).unwrap(), "/纪录片/");
    }

    #[test]
    fn test_join_category_nested() {
        let root = Url::parse("https://example.com/").unwrap();
        let joined = join_category(&root, "movies/2023/").unwrap();
        assert_eq!(joined.path(), "/movies/2023/");
    }
}
