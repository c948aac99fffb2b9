use url::Url;

/// Extracts the lowercase host of a URL string
///
/// Ports are ignored, so `http://127.0.0.1:8080/` and `http://127.0.0.1/`
/// share a host.
///
/// # Examples
///
/// ```
/// use docsweep::url::extract_host;
///
/// assert_eq!(extract_host("https://Docs.Example.com/path"), Some("docs.example.com".to_string()));
/// assert_eq!(extract_host("no host here"), None);
/// ```
pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Returns the path a pattern is matched against
///
/// Query and fragment are dropped, as is a trailing slash; the root path
/// stays `/`.
pub fn match_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let trimmed = parsed.path().trim_end_matches('/');
    if trimmed.is_empty() {
        Some("/".to_string())
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_host() {
        assert_eq!(
            extract_host("https://example.com/"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_extract_with_port() {
        assert_eq!(
            extract_host("https://example.com:8080/"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_extract_uppercase_converted_to_lowercase() {
        assert_eq!(
            extract_host("https://EXAMPLE.COM/"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_extract_invalid() {
        assert_eq!(extract_host("/relative"), None);
        assert_eq!(extract_host("mailto:someone@example.com"), None);
    }

    #[test]
    fn test_match_path_strips_trailing_slash() {
        assert_eq!(
            match_path("https://example.com/guide/intro/"),
            Some("/guide/intro".to_string())
        );
    }

    #[test]
    fn test_match_path_ignores_query_and_fragment() {
        assert_eq!(
            match_path("https://example.com/apis/foo?x=1#y"),
            Some("/apis/foo".to_string())
        );
    }

    #[test]
    fn test_match_path_root() {
        assert_eq!(match_path("https://example.com"), Some("/".to_string()));
        assert_eq!(match_path("https://example.com//"), Some("/".to_string()));
    }
}
