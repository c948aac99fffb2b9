use url::Url;

/// Normalizes a URL into the dedup key used by task groups and document stores
///
/// # Normalization Steps
///
/// 1. Parse the URL; a malformed URL is returned unchanged
/// 2. Remove the query string
/// 3. Remove the fragment
/// 4. Remove trailing slashes (the root URL loses its `/` too)
///
/// Scheme, host and path are otherwise preserved, so the result is stable
/// under repeated normalization.
///
/// # Examples
///
/// ```
/// use docsweep::url::normalize;
///
/// assert_eq!(normalize("https://docs.example.com/guide/?tab=2#intro"), "https://docs.example.com/guide");
/// assert_eq!(normalize("not a url"), "not a url");
/// ```
pub fn normalize(url_str: &str) -> String {
    let mut url = match Url::parse(url_str) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("Leaving malformed URL {:?} unnormalized: {}", url_str, e);
            return url_str.to_string();
        }
    };

    url.set_query(None);
    url.set_fragment(None);

    strip_trailing_slashes(url.as_str()).to_string()
}

/// Drops only the fragment, keeping the query string
///
/// Used where two links differing by query are distinct pages, e.g. when
/// collapsing the links discovered on a single page.
///
/// # Examples
///
/// ```
/// use docsweep::url::without_fragment;
///
/// assert_eq!(without_fragment("https://example.com/a?v=2#top"), "https://example.com/a?v=2");
/// ```
pub fn without_fragment(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(e) => {
            tracing::debug!("Leaving malformed URL {:?} unchanged: {}", url_str, e);
            url_str.to_string()
        }
    }
}

fn strip_trailing_slashes(s: &str) -> &str {
    let trimmed = s.trim_end_matches('/');
    // "file:///" style URLs would collapse to the scheme alone
    if trimmed.ends_with(':') {
        s
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_query_and_fragment() {
        assert_eq!(
            normalize("https://example.com/page?utm_source=x&a=1#section"),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_remove_trailing_slash() {
        assert_eq!(normalize("https://example.com/page/"), "https://example.com/page");
    }

    #[test]
    fn test_root_url() {
        assert_eq!(normalize("https://example.com/"), "https://example.com");
        assert_eq!(normalize("https://example.com"), "https://example.com");
    }

    #[test]
    fn test_preserves_scheme_and_path_case() {
        assert_eq!(
            normalize("http://EXAMPLE.com/Docs/Intro"),
            "http://example.com/Docs/Intro"
        );
    }

    #[test]
    fn test_preserves_port() {
        assert_eq!(
            normalize("http://127.0.0.1:8080/a/"),
            "http://127.0.0.1:8080/a"
        );
    }

    #[test]
    fn test_malformed_url_is_returned_unchanged() {
        assert_eq!(normalize("not a url"), "not a url");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/relative/path/"), "/relative/path/");
    }

    #[test]
    fn test_idempotent() {
        let urls = [
            "https://example.com/",
            "https://example.com/a/b/",
            "https://example.com/a//",
            "https://example.com/a?b=c#d",
            "https://example.com:8443/x/y.html",
            "http://127.0.0.1:1234",
            "not a url",
        ];

        for url in urls {
            let once = normalize(url);
            assert_eq!(normalize(&once), once, "not idempotent for {}", url);
        }
    }

    #[test]
    fn test_without_fragment_keeps_query() {
        assert_eq!(
            without_fragment("https://example.com/search?q=rust#results"),
            "https://example.com/search?q=rust"
        );
        assert_eq!(
            without_fragment("https://example.com/page/"),
            "https://example.com/page/"
        );
    }

    #[test]
    fn test_without_fragment_malformed() {
        assert_eq!(without_fragment("::bad::"), "::bad::");
    }
}
