//! URL handling module for docsweep
//!
//! This module provides URL normalization, host extraction, path pattern
//! matching, and the decision of which source (if any) owns a discovered URL.

mod domain;
mod matcher;
mod normalize;

use crate::state::Source;

// Re-export main functions
pub use domain::{extract_host, match_path};
pub use matcher::{matches_patterns, wildcard_to_regex, Pattern, PatternKind};
pub use normalize::{normalize, without_fragment};

/// Finds the source whose base URL shares the URL's host
///
/// Sources are checked in registration order; the first host match wins.
///
/// # Returns
///
/// The index of the owning source, or `None` if no source claims the host
pub fn resolve_owner(url: &str, sources: &[Source]) -> Option<usize> {
    let host = extract_host(url)?;
    sources.iter().position(|s| s.host() == host)
}

/// Decides whether a discovered URL should be crawled as part of `source`
///
/// This function checks, in order:
/// 1. The URL's host must match the source's base URL host
/// 2. No exclude pattern may match the path
/// 3. If include patterns exist, one of them must match the path
///
/// With no include patterns the source runs in exclude-only mode and every
/// non-excluded path on its host is accepted.
///
/// # Examples
///
/// ```
/// use docsweep::state::Source;
/// use docsweep::url::{is_included, Pattern};
///
/// let source = Source::new(
///     "docs",
///     "https://x.test/a",
///     vec![],
///     vec![Pattern::regex(r"/v1/").unwrap()],
/// ).unwrap();
///
/// assert!(is_included("https://x.test/a/b", &source));
/// assert!(!is_included("https://x.test/v1/c", &source));
/// assert!(!is_included("https://other.test/a", &source));
/// ```
pub fn is_included(url: &str, source: &Source) -> bool {
    match extract_host(url) {
        Some(host) if host == source.host() => {}
        _ => return false,
    }

    let Some(path) = match_path(url) else {
        return false;
    };

    matches_patterns(&path, source.include_patterns(), source.exclude_patterns())
}

/// Resolves the owning source and applies its patterns in one step
///
/// # Returns
///
/// The index of the source that should crawl this URL, if any
pub fn route(url: &str, sources: &[Source]) -> Option<usize> {
    let owner = resolve_owner(url, sources)?;
    if is_included(url, &sources[owner]) {
        Some(owner)
    } else {
        None
    }
}
