//! Storage module for persisting crawled pages
//!
//! This module handles everything between a rendered page and the document
//! store files on disk, including:
//! - The on-disk store shape and corrupt-file recovery
//! - Cross-process lock files
//! - Near-duplicate suppression
//! - Atomic, merge-based store writes
//! - The debounced per-source persistence pipeline

mod json_store;
mod lock;
mod pipeline;
mod schema;
mod similarity;
mod traits;

pub use json_store::{store_slug, JsonStore, MergeReport};
pub use lock::{lock_path_for, LockSettings, StoreLock};
pub use pipeline::{PersistencePipeline, PersistenceSettings};
pub use schema::{parse_store, serialize_store, DocumentStore, ParsedStore, StoreSource};
pub use similarity::{NeverSimilar, SimilarityCheck, WordOverlap};
pub use traits::{PageSink, StoreError, StoreResult};

use serde::{Deserialize, Serialize};

/// Title prefix of the placeholder page recorded when a URL exhausts its retries
pub const ERROR_PAGE_PREFIX: &str = "crawl failed: ";

/// A stored page, keyed by its normalized URL in the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub title: String,
    pub content: String,
}

impl PageRecord {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Placeholder recorded under `url` when its retries were exhausted
    ///
    /// The content is the last error message.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsweep::storage::PageRecord;
    ///
    /// let page = PageRecord::error_page("https://x.test/a", "Page load timed out");
    /// assert_eq!(page.title, "crawl failed: https://x.test/a");
    /// assert_eq!(page.content, "Page load timed out");
    /// assert!(page.is_error_page_for("https://x.test/a"));
    /// ```
    pub fn error_page(url: &str, error: &str) -> Self {
        Self {
            title: format!("{}{}", ERROR_PAGE_PREFIX, url),
            content: error.to_string(),
        }
    }

    /// Whether this is the placeholder for `url`
    ///
    /// The title must name the same URL the record is stored under, so a real
    /// page whose title merely starts with the prefix is not mistaken for one.
    pub fn is_error_page_for(&self, url: &str) -> bool {
        self.title
            .strip_prefix(ERROR_PAGE_PREFIX)
            .is_some_and(|rest| rest == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_page_shape() {
        let page = PageRecord::error_page("https://x.test/a", "HTTP 500");
        assert_eq!(page.content, "HTTP 500");
        assert!(page.is_error_page_for("https://x.test/a"));
        assert!(!page.is_error_page_for("https://x.test/b"));
        assert!(!PageRecord::new("A", "alpha").is_error_page_for("https://x.test/a"));
    }

    #[test]
    fn test_lookalike_title_is_real_content() {
        let page = PageRecord::new("crawl failed: lessons from the outage", "notes");
        assert!(!page.is_error_page_for("https://x.test/postmortem"));
    }

    #[test]
    fn test_page_record_json() {
        let page = PageRecord::new("A", "alpha");
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value, serde_json::json!({"title": "A", "content": "alpha"}));
    }
}
