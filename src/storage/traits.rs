//! Storage traits and error types
//!
//! This module defines the seam between the crawl scheduler and whatever
//! persists its pages, and the error type of the JSON store.

use crate::storage::{PageRecord, StoreSource};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timed out waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Receives pages produced by the scheduler
///
/// Implementations must not block: `save_page` is called from the scheduling
/// loop and is expected to buffer, leaving durability to a later flush.
#[async_trait]
pub trait PageSink: Send + Sync {
    /// Buffers a page for the given source under its normalized URL
    fn save_page(&self, source: &StoreSource, url: &str, page: PageRecord);

    /// Writes everything still buffered
    ///
    /// Called once at the end of a run. Pages that fail to flush stay
    /// buffered; the first error is returned.
    async fn flush_all(&self) -> StoreResult<()>;
}
