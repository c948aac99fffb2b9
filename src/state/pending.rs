//! Pending URL bookkeeping for task groups
use chrono::{DateTime, Utc};
use std::fmt;

/// Represents where a frontier entry is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingStatus {
    /// Waiting to be claimed by the scheduler
    Pending,

    /// Claimed and occupying an in-flight slot
    Processing,

    /// Retries exhausted; recorded as an error page
    Failed,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Failed => "failed",
        }
    }

    /// Returns true if the entry still needs work
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered URL awaiting (or undergoing) a crawl attempt
///
/// Keyed by the raw URL as discovered; dedup happens on the normalized form.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub url: String,
    pub status: PendingStatus,
    pub retry_count: u32,
    pub last_retry_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl PendingEntry {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            status: PendingStatus::Pending,
            retry_count: 0,
            last_retry_time: None,
            error: None,
        }
    }

    /// Records a failed attempt
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.last_retry_time = Some(Utc::now());
        self.error = Some(error.into());
    }

    /// Returns true while another attempt is allowed under `max_retries`
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.retry_count < max_retries
    }
}
