//! Per-source crawl state for one run
//!
//! A task group owns its source's pending queue and the pages recorded this
//! run. What is in flight is tracked by the frontier, which reports it back
//! when a claim is released.

use crate::state::{PendingEntry, PendingStatus, Source};
use crate::storage::PageRecord;
use std::collections::{HashMap, VecDeque};

/// Lifecycle of a task group within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    /// Registered, nothing claimed yet
    Waiting,
    /// At least one URL claimed and work remains
    Running,
    /// No pending or in-flight URLs left
    Completed,
}

/// Runtime crawl state for one source
///
/// Holds the pending URLs (in discovery order) and the completed pages keyed
/// by normalized URL. Discarded at the end of the run; the document store is
/// the durable copy.
#[derive(Debug)]
pub struct TaskGroup {
    source: Source,
    pages: HashMap<String, PageRecord>,
    status: GroupStatus,
    pending: HashMap<String, PendingEntry>,
    order: VecDeque<String>,
    failed: Vec<PendingEntry>,
}

impl TaskGroup {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            pages: HashMap::new(),
            status: GroupStatus::Waiting,
            pending: HashMap::new(),
            order: VecDeque::new(),
            failed: Vec::new(),
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn status(&self) -> GroupStatus {
        self.status
    }

    /// Completed pages keyed by normalized URL
    pub fn pages(&self) -> &HashMap<String, PageRecord> {
        &self.pages
    }

    /// Entries that ran out of retries during this run
    pub fn failed(&self) -> &[PendingEntry] {
        &self.failed
    }

    pub fn has_page(&self, normalized: &str) -> bool {
        self.pages.contains_key(normalized)
    }

    pub fn has_pending(&self, url: &str) -> bool {
        self.pending.contains_key(url)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of recorded pages that are error placeholders
    pub fn error_page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|(url, page)| page.is_error_page_for(url))
            .count()
    }

    /// Adds a raw URL to the pending set
    ///
    /// Returns false if the raw URL already has an entry.
    pub(crate) fn push_pending(&mut self, url: &str) -> bool {
        if self.pending.contains_key(url) {
            return false;
        }
        self.pending.insert(url.to_string(), PendingEntry::new(url));
        self.order.push_back(url.to_string());
        if self.status == GroupStatus::Completed {
            self.status = GroupStatus::Running;
        }
        true
    }

    /// Removes the oldest pending entry
    pub(crate) fn pop_pending(&mut self) -> Option<PendingEntry> {
        while let Some(url) = self.order.pop_front() {
            if let Some(entry) = self.pending.remove(&url) {
                return Some(entry);
            }
        }
        None
    }

    pub(crate) fn start(&mut self) {
        self.status = GroupStatus::Running;
    }

    /// Completes a running group once its queue is empty and the frontier
    /// holds none of its URLs
    pub(crate) fn settle(&mut self, in_flight: usize) {
        if self.pending.is_empty() && in_flight == 0 && self.status == GroupStatus::Running {
            self.status = GroupStatus::Completed;
        }
    }

    pub(crate) fn record_page(&mut self, normalized: String, page: PageRecord) {
        self.pages.insert(normalized, page);
    }

    pub(crate) fn record_failure(&mut self, mut entry: PendingEntry) {
        entry.status = PendingStatus::Failed;
        self.failed.push(entry);
    }

    /// Marks a drained group completed at the end of a run, even if it never started
    pub(crate) fn close(&mut self) {
        if self.pending.is_empty() {
            self.status = GroupStatus::Completed;
        }
    }
}
