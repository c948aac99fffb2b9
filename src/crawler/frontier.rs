//! Crawl frontier across all registered sources
//!
//! The frontier owns every task group, the global set of normalized URLs in
//! flight, and the round-robin cursor used when claiming work. It is only
//! touched from the scheduler's coordinating loop, so claims never race.

use crate::state::{PendingEntry, PendingStatus, Source, TaskGroup};
use crate::storage::{store_slug, PageRecord};
use crate::url::{normalize, route};
use crate::SweepError;
use std::collections::HashMap;

/// A URL taken out of a group's pending set for one dispatch
#[derive(Debug, Clone)]
pub struct Claim {
    /// Index of the owning task group
    pub group: usize,

    /// The URL as discovered
    pub url: String,

    /// Key under which the page is recorded and stored
    pub normalized: String,

    pub entry: PendingEntry,
}

/// How a claimed URL ended
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// Rendered and recorded
    Succeeded(PageRecord),

    /// Retries exhausted; the placeholder page marks the URL done
    Failed {
        entry: PendingEntry,
        placeholder: PageRecord,
    },

    /// Abandoned without a result (run aborted)
    Skipped,
}

/// Pending and in-flight URLs for every source in a run
#[derive(Debug, Default)]
pub struct Frontier {
    groups: Vec<TaskGroup>,
    sources: Vec<Source>,
    index: HashMap<String, usize>,
    /// Normalized URL in flight -> owning group
    processing: HashMap<String, usize>,
    cursor: usize,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source and seeds its base URL
    ///
    /// The seed bypasses the include/exclude patterns.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Index of the new task group
    /// * `Err(SweepError::DuplicateSource)` - A source with the same name (ignoring case) exists
    pub fn add_group(&mut self, source: Source) -> Result<usize, SweepError> {
        let key = source.key();
        if self.index.contains_key(&key) {
            return Err(SweepError::DuplicateSource(source.name().to_string()));
        }

        let slug = store_slug(source.name());
        if let Some(other) = self.sources.iter().find(|s| store_slug(s.name()) == slug) {
            return Err(SweepError::InvalidSource {
                name: source.name().to_string(),
                reason: format!("stores to the same file ({}.json) as '{}'", slug, other.name()),
            });
        }

        let idx = self.groups.len();
        let mut group = TaskGroup::new(source.clone());
        group.push_pending(source.base_url());

        tracing::debug!("Registered source {} at {}", source.name(), source.base_url());
        self.groups.push(group);
        self.sources.push(source);
        self.index.insert(key, idx);
        Ok(idx)
    }

    /// Adds a URL to a group's pending set
    ///
    /// No-op if the normalized URL is already recorded or in flight, or if the
    /// raw URL is already pending.
    ///
    /// # Returns
    ///
    /// True if a new pending entry was created
    pub fn enqueue(&mut self, group: usize, url: &str) -> bool {
        let normalized = normalize(url);
        if self.processing.contains_key(&normalized) {
            return false;
        }

        let Some(group) = self.groups.get_mut(group) else {
            return false;
        };
        if group.has_page(&normalized) {
            return false;
        }
        group.push_pending(url)
    }

    /// Claims up to `limit` pending URLs, rotating across groups
    ///
    /// Pending entries whose normalized form was recorded or claimed since
    /// they were queued are dropped.
    pub fn claim_ready(&mut self, limit: usize) -> Vec<Claim> {
        let mut claims = Vec::new();
        let count = self.groups.len();
        if count == 0 {
            return claims;
        }

        let mut idle = 0;
        while claims.len() < limit && idle < count {
            let group = self.cursor % count;
            self.cursor = (self.cursor + 1) % count;

            match self.claim_from(group) {
                Some(claim) => {
                    claims.push(claim);
                    idle = 0;
                }
                None => idle += 1,
            }
        }

        claims
    }

    fn claim_from(&mut self, idx: usize) -> Option<Claim> {
        let group = &mut self.groups[idx];

        while let Some(mut entry) = group.pop_pending() {
            let normalized = normalize(&entry.url);
            if group.has_page(&normalized) || self.processing.contains_key(&normalized) {
                tracing::trace!("Dropping duplicate pending URL {}", entry.url);
                continue;
            }

            entry.status = PendingStatus::Processing;
            self.processing.insert(normalized.clone(), idx);
            group.start();

            return Some(Claim {
                group: idx,
                url: entry.url.clone(),
                normalized,
                entry,
            });
        }

        None
    }

    /// Returns a claimed URL and records how it ended
    pub fn release(&mut self, claim: &Claim, outcome: ClaimOutcome) {
        self.processing.remove(&claim.normalized);
        let in_flight = self
            .processing
            .values()
            .filter(|&&owner| owner == claim.group)
            .count();

        let Some(group) = self.groups.get_mut(claim.group) else {
            return;
        };

        match outcome {
            ClaimOutcome::Succeeded(page) => group.record_page(claim.normalized.clone(), page),
            ClaimOutcome::Failed { entry, placeholder } => {
                group.record_page(claim.normalized.clone(), placeholder);
                group.record_failure(entry);
            }
            ClaimOutcome::Skipped => {}
        }

        group.settle(in_flight);
    }

    /// Index of the group that should crawl a discovered URL
    pub fn route(&self, url: &str) -> Option<usize> {
        route(url, &self.sources)
    }

    /// Number of URLs currently claimed
    pub fn in_flight(&self) -> usize {
        self.processing.len()
    }

    pub fn is_processing(&self, normalized: &str) -> bool {
        self.processing.contains_key(normalized)
    }

    pub fn has_pending(&self) -> bool {
        self.groups.iter().any(|g| g.pending_len() > 0)
    }

    /// True once no group has pending or in-flight URLs
    pub fn is_finished(&self) -> bool {
        self.processing.is_empty() && !self.has_pending()
    }

    pub fn groups(&self) -> &[TaskGroup] {
        &self.groups
    }

    pub fn group(&self, idx: usize) -> Option<&TaskGroup> {
        self.groups.get(idx)
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Marks every drained group completed
    pub(crate) fn close_groups(&mut self) {
        for group in &mut self.groups {
            group.close();
        }
    }
}
