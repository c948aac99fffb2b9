//! Scheduler for bounded-concurrency crawling
//!
//! This module handles:
//! - Claiming pending URLs up to the concurrency ceiling
//! - Dispatching each URL as a task that owns all of its attempts
//! - Backoff between attempts and per-attempt timeouts
//! - Feeding rendered pages to the page sink and discovered links back
//!   into the frontier
//! - Cancellation and fatal renderer errors

use crate::config::CrawlerConfig;
use crate::crawler::frontier::{Claim, ClaimOutcome, Frontier};
use crate::crawler::renderer::{RenderError, RenderedPage, Renderer};
use crate::output::{CrawlSummary, SourceSummary};
use crate::state::{PendingEntry, Source};
use crate::storage::{PageRecord, PageSink};
use crate::url::without_fragment;
use crate::{Result, SweepError};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Session failures wait this many times longer before the next attempt
const SESSION_BACKOFF_FACTOR: u32 = 3;

/// Attempt and pacing policy for one URL
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_delay: Duration,
    pub page_load_timeout: Duration,
}

impl From<&CrawlerConfig> for RetryPolicy {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            request_delay: Duration::from_millis(config.request_delay_ms),
            page_load_timeout: Duration::from_millis(config.page_load_timeout_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given how many attempts have failed
    pub fn backoff(&self, retry_count: u32, error: &RenderError) -> Duration {
        let delay = self.retry_delay.saturating_mul(retry_count);
        if error.is_session_error() {
            delay.saturating_mul(SESSION_BACKOFF_FACTOR)
        } else {
            delay
        }
    }
}

/// How a dispatched task ended
#[derive(Debug)]
enum TaskReport {
    Rendered(RenderedPage),
    Exhausted {
        entry: PendingEntry,
        error: RenderError,
    },
    Fatal(RenderError),
    Aborted,
}

/// Drives the crawl of every registered source to completion
///
/// The scheduler is the only owner of the [`Frontier`]; tasks receive a
/// claimed URL and report back, so claim and release never race.
pub struct Scheduler {
    renderer: Arc<dyn Renderer>,
    sink: Arc<dyn PageSink>,
    config: CrawlerConfig,
    frontier: Frontier,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(renderer: Arc<dyn Renderer>, sink: Arc<dyn PageSink>, config: CrawlerConfig) -> Self {
        Self {
            renderer,
            sink,
            config,
            frontier: Frontier::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Stops claiming new URLs once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Registers a source for this run
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Index of the source's task group
    /// * `Err(SweepError::DuplicateSource)` - The name is already registered
    pub fn add_source(&mut self, source: Source) -> Result<usize> {
        self.frontier.add_group(source)
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Runs until every source is drained or the run is cancelled
    ///
    /// # Main Loop
    ///
    /// 1. Claim up to `max_concurrency - in_flight` URLs and spawn a task per URL
    /// 2. Wait for the next task to report
    /// 3. Record the page or error placeholder, hand it to the sink, and
    ///    enqueue discovered links
    /// 4. Stop when nothing is pending or in flight
    ///
    /// Stores are flushed before returning, on every path.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Per-source page counts
    /// * `Err(SweepError::RendererInit)` - The renderer could not start or broke fatally
    pub async fn run(&mut self) -> Result<CrawlSummary> {
        let started = Instant::now();

        if let Err(e) = self.renderer.initialize().await {
            tracing::error!("Renderer failed to initialize: {}", e);
            return Err(SweepError::RendererInit(e));
        }

        let limit = self.config.max_concurrency.max(1) as usize;
        let policy = RetryPolicy::from(&self.config);
        let abort = CancellationToken::new();
        let mut running = FuturesUnordered::new();
        let mut fatal: Option<RenderError> = None;
        let mut completed = 0usize;

        tracing::info!(
            "Starting crawl of {} sources (max concurrency {})",
            self.frontier.groups().len(),
            limit
        );

        loop {
            if fatal.is_none() && !self.cancel.is_cancelled() {
                let free = limit.saturating_sub(self.frontier.in_flight());
                for claim in self.frontier.claim_ready(free) {
                    tracing::debug!("Dispatching {}", claim.url);
                    let task = tokio::spawn(crawl_with_retries(
                        self.renderer.clone(),
                        claim.url.clone(),
                        claim.entry.clone(),
                        policy.clone(),
                        abort.clone(),
                    ));
                    running.push(async move {
                        let joined = task.await;
                        (claim, joined)
                    });
                }
            }

            let Some((claim, joined)) = running.next().await else {
                break;
            };

            if let Some(error) = self.handle_report(claim, joined) {
                if fatal.is_none() {
                    tracing::error!("Aborting crawl: {}", error);
                    abort.cancel();
                    fatal = Some(error);
                }
                continue;
            }

            completed += 1;
            if completed % 10 == 0 {
                tracing::info!(
                    "Progress: {} URLs done, {} in flight, {:.2} pages/sec",
                    completed,
                    self.frontier.in_flight(),
                    completed as f64 / started.elapsed().as_secs_f64()
                );
            }
        }

        if let Err(e) = self.sink.flush_all().await {
            tracing::error!("Final flush failed: {}", e);
        }

        if let Some(error) = fatal {
            return Err(SweepError::RendererInit(error));
        }

        let cancelled = self.cancel.is_cancelled() && self.frontier.has_pending();
        if cancelled {
            tracing::info!("Crawl cancelled; pending URLs were left unclaimed");
        } else {
            self.frontier.close_groups();
        }

        let summary = self.summary(started.elapsed(), cancelled);
        tracing::info!(
            "Crawl finished: {} pages in {:?}",
            summary.total_pages(),
            summary.elapsed
        );
        Ok(summary)
    }

    /// Applies one task's result to the frontier and the sink
    ///
    /// Returns the error if the task hit a fatal renderer failure.
    fn handle_report(
        &mut self,
        claim: Claim,
        joined: std::result::Result<TaskReport, JoinError>,
    ) -> Option<RenderError> {
        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Task for {} panicked or was cancelled: {}", claim.url, e);
                let mut entry = claim.entry.clone();
                entry.record_failure(e.to_string());
                self.record_error_page(&claim, entry, &e.to_string());
                return None;
            }
        };

        match report {
            TaskReport::Rendered(page) => {
                self.record_rendered(&claim, page);
                None
            }
            TaskReport::Exhausted { entry, error } => {
                tracing::warn!(
                    "Recording error page for {} after {} attempts: {}",
                    claim.url,
                    entry.retry_count,
                    error
                );
                self.record_error_page(&claim, entry, &error.to_string());
                None
            }
            TaskReport::Fatal(error) => {
                self.frontier.release(&claim, ClaimOutcome::Skipped);
                Some(error)
            }
            TaskReport::Aborted => {
                self.frontier.release(&claim, ClaimOutcome::Skipped);
                None
            }
        }
    }

    fn record_rendered(&mut self, claim: &Claim, page: RenderedPage) {
        let record = PageRecord::new(page.title, page.content);

        if let Some(group) = self.frontier.group(claim.group) {
            let store_source = group.source().store_source();
            self.sink
                .save_page(&store_source, &claim.normalized, record.clone());
        }
        self.frontier
            .release(claim, ClaimOutcome::Succeeded(record));

        let mut seen = HashSet::new();
        let mut queued = 0;
        for link in page.links {
            let link = without_fragment(&link);
            if !seen.insert(link.clone()) {
                continue;
            }
            if let Some(group) = self.frontier.route(&link) {
                if self.frontier.enqueue(group, &link) {
                    queued += 1;
                }
            }
        }

        tracing::debug!(
            "Crawled {} ({} links, {} new)",
            claim.normalized,
            seen.len(),
            queued
        );
    }

    fn record_error_page(&mut self, claim: &Claim, entry: PendingEntry, error: &str) {
        let placeholder = PageRecord::error_page(&claim.normalized, error);

        if let Some(group) = self.frontier.group(claim.group) {
            let store_source = group.source().store_source();
            self.sink
                .save_page(&store_source, &claim.normalized, placeholder.clone());
        }
        self.frontier
            .release(claim, ClaimOutcome::Failed { entry, placeholder });
    }

    fn summary(&self, elapsed: Duration, cancelled: bool) -> CrawlSummary {
        let sources = self
            .frontier
            .groups()
            .iter()
            .map(|group| SourceSummary {
                name: group.source().name().to_string(),
                pages: group.pages().len(),
                error_pages: group.error_page_count(),
                failed: group.failed().len(),
                status: group.status(),
            })
            .collect();

        CrawlSummary {
            sources,
            elapsed,
            cancelled,
        }
    }
}

/// Crawls one URL, retrying failed attempts with backoff
///
/// Every attempt opens a fresh renderer session. The task holds its URL's
/// in-flight slot until it reports.
async fn crawl_with_retries(
    renderer: Arc<dyn Renderer>,
    url: String,
    mut entry: PendingEntry,
    policy: RetryPolicy,
    abort: CancellationToken,
) -> TaskReport {
    loop {
        let attempt = tokio::select! {
            result = render_once(renderer.as_ref(), &url, policy.page_load_timeout) => result,
            _ = abort.cancelled() => return TaskReport::Aborted,
        };

        let error = match attempt {
            Ok(page) => {
                if !policy.request_delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(policy.request_delay) => {}
                        _ = abort.cancelled() => {}
                    }
                }
                return TaskReport::Rendered(page);
            }
            Err(e) if e.is_fatal() => return TaskReport::Fatal(e),
            Err(e) => e,
        };

        entry.record_failure(error.to_string());

        if !error.is_retryable() || !entry.can_retry(policy.max_retries) {
            return TaskReport::Exhausted { entry, error };
        }

        let delay = policy.backoff(entry.retry_count, &error);
        tracing::warn!(
            "Attempt {} for {} failed: {}; retrying in {:?}",
            entry.retry_count,
            url,
            error,
            delay
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = abort.cancelled() => return TaskReport::Aborted,
        }
    }
}

/// One attempt: open a session, render under the timeout, close the session
async fn render_once(
    renderer: &dyn Renderer,
    url: &str,
    timeout: Duration,
) -> std::result::Result<RenderedPage, RenderError> {
    let mut session = renderer.new_session().await?;

    let result = match tokio::time::timeout(timeout, session.fetch_and_render(url)).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::Timeout),
    };

    session.close().await;
    result
}
