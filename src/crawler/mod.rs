//! Crawler module for rendering pages and driving the crawl
//!
//! This module contains the core crawling logic, including:
//! - The renderer interface and an HTTP implementation
//! - HTML parsing and link extraction
//! - The frontier of pending and in-flight URLs
//! - The bounded-concurrency scheduler

mod fetcher;
mod frontier;
mod parser;
mod renderer;
mod scheduler;

pub use fetcher::{build_http_client, fetch_html, FetchedHtml, HttpRenderer};
pub use frontier::{Claim, ClaimOutcome, Frontier};
pub use parser::{parse_html, ParsedPage};
pub use renderer::{RenderError, RenderSession, RenderedPage, Renderer};
pub use scheduler::{RetryPolicy, Scheduler};

use crate::config::Config;
use crate::output::CrawlSummary;
use crate::state::Source;
use crate::storage::{PersistencePipeline, PersistenceSettings};
use crate::{Result, SweepError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP renderer and the persistence pipeline
/// 2. Register the configured sources (all of them, or those named in `only`)
/// 3. Crawl until every source is drained or `cancel` fires
/// 4. Flush every store
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `cancel` - Stops claiming new URLs when cancelled
/// * `only` - Source names to crawl, compared case-insensitively; empty means all
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - Per-source page counts
/// * `Err(SweepError)` - A source was invalid or the renderer failed to start
///
/// # Example
///
/// ```no_run
/// use docsweep::config::load_config;
/// use docsweep::crawler::run_crawl;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("docsweep.toml"))?;
/// let summary = run_crawl(&config, CancellationToken::new(), &[]).await?;
/// println!("{} pages", summary.total_pages());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    cancel: CancellationToken,
    only: &[String],
) -> Result<CrawlSummary> {
    let renderer = Arc::new(HttpRenderer::new(config.renderer.clone()));
    let pipeline = Arc::new(PersistencePipeline::new(PersistenceSettings::from(
        &config.output,
    )));

    let mut scheduler =
        Scheduler::new(renderer, pipeline, config.crawler.clone()).with_cancellation(cancel);

    for entry in selected_sources(config, only)? {
        scheduler.add_source(Source::from_entry(entry)?)?;
    }

    scheduler.run().await
}

/// Source entries picked by name, or all of them
pub fn selected_sources<'a>(
    config: &'a Config,
    only: &[String],
) -> Result<Vec<&'a crate::config::SourceEntry>> {
    if only.is_empty() {
        return Ok(config.sources.iter().collect());
    }

    only.iter()
        .map(|name| {
            config
                .sources
                .iter()
                .find(|s| s.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| SweepError::InvalidSource {
                    name: name.clone(),
                    reason: "not defined in the configuration".to_string(),
                })
        })
        .collect()
}
