//! Run summaries and store statistics
//!
//! This module provides the per-source summary returned by a crawl run and
//! the statistics read back from the document stores on disk.

use crate::config::Config;
use crate::state::GroupStatus;
use crate::storage::{JsonStore, LockSettings, StoreError};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Outcome of one source in a crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub name: String,

    /// Pages recorded this run, including error placeholders
    pub pages: usize,

    /// Error placeholders among `pages`
    pub error_pages: usize,

    /// URLs that exhausted their retries
    pub failed: usize,

    pub status: GroupStatus,
}

impl SourceSummary {
    /// Pages recorded with real content
    pub fn crawled(&self) -> usize {
        self.pages.saturating_sub(self.error_pages)
    }
}

/// Result of a crawl run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub sources: Vec<SourceSummary>,
    pub elapsed: Duration,

    /// The run stopped early on request
    pub cancelled: bool,
}

impl CrawlSummary {
    pub fn total_pages(&self) -> usize {
        self.sources.iter().map(|s| s.pages).sum()
    }

    pub fn source(&self, name: &str) -> Option<&SourceSummary> {
        self.sources
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// Prints a run summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");

    for source in &summary.sources {
        println!("{}:", source.name);
        println!("  Pages recorded: {}", source.pages);
        println!("  Crawled:        {}", source.crawled());
        println!("  Error pages:    {}", source.error_pages);
        println!("  Status:         {:?}", source.status);
        println!();
    }

    println!(
        "Total: {} pages in {:.1}s{}",
        summary.total_pages(),
        summary.elapsed.as_secs_f64(),
        if summary.cancelled { " (interrupted)" } else { "" }
    );
}

/// What was found on disk for one source
#[derive(Debug, Clone, PartialEq)]
pub enum StoreState {
    /// No store written yet
    Missing,

    Loaded {
        pages: usize,
        error_pages: usize,
        last_updated: DateTime<Utc>,
    },

    /// The file exists but is not a canonical store
    Unreadable(String),
}

/// Store statistics for one configured source
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    pub name: String,
    pub path: PathBuf,
    pub state: StoreState,
}

/// Reads the store of every configured source
///
/// # Arguments
///
/// * `config` - The loaded configuration
///
/// # Returns
///
/// * `Ok(Vec<StoreStatistics>)` - One entry per source, in config order
/// * `Err(StoreError)` - A store file could not be read at all
pub async fn load_statistics(config: &Config) -> Result<Vec<StoreStatistics>, StoreError> {
    let data_dir = Path::new(&config.output.data_dir);
    let lock = LockSettings::from(&config.output);

    let mut stats = Vec::new();
    for source in &config.sources {
        let store = JsonStore::for_source(data_dir, &source.name, lock.clone());
        let state = match store.load().await {
            Ok(Some(doc)) => StoreState::Loaded {
                pages: doc.pages.len(),
                error_pages: doc.error_page_count(),
                last_updated: doc.last_updated,
            },
            Ok(None) => StoreState::Missing,
            Err(StoreError::Json(e)) => StoreState::Unreadable(e.to_string()),
            Err(e) => return Err(e),
        };

        stats.push(StoreStatistics {
            name: source.name.clone(),
            path: store.path().to_path_buf(),
            state,
        });
    }

    Ok(stats)
}

/// Prints store statistics to stdout in a formatted manner
pub fn print_statistics(stats: &[StoreStatistics]) {
    println!("=== Store Statistics ===\n");

    let mut total = 0;
    for entry in stats {
        println!("{} ({}):", entry.name, entry.path.display());
        match &entry.state {
            StoreState::Missing => println!("  No store yet"),
            StoreState::Loaded {
                pages,
                error_pages,
                last_updated,
            } => {
                total += pages;
                println!("  Pages:        {}", pages);
                println!("  Error pages:  {}", error_pages);
                println!("  Last updated: {}", last_updated.to_rfc3339());
            }
            StoreState::Unreadable(reason) => println!("  Unreadable: {}", reason),
        }
        println!();
    }

    println!("Total: {} pages across {} sources", total, stats.len());
}
