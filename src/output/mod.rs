//! Output module for crawl summaries and store statistics
//!
//! This module handles:
//! - The per-source summary returned by a crawl run
//! - Reading page counts back from the document stores
//! - Printing both for the CLI

pub mod stats;

pub use stats::{
    load_statistics, print_statistics, print_summary, CrawlSummary, SourceSummary, StoreState,
    StoreStatistics,
};
