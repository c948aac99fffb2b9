//! docsweep: incremental documentation crawler
//!
//! This crate crawls one or more documentation sites under a bounded concurrency
//! ceiling and merges every rendered page into a durable, append-only JSON
//! document store per source.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

pub use crawler::RenderError;
pub use storage::StoreError;

/// Main error type for docsweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The renderer could not be started at all; aborts the run
    #[error("Renderer initialization failed: {0}")]
    RendererInit(RenderError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Source '{0}' is already registered")]
    DuplicateSource(String),

    #[error("Invalid source '{name}': {reason}")]
    InvalidSource { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for docsweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Scheduler};
pub use state::Source;
pub use storage::{PageRecord, PersistencePipeline};
pub use url::{normalize, without_fragment};
