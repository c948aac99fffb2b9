use serde::Deserialize;

/// Main configuration structure for docsweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum number of URLs processing at the same time
    pub max_concurrency: u32,

    /// Attempts allowed per URL before it is recorded as an error page
    pub max_retries: u32,

    /// Backoff base between attempts (milliseconds)
    pub retry_delay_ms: u64,

    /// Pause a worker holds after each rendered page (milliseconds)
    pub request_delay_ms: u64,

    /// Per-attempt renderer timeout (milliseconds)
    pub page_load_timeout_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            max_retries: 3,
            retry_delay_ms: 1000,
            request_delay_ms: 250,
            page_load_timeout_ms: 30_000,
        }
    }
}

/// Settings for the built-in HTTP renderer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RendererConfig {
    pub user_agent: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("docsweep/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Directory holding one JSON document store per source
    pub data_dir: String,

    /// Window in which saves for one source are absorbed into a single flush
    pub debounce_ms: u64,

    /// Age after which an existing lock file is treated as abandoned
    pub lock_stale_ms: u64,

    /// Interval between lock acquisition attempts
    pub lock_poll_ms: u64,

    /// Give up acquiring a lock after this long
    pub lock_timeout_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            debounce_ms: 1000,
            lock_stale_ms: 30_000,
            lock_poll_ms: 100,
            lock_timeout_ms: 60_000,
        }
    }
}

/// A documentation site to crawl
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceEntry {
    /// Source name, compared case-insensitively
    pub name: String,

    /// Base URL; also the seed of the crawl
    pub url: String,

    #[serde(default)]
    pub include_patterns: Vec<PatternEntry>,

    #[serde(default)]
    pub exclude_patterns: Vec<PatternEntry>,
}

/// A path pattern as written in the config file
///
/// A plain string is a wildcard in `include-patterns` and a regular expression
/// in `exclude-patterns`; the table forms name the kind explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PatternEntry {
    Plain(String),
    Regex { regex: String },
    Glob { glob: String },
}
