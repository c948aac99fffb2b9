//! docsweep main entry point
//!
//! This is the command-line interface for the docsweep documentation crawler.

use anyhow::Context;
use clap::Parser;
use docsweep::config::{load_config_with_hash, Config, PatternEntry};
use docsweep::crawler::{run_crawl, selected_sources};
use docsweep::output::{load_statistics, print_statistics, print_summary};
use docsweep::storage::{JsonStore, LockSettings};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// docsweep: an incremental documentation crawler
///
/// docsweep crawls documentation sites under a concurrency ceiling and
/// merges every page into a JSON document store per source, keeping what
/// earlier runs collected.
#[derive(Parser, Debug)]
#[command(name = "docsweep")]
#[command(version)]
#[command(about = "An incremental documentation crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Move existing stores aside before crawling
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the document stores and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Only crawl the named source (repeatable)
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &cli.sources)?;
    } else if cli.stats {
        handle_stats(&config).await?;
    } else {
        handle_crawl(&config, &cli.sources, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docsweep=info,warn"),
            1 => EnvFilter::new("docsweep=debug,info"),
            2 => EnvFilter::new("docsweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn describe_pattern(pattern: &PatternEntry, plain_kind: &str) -> String {
    match pattern {
        PatternEntry::Plain(p) => format!("{} ({})", p, plain_kind),
        PatternEntry::Regex { regex } => format!("{} (regex)", regex),
        PatternEntry::Glob { glob } => format!("{} (wildcard)", glob),
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, only: &[String]) -> anyhow::Result<()> {
    println!("=== docsweep Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Retry delay: {}ms", config.crawler.retry_delay_ms);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Page load timeout: {}ms", config.crawler.page_load_timeout_ms);

    println!("\nRenderer:");
    println!("  User agent: {}", config.renderer.user_agent);

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir);
    println!("  Debounce: {}ms", config.output.debounce_ms);

    let sources = selected_sources(config, only)?;
    println!("\nSources ({}):", sources.len());
    for source in &sources {
        println!("  - {} <{}>", source.name, source.url);
        for pattern in &source.include_patterns {
            println!("    include {}", describe_pattern(pattern, "wildcard"));
        }
        for pattern in &source.exclude_patterns {
            println!("    exclude {}", describe_pattern(pattern, "regex"));
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling {} sources", sources.len());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the document stores
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Data directory: {}\n", config.output.data_dir);

    let stats = load_statistics(config).await?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, only: &[String], fresh: bool) -> anyhow::Result<()> {
    if fresh {
        let lock = LockSettings::from(&config.output);
        for source in selected_sources(config, only)? {
            let store = JsonStore::for_source(
                Path::new(&config.output.data_dir),
                &source.name,
                lock.clone(),
            );
            if let Some(moved) = store.reset().await? {
                tracing::info!(
                    "Moved previous store for {} to {}",
                    source.name,
                    moved.display()
                );
            }
        }
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            on_signal.cancel();
        }
    });

    match run_crawl(config, cancel, only).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
