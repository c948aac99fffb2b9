use crate::config::types::{Config, CrawlerConfig, OutputConfig, RendererConfig, SourceEntry};
use crate::state::Source;
use crate::storage::store_slug;
use crate::ConfigError;
use std::collections::{HashMap, HashSet};

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_renderer_config(&config.renderer)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.max_retries < 1 || config.max_retries > 20 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be between 1 and 20, got {}",
            config.max_retries
        )));
    }

    if config.page_load_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "page-load-timeout-ms must be >= 100ms, got {}ms",
            config.page_load_timeout_ms
        )));
    }

    Ok(())
}

fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    if config.lock_poll_ms == 0 {
        return Err(ConfigError::Validation(
            "lock-poll-ms must be >= 1".to_string(),
        ));
    }

    if config.lock_timeout_ms < config.lock_poll_ms {
        return Err(ConfigError::Validation(format!(
            "lock-timeout-ms ({}) must be >= lock-poll-ms ({})",
            config.lock_timeout_ms, config.lock_poll_ms
        )));
    }

    Ok(())
}

/// Validates source entries
///
/// Names must be non-empty, unique ignoring case, and map to distinct store
/// files; each entry must build a [`Source`], which checks its URL and
/// compiles its patterns.
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut files: HashMap<String, &str> = HashMap::new();
    for entry in sources {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source with url '{}' has an empty name",
                entry.url
            )));
        }

        if !seen.insert(entry.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                entry.name
            )));
        }

        let slug = store_slug(&entry.name);
        if let Some(other) = files.insert(slug.clone(), &entry.name) {
            return Err(ConfigError::Validation(format!(
                "sources '{}' and '{}' would share the store file {}.json",
                other, entry.name, slug
            )));
        }

        Source::from_entry(entry)?;
    }

    Ok(())
}
