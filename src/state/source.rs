use crate::config::SourceEntry;
use crate::storage::StoreSource;
use crate::url::{Pattern, PatternKind};
use crate::{ConfigError, SweepError};
use url::Url;

/// A documentation site registered for crawling
///
/// Immutable once built. Identity is the name, compared case-insensitively.
#[derive(Debug, Clone)]
pub struct Source {
    name: String,
    base_url: String,
    host: String,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl Source {
    /// Creates a source from already compiled patterns
    ///
    /// # Returns
    ///
    /// * `Ok(Source)` - The name is non-empty and the base URL is an http(s) URL with a host
    /// * `Err(SweepError::InvalidSource)` - Otherwise
    pub fn new(
        name: &str,
        base_url: &str,
        include: Vec<Pattern>,
        exclude: Vec<Pattern>,
    ) -> Result<Self, SweepError> {
        build(name, base_url, include, exclude).map_err(|reason| SweepError::InvalidSource {
            name: name.to_string(),
            reason,
        })
    }

    /// Creates a source from its config entry, compiling its patterns
    ///
    /// Plain include strings are wildcards; plain exclude strings are regular
    /// expressions.
    pub fn from_entry(entry: &SourceEntry) -> Result<Self, ConfigError> {
        let include = compile_all(&entry.name, &entry.include_patterns, PatternKind::Wildcard)?;
        let exclude = compile_all(&entry.name, &entry.exclude_patterns, PatternKind::Regex)?;

        build(&entry.name, &entry.url, include, exclude)
            .map_err(|reason| ConfigError::InvalidUrl(format!("source '{}': {}", entry.name, reason)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-folded name used as the identity key
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lowercase host of the base URL
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn include_patterns(&self) -> &[Pattern] {
        &self.include
    }

    pub fn exclude_patterns(&self) -> &[Pattern] {
        &self.exclude
    }

    /// The `source` header written into this source's document store
    pub fn store_source(&self) -> StoreSource {
        StoreSource {
            name: self.name.clone(),
            url: self.base_url.clone(),
        }
    }
}

fn build(
    name: &str,
    base_url: &str,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
) -> Result<Source, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("name cannot be empty".to_string());
    }

    let parsed = Url::parse(base_url).map_err(|e| format!("invalid URL '{}': {}", base_url, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!(
            "URL '{}' must use http or https, got {}",
            base_url,
            parsed.scheme()
        ));
    }
    let host = parsed
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or_else(|| format!("URL '{}' has no host", base_url))?;

    Ok(Source {
        name: name.to_string(),
        base_url: base_url.to_string(),
        host,
        include,
        exclude,
    })
}

fn compile_all(
    source: &str,
    entries: &[crate::config::PatternEntry],
    plain: PatternKind,
) -> Result<Vec<Pattern>, ConfigError> {
    entries
        .iter()
        .map(|entry| {
            Pattern::from_entry(entry, plain).map_err(|e| {
                ConfigError::InvalidPattern(format!("source '{}': {:?}: {}", source, entry, e))
            })
        })
        .collect()
}
