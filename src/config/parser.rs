use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use docsweep::config::load_config;
///
/// let config = load_config(Path::new("docsweep.toml")).unwrap();
/// println!("Max concurrency: {}", config.crawler.max_concurrency);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
///
/// # Example
///
/// ```
/// use docsweep::config::parse_config;
///
/// let config = parse_config(r#"
/// [[source]]
/// name = "docs"
/// url = "https://docs.example.com"
/// "#).unwrap();
/// assert_eq!(config.crawler.max_concurrency, 5);
/// assert_eq!(config.output.data_dir, "./data");
/// ```
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at the start of a run to tell configurations apart.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Loads a configuration and returns both the config and its hash
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - Successfully loaded configuration and its hash
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatternEntry;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
max-concurrency = 2
max-retries = 4
retry-delay-ms = 500
request-delay-ms = 0
page-load-timeout-ms = 10000

[renderer]
user-agent = "TestCrawler/1.0"

[output]
data-dir = "./test-data"
debounce-ms = 200

[[source]]
name = "docs"
url = "https://x.test/a"
include-patterns = ["/a/*"]
exclude-patterns = ["/v1/", { glob = "*.pdf" }]

[[source]]
name = "api"
url = "https://api.x.test"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_concurrency, 2);
        assert_eq!(config.crawler.max_retries, 4);
        assert_eq!(config.renderer.user_agent, "TestCrawler/1.0");
        assert_eq!(config.output.data_dir, "./test-data");
        assert_eq!(config.output.debounce_ms, 200);
        // Unset keys keep their defaults
        assert_eq!(config.output.lock_stale_ms, 30_000);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(
            config.sources[0].exclude_patterns,
            vec![
                PatternEntry::Plain("/v1/".to_string()),
                PatternEntry::Glob {
                    glob: "*.pdf".to_string()
                }
            ]
        );
        assert!(config.sources[1].include_patterns.is_empty());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let config_content = "this is not valid TOML {{{";
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawler]
max-concurrency = 0

[[source]]
name = "docs"
url = "https://x.test"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_sources_sharing_a_store_file_rejected() {
        let result = parse_config(
            r#"
[[source]]
name = "React Docs"
url = "https://react.test"

[[source]]
name = "react-docs"
url = "https://other.test"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let config_content = "test content";
        let file = create_temp_config(config_content);

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        // Same content should produce same hash
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 produces 64 hex characters
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_load_with_hash_matches_file_hash() {
        let file = create_temp_config(
            r#"
[[source]]
name = "docs"
url = "https://x.test"
"#,
        );

        let (config, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(config.sources[0].name, "docs");
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
    }
}
