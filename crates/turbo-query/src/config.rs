//! Configuration file support.

use std::path::Path;

use serde::{Deserialize, Serialize};
use turbo_cache::CacheConfig;

use crate::error::ConfigError;

/// Top-level configuration.
///
/// ```toml
/// [cache]
/// default_ttl_ms = 60000
///
/// [log]
/// level = "debug"
/// format = "json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Cache store configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

impl QueryConfig {
    /// Load config from a file, as JSON if the extension is `.json` and
    /// TOML otherwise.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the cache can't work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.default_ttl_ms == 0 {
            return Err(ConfigError::Invalid(
                "cache.default_ttl_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format (for development).
    #[default]
    Human,
    /// JSON format (for log aggregation).
    Json,
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = QueryConfig::from_toml_str("").unwrap();
        assert_eq!(config, QueryConfig::default());
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, LogFormat::Human);
    }

    #[test]
    fn test_toml_sections() {
        let config = QueryConfig::from_toml_str(
            r#"
            [cache]
            default_ttl_ms = 1000

            [log]
            level = "turbo_query=trace"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.default_ttl(), Duration::from_secs(1));
        assert_eq!(config.log.level, "turbo_query=trace");
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_zero_ttl_is_invalid() {
        let err = QueryConfig::from_toml_str("[cache]\ndefault_ttl_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = QueryConfig::from_toml_str("[cache\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("turbo-query.json");
        let mut file = std::fs::File::create(&json_path).unwrap();
        write!(file, r#"{{"cache": {{"default_ttl_ms": 2000}}}}"#).unwrap();
        let config = QueryConfig::load(&json_path).unwrap();
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(2));

        let toml_path = dir.path().join("turbo-query.toml");
        std::fs::write(&toml_path, "[log]\nlevel = \"debug\"\n").unwrap();
        let config = QueryConfig::load(&toml_path).unwrap();
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        let err = QueryConfig::load("/nonexistent/turbo-query.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
