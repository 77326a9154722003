//! Error types for fetching and configuration.

use std::any::Any;
use std::path::PathBuf;

/// Error returned by a fetcher.
///
/// This is the only failure the coordinator models. It is stored in the
/// coordinator state and surfaced to the caller as-is; nothing retries it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Request error: {0}")]
    Request(String),

    /// The fetcher panicked instead of returning.
    #[error("Fetcher panicked: {0}")]
    Panicked(String),
}

impl FetchError {
    /// Build an HTTP error from a status code and URL.
    pub fn http(status: u16, url: impl Into<String>) -> Self {
        Self::Http {
            status,
            url: url.into(),
        }
    }

    /// HTTP status code, if this is an HTTP error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an error from a caught panic payload.
    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panicked(message)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Deserialization(e.to_string())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// The configuration parsed but holds an unusable value.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(
            FetchError::http(503, "/api/products").to_string(),
            "HTTP error: 503 for /api/products"
        );
        assert_eq!(
            FetchError::Connection("network".into()).to_string(),
            "Connection error: network"
        );
    }

    #[test]
    fn test_status() {
        assert_eq!(FetchError::http(404, "/x").status(), Some(404));
        assert_eq!(FetchError::Timeout("slow".into()).status(), None);
    }

    #[test]
    fn test_panicked_keeps_message() {
        assert_eq!(
            FetchError::panicked(Box::new("boom")),
            FetchError::Panicked("boom".into())
        );
        assert_eq!(
            FetchError::panicked(Box::new(format!("bad {}", 7))),
            FetchError::Panicked("bad 7".into())
        );
        assert_eq!(
            FetchError::panicked(Box::new(3u8)).to_string(),
            "Fetcher panicked: non-string panic payload"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(FetchError::from(err), FetchError::Deserialization(_)));
    }
}
