//! Cache store configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_TTL;

/// Configuration for a [`CacheStore`](crate::CacheStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default time-to-live in milliseconds, used when a write names none.
    pub default_ttl_ms: u64,
}

impl CacheConfig {
    /// Create a configuration with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl_ms: default_ttl.as_millis() as u64,
        }
    }

    /// Default TTL as a duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_five_minutes() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl_ms, 300_000);
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_deserialize_missing_field_uses_default() {
        let config: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CacheConfig::default());

        let config: CacheConfig = serde_json::from_str(r#"{"default_ttl_ms": 1000}"#).unwrap();
        assert_eq!(config.default_ttl(), Duration::from_secs(1));
    }
}
