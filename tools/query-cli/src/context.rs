//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use turbo_query::{CacheStore, QueryConfig};

use crate::output::Output;

/// Config file names searched for, in order, in each directory.
const CONFIG_NAMES: [&str; 3] = ["turbo-query.toml", ".turbo-query.toml", "turbo-query.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// Effective configuration.
    pub config: QueryConfig,
    /// Where the configuration came from, if a file.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
}

impl Context {
    /// Load context from a config file, or search for one.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let (config, config_path) = if let Some(path) = config_path {
            let config = QueryConfig::load(path)
                .with_context(|| format!("Failed to load config file: {}", path))?;
            (config, Some(PathBuf::from(path)))
        } else {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            match Self::find_config(&cwd) {
                Some((config, path)) => (config, Some(path)),
                None => (QueryConfig::default(), None),
            }
        };

        Ok(Self {
            config,
            config_path,
            output,
        })
    }

    /// Find a config file in the directory tree.
    fn find_config(start: &Path) -> Option<(QueryConfig, PathBuf)> {
        let mut current = start.to_path_buf();
        loop {
            for name in &CONFIG_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    if let Ok(config) = QueryConfig::load(&config_path) {
                        return Some((config, config_path));
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Build a cache store from the configuration.
    pub fn store(&self) -> CacheStore {
        CacheStore::from_config(&self.config.cache)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_find_config_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("turbo-query.toml"),
            "[cache]\ndefault_ttl_ms = 1500\n",
        )
        .unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, path) = Context::find_config(&nested).unwrap();
        assert_eq!(config.cache.default_ttl(), Duration::from_millis(1500));
        assert_eq!(path, dir.path().join("turbo-query.toml"));
    }

    #[test]
    fn test_explicit_config_errors_are_reported() {
        let output = Output::new(false, true);
        assert!(Context::load(Some("/nonexistent/turbo-query.toml"), output).is_err());
    }
}
