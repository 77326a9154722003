//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;
use turbo_query::{LogConfig, LogFormat};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level; `--verbose` raises the
/// configured level to `debug`.
pub fn init(config: &LogConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.format {
        LogFormat::Human => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if let Err(e) = result {
        eprintln!("failed to install log subscriber: {}", e);
    }
}
