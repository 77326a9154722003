//! CLI command implementations.

pub mod config;
pub mod run;

use clap::Args;

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Cache key the readers share.
    #[arg(short, long, default_value = "products")]
    pub key: String,

    /// Simulated fetch latency in milliseconds.
    #[arg(long, default_value = "50")]
    pub delay_ms: u64,

    /// Make the simulated fetch fail with this message.
    #[arg(long)]
    pub fail: Option<String>,

    /// Number of readers started one after another.
    #[arg(short, long, default_value = "2")]
    pub readers: usize,

    /// Pause between readers in milliseconds.
    #[arg(long, default_value = "10")]
    pub gap_ms: u64,

    /// TTL override for this key, in milliseconds.
    #[arg(long)]
    pub ttl_ms: Option<u64>,

    /// Refetch each reader once after it settles.
    #[arg(long)]
    pub refetch: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    /// Also validate the configuration and fail if it is unusable.
    #[arg(long)]
    pub check: bool,
}
