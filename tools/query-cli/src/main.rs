//! Turbo Query CLI - drive fetch coordinators against simulated sources.
//!
//! Commands:
//! - `turbo-query run` - Run readers for one cache key and report what each observed
//! - `turbo-query config` - Show the effective configuration

mod commands;
mod context;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{ConfigArgs, RunArgs};

/// Turbo Query CLI - exercise cached data fetching
#[derive(Parser)]
#[command(name = "turbo-query")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run coordinators for a cache key against a simulated fetcher
    Run(RunArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);

    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    logging::init(&ctx.config.log, cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
