//! Pinger daemon binary
//!
//! Periodically probes the configured and inventory-supplied URLs and
//! publishes their availability and traits.

use clap::Parser;
use daemon::bootstrap::{bootstrap, load_config, run_once, Components};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "pingerd")]
#[command(about = "Periodically probes monitored URLs and publishes their availability")]
#[command(version)]
struct Args {
    /// Path to a TOML config
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Newline-delimited inventory events to read ("-" for stdin)
    #[arg(long, value_name = "FILE")]
    events: Option<PathBuf>,

    /// Log level, overriding the config's logLevel
    #[arg(long)]
    log_level: Option<String>,

    /// Run a single cycle, print its report as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> daemon::Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    pinger_core::utils::init_tracing(level)?;

    if args.once {
        let components = Components::production(&config)?;
        let report = run_once(&config, args.events.as_deref(), components).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    info!("Starting pinger daemon");
    let handle = bootstrap(config, args.events.as_deref()).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    handle.shutdown().await;

    info!("Daemon stopped");
    Ok(())
}
