//! Companion Camera Daemon - Main Entry Point

use anyhow::Context;
use camerad::{init_logging, probe_catalogs, run, DaemonConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Companion computer camera daemon")]
struct Args {
    /// TOML configuration file (default: ./camerad.toml if present)
    #[arg(long, env = "CAMERAD_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Print the video and still device catalogs as JSON and exit
    #[arg(long)]
    probe: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = DaemonConfig::load(args.config.as_deref()).context("loading configuration")?;

    if args.probe {
        let catalogs = probe_catalogs(&config.capture).await;
        println!("{}", serde_json::to_string_pretty(&catalogs)?);
        return Ok(());
    }

    init_logging(&config.log_level, config.log_json);
    info!("=== Companion Camera v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Settings file: {}", config.settings_path.display());

    run(config).await
}
