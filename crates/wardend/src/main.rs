//! wardend - the trading-window supervisor daemon
//!
//! This is the main entry point. It wires together:
//! - Configuration loading
//! - The Unix process host
//! - Signal handling (SIGINT/SIGTERM/SIGHUP)
//! - The supervisor loop

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;
use warden_config::load_config;
use warden_core::Supervisor;
use warden_host::UnixHost;

/// wardend - restricts a trading bot to its configured daily window
#[derive(Parser, Debug)]
#[command(name = "wardend")]
#[command(about = "Trading-hours supervisor for a bot subprocess", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "warden.toml", env = "WARDEN_CONFIG")]
    config: PathBuf,

    /// Forward --live to the bot command
    #[arg(long)]
    live: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "wardend starting");

    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if args.live {
        config.bot.argv.push("--live".into());
    }

    // Set up signal handlers
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            _ = sighup.recv() => info!("Received SIGHUP, shutting down gracefully"),
        }
        let _ = shutdown_tx.send(true);
    });

    let supervisor = Supervisor::new(config, UnixHost::new(), shutdown_rx);
    supervisor.run().await?;

    info!("Shutdown complete");
    Ok(())
}
