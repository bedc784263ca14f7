//! Tap-to-trade client entry point.
//!
//! The binary owns the channel endpoints: the renderer pushes resolved
//! taps into `tap_tx` and the ticker integration pushes price samples
//! into `tick_tx`. Everything downstream of those channels is wired by
//! `Application`.

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

/// Tap-to-trade grid trading client
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TAPGRID_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tapgrid_telemetry::init_logging()?;

    info!("Starting tapgrid v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path: CLI arg > TAPGRID_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TAPGRID_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = tapgrid_client::AppConfig::from_file(&config_path)?;

    let app = tapgrid_client::Application::new(config)?;

    // Integration points for the ticker feed and the renderer.
    let (_tick_tx, tick_rx) = mpsc::channel(1024);
    let (_tap_tx, tap_rx) = mpsc::channel(64);

    app.run(tick_rx, tap_rx).await?;

    Ok(())
}
