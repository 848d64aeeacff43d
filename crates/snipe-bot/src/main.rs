//! Upbit listing sniper - entry point.
//!
//! Watches the Upbit announcements feed through a proxy pool and opens
//! leveraged Bitget longs for every subscribed user the moment a new
//! trading-support notice lands.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Upbit listing sniper
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a .env file (defaults to ./.env when present)
    #[arg(short, long)]
    env_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    snipe_telemetry::init_logging()?;

    info!("Starting snipe-bot v{}", env!("CARGO_PKG_VERSION"));

    let config = snipe_bot::AppConfig::from_env()?;
    let app = snipe_bot::Application::new(config)?;

    // Informational: a skewed local clock breaks signed timestamps
    app.report_clock_sync().await;

    app.run().await?;
    Ok(())
}
