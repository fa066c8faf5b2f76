//! Starbridge proxy binary.
//!
//! # Usage
//!
//! ```bash
//! # First run: writes ~/.starbridge/config.json and exits
//! starbridge
//!
//! # After editing the config
//! starbridge --config ~/.starbridge -v
//! ```

use std::path::PathBuf;

use clap::Parser;
use starbridge_server::{ConfigManager, Proxy, ServerError, Store};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Transparent proxy server for the game wire protocol.
#[derive(Parser, Debug)]
#[command(name = "starbridge")]
#[command(about = "Transparent game-protocol proxy with plugin hooks")]
#[command(version)]
struct Args {
    /// Path to the configuration directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enables verbose (debug) output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn default_config_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(".starbridge")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose >= 1 { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config_dir = args.config.unwrap_or_else(default_config_dir);
    let manager = match ConfigManager::load(&config_dir) {
        Ok(manager) => manager,
        Err(err @ ServerError::FirstRun(_)) => {
            tracing::warn!("{err}");
            return Err(err.into());
        },
        Err(err) => return Err(err.into()),
    };

    let store = Store::open(manager.database_path())?;

    let proxy = Proxy::bind(manager.config.clone(), store, Vec::new()).await?;
    tracing::info!(addr = %proxy.local_addr()?, "starbridge starting");

    proxy.run().await?;
    Ok(())
}
