//! Gasolina relay server
//!
//! Entry point for the relay backend: loads configuration, builds the
//! Horizon and node clients, derives the sponsor identity from its secret
//! seed and serves the relay HTTP endpoints.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gasolina::config::Config;
use gasolina::horizon::HorizonClient;
use gasolina::rpc::NodeClient;
use gasolina::server::{self, RelayState};
use gasolina::signer::LocalKeySigner;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    info!("🚀 Starting Gasolina relay");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("📋 Loading configuration from: {}", args.config);
    let config =
        Config::from_file_with_env(&args.config).context("Failed to load configuration")?;

    let sponsor = LocalKeySigner::from_secret_seed(config.sponsor_secret()?)
        .map_err(|e| anyhow::anyhow!("invalid sponsor secret: {e}"))?;
    info!("🔑 Sponsor address: {}", sponsor.public_key());
    info!("📡 Node RPC: {}", config.network.rpc_url);
    info!("📒 Ledger service: {}", config.network.horizon_url);

    let node = Arc::new(NodeClient::new(&config.network.rpc_url));
    let ledger = Arc::new(HorizonClient::new(&config.network.horizon_url));
    let state = Arc::new(RelayState::new(
        node,
        ledger,
        Arc::new(sponsor),
        &config.network.network_passphrase,
        config.relay.fee_bump_margin,
        i128::from(config.relay.min_sponsor_balance_scaled),
        config.relay.rate_limit_per_minute,
        config.polling.max_attempts,
        Duration::from_millis(config.polling.interval_ms),
    ));

    let port = args.port.unwrap_or(config.relay.port);
    server::run(state, &config.relay.bind_address, port).await
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}
