//! End-to-end sponsored payment driver
//!
//! Runs the full four-step flow against configured endpoints: estimate the
//! fee swap, build the payment bundle, simulate, have the caller approve
//! their authorization entry, then assemble, submit and poll as the payer.
//! Both roles run in this process; the handoff messages still cross the
//! role boundary as values.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use gasolina::config::Config;
use gasolina::horizon::HorizonClient;
use gasolina::network::LedgerService;
use gasolina::protocol::bundle::{build_payment_bundle, BundleContracts, SponsoredPayment};
use gasolina::protocol::estimator::{
    estimate_max_spend_in_fee_token, ExchangeRate, FeeEstimator, MaxSpendParams,
};
use gasolina::protocol::handoff::{run_sponsored_call, BackendRole, FrontendRole};
use gasolina::rpc::NodeClient;
use gasolina::signer::LocalKeySigner;
use gasolina::strkey::AccountId;

/// Secret seed of the caller, never passed on the command line.
const CALLER_SECRET_ENV: &str = "GASOLINA_CALLER_SECRET";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Recipient account (G...)
    #[arg(short, long)]
    recipient: String,

    /// Amount in the fee token's smallest units
    #[arg(short, long)]
    amount: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_file_with_env(&args.config).context("Failed to load configuration")?;
    let recipient = AccountId::from_str(&args.recipient)
        .map_err(|e| anyhow::anyhow!("invalid recipient: {e}"))?;
    let amount: i128 = args.amount.parse().context("invalid amount")?;

    let caller_secret =
        std::env::var(CALLER_SECRET_ENV).context("caller secret not set (GASOLINA_CALLER_SECRET)")?;
    let caller = Arc::new(
        LocalKeySigner::from_secret_seed(&caller_secret)
            .map_err(|e| anyhow::anyhow!("invalid caller secret: {e}"))?,
    );
    let payer = Arc::new(
        LocalKeySigner::from_secret_seed(config.sponsor_secret()?)
            .map_err(|e| anyhow::anyhow!("invalid sponsor secret: {e}"))?,
    );
    info!("caller: {}", caller.public_key());
    info!("payer: {}", payer.public_key());
    info!("recipient: {recipient}");

    let node = Arc::new(NodeClient::new(&config.network.rpc_url));
    let ledger = Arc::new(HorizonClient::new(&config.network.horizon_url));

    // Frontend side: estimate and build the bundle. The minimum per-op fee
    // comes from the ledger service, the multiplier from configuration.
    let stats = ledger.fee_stats().await?;
    let estimator = FeeEstimator::new(stats.base_fee, config.estimator.fee_multiplier);
    let fee_native = estimator.estimate_fee_in_native();
    let max_spend = estimate_max_spend_in_fee_token(MaxSpendParams {
        margin_scaled: i128::from(config.estimator.margin_scaled),
        estimated_native: fee_native,
        rate: ExchangeRate::from_scaled(i128::from(config.estimator.rate_scaled))?,
    })?;
    info!(fee_native, max_spend, "estimated fee swap");

    let call = build_payment_bundle(
        &caller.public_key(),
        &BundleContracts {
            fee_token: config.contracts.fee_token.clone(),
            native_token: config.contracts.native_token.clone(),
            swap_router: config.contracts.swap_router.clone(),
        },
        &SponsoredPayment { recipient, amount },
        fee_native,
        max_spend,
    )?;

    let backend = BackendRole::new(
        node.clone(),
        ledger,
        payer,
        config.contracts.router.clone(),
        &config.network.network_passphrase,
        stats.base_fee,
    )
    .with_polling(
        config.polling.max_attempts,
        Duration::from_millis(config.polling.interval_ms),
    );
    let frontend = FrontendRole::new(caller, node);

    let outcome = run_sponsored_call(&backend, &frontend, &call)
        .await?
        .ensure_confirmed()?;
    info!(hash = %outcome.hash, status = ?outcome.status, "payment confirmed");
    Ok(())
}
