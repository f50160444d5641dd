//! Relay HTTP boundary
//!
//! Three endpoints: `POST /relay` accepts a signed transaction envelope,
//! fee-bumps it with the sponsor key and submits it; `GET /health` and
//! `GET /metrics` serve liveness and Prometheus text.
//!
//! Submissions are serialized per inner-transaction source account (two
//! concurrent envelopes from the same payer would race on the sequence
//! number and one would bounce) and rate-limited per client IP. Internal
//! errors are translated into structured JSON; stack traces never leave the
//! process.

pub mod relay;

use actix_web::{web, App, HttpResponse, HttpServer};
use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics::METRICS;
use crate::network::{LedgerService, SorobanNode};
use crate::signer::TxSigner;
use crate::strkey::AccountId;

pub const SERVICE_NAME: &str = "gasolina-relay";

type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Everything the relay handlers need, built once at startup.
pub struct RelayState {
    pub node: Arc<dyn SorobanNode>,
    pub ledger: Arc<dyn LedgerService>,
    pub sponsor: Arc<dyn TxSigner>,
    pub network_passphrase: String,
    pub fee_bump_margin: u64,
    pub min_sponsor_balance_scaled: i128,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    payer_locks: DashMap<AccountId, Arc<tokio::sync::Mutex<()>>>,
    limiter: IpLimiter,
}

impl RelayState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node: Arc<dyn SorobanNode>,
        ledger: Arc<dyn LedgerService>,
        sponsor: Arc<dyn TxSigner>,
        network_passphrase: &str,
        fee_bump_margin: u64,
        min_sponsor_balance_scaled: i128,
        rate_limit_per_minute: u32,
        poll_attempts: u32,
        poll_interval: Duration,
    ) -> Self {
        let per_minute = NonZeroU32::new(rate_limit_per_minute.max(1)).expect("non-zero");
        Self {
            node,
            ledger,
            sponsor,
            network_passphrase: network_passphrase.to_string(),
            fee_bump_margin,
            min_sponsor_balance_scaled,
            poll_attempts,
            poll_interval,
            payer_locks: DashMap::new(),
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
        }
    }

    /// One mutex per payer account; held across submit and poll so a second
    /// envelope from the same payer waits for the first to resolve.
    pub(crate) fn payer_lock(&self, payer: &AccountId) -> Arc<tokio::sync::Mutex<()>> {
        self.payer_locks
            .entry(payer.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    pub(crate) fn allow(&self, peer: &str) -> bool {
        self.limiter.check_key(&peer.to_string()).is_ok()
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": SERVICE_NAME,
    }))
}

async fn metrics_text() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(METRICS.gather())
}

/// Route table shared by the real server and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/relay", web::post().to(relay::relay_handler))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_text));
}

/// Bind and run the relay server until shutdown.
pub async fn run(state: Arc<RelayState>, bind_address: &str, port: u16) -> anyhow::Result<()> {
    let data = web::Data::from(state);
    tracing::info!(%bind_address, port, "relay server listening");
    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind((bind_address, port))?
        .run()
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::LocalKeySigner;
    use crate::test_utils::{test_account, MockLedger, MockNode, TEST_PASSPHRASE};

    fn state() -> RelayState {
        RelayState::new(
            Arc::new(MockNode::new(TEST_PASSPHRASE)),
            Arc::new(MockLedger::new()),
            Arc::new(LocalKeySigner::generate()),
            TEST_PASSPHRASE,
            100,
            100_000,
            2,
            30,
            Duration::from_millis(1),
        )
    }

    #[test]
    fn test_same_payer_shares_one_lock() {
        let state = state();
        let a = state.payer_lock(&test_account(1));
        let b = state.payer_lock(&test_account(1));
        let c = state.payer_lock(&test_account(2));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_payer_lock_serializes_submissions() {
        let state = Arc::new(state());
        let lock = state.payer_lock(&test_account(1));
        let guard = lock.lock().await;
        // A second submission for the same payer must wait
        let second = state.payer_lock(&test_account(1));
        assert!(second.try_lock().is_err());
        drop(guard);
        assert!(second.try_lock().is_ok());
    }

    #[test]
    fn test_rate_limiter_caps_per_key() {
        let state = state();
        assert!(state.allow("10.0.0.1"));
        assert!(state.allow("10.0.0.1"));
        // Budget of 2 per minute exhausted
        assert!(!state.allow("10.0.0.1"));
        // Other clients are unaffected
        assert!(state.allow("10.0.0.2"));
    }
}
