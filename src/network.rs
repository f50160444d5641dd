//! External collaborator interfaces
//!
//! The protocol consumes the ledger/account service and the Soroban node as
//! black boxes behind these traits. Production implementations live in
//! [`crate::horizon`] and [`crate::rpc`]; in-memory doubles live in
//! [`crate::test_utils`]. Nothing in `protocol` talks HTTP directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::protocol::auth::AuthorizationEntry;
use crate::protocol::errors::ProtocolError;
use crate::strkey::AccountId;

/// A classic asset reference used in path quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Asset {
    Native,
    Credit { code: String, issuer: AccountId },
}

/// Account state as reported by the ledger service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub sequence: i64,
    pub balances: Vec<Balance>,
}

impl AccountSnapshot {
    /// Native balance in 7-decimal scaled units, zero if absent.
    pub fn native_balance_scaled(&self) -> i128 {
        self.balances
            .iter()
            .find(|b| b.asset == Asset::Native)
            .map(|b| b.amount_scaled)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub asset: Asset,
    pub amount_scaled: i128,
}

/// Fee statistics from the ledger service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeStats {
    pub base_fee: u64,
    pub p95_fee: u64,
}

/// One strict-receive path record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRecord {
    pub source_asset: Asset,
    pub source_amount_scaled: i128,
    pub path: Vec<Asset>,
}

/// Ledger/account service (Horizon in production).
#[async_trait]
pub trait LedgerService: Send + Sync {
    async fn load_account(&self, id: &AccountId) -> Result<AccountSnapshot, ProtocolError>;

    async fn fee_stats(&self) -> Result<FeeStats, ProtocolError>;

    /// Paths able to deliver `dest_amount_scaled` of native to the source
    /// account.
    async fn strict_receive_paths(
        &self,
        source_account: &AccountId,
        dest_amount_scaled: i128,
    ) -> Result<Vec<PathRecord>, ProtocolError>;
}

/// Node response to a simulation request, before the protocol classifies it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSimulation {
    /// Node-reported failure, if any. Set means the whole attempt is dead.
    pub error: Option<String>,
    /// Authorization requirements discovered during recording-mode execution.
    pub auth: Vec<AuthorizationEntry>,
    /// Ledger entries the call will read and write.
    pub footprint: ResourceFootprint,
    /// Resource fee estimate in smallest native units.
    pub resource_fee: u64,
    /// Ledger sequence the node simulated against.
    pub latest_ledger: u32,
}

/// Resource footprint of a simulated call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFootprint {
    pub read_entries: Vec<String>,
    pub write_entries: Vec<String>,
    pub instructions: u64,
}

/// Outcome of handing a transaction to the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    pub hash: String,
    pub status: SendStatus,
    /// Result codes, verbatim, when the node rejects on ingest.
    pub error_codes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    Pending,
    Duplicate,
    TryAgainLater,
    Error,
}

/// Transaction status as reported when polling by hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxStatusResponse {
    pub status: TxStatus,
    pub ledger: Option<u32>,
    /// Result codes, verbatim, for failed transactions.
    pub result_codes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    NotFound,
    Success,
    Failed,
}

/// Soroban node (JSON-RPC in production).
#[async_trait]
pub trait SorobanNode: Send + Sync {
    async fn get_latest_ledger(&self) -> Result<u32, ProtocolError>;

    /// Simulate a serialized draft transaction envelope.
    async fn simulate_transaction(&self, envelope: &str) -> Result<RawSimulation, ProtocolError>;

    /// Hand a signed envelope to the network. One-shot; duplicates are
    /// rejected by the node.
    async fn send_transaction(&self, envelope: &str) -> Result<SendResult, ProtocolError>;

    async fn get_transaction(&self, hash: &str) -> Result<TxStatusResponse, ProtocolError>;
}
