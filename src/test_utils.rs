//! In-memory doubles for the network collaborators
//!
//! The mocks behave like the real services at the protocol level: the node
//! binds simulated auth entries to the call it actually received, assigns
//! nonces, tracks submitted envelopes, and answers polls from a per-hash
//! countdown, so tests exercise the same sequencing the network enforces.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};

use crate::network::{
    AccountSnapshot, Asset, Balance, FeeStats, LedgerService, PathRecord, RawSimulation,
    ResourceFootprint, SendResult, SendStatus, SorobanNode, TxStatus, TxStatusResponse,
};
use crate::protocol::assemble::transaction_hash;
use crate::protocol::auth::AuthorizationEntry;
use crate::protocol::draft::DraftTransaction;
use crate::protocol::envelope::{decode_payload, TransactionEnvelope};
use crate::protocol::errors::ProtocolError;
use crate::strkey::{AccountId, ContractId};

pub const TEST_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Deterministic account identity for fixtures that never sign anything.
pub fn test_account(n: u8) -> AccountId {
    AccountId::from_raw_key(&[n; 32])
}

/// Deterministic contract identity.
pub fn test_contract(n: u8) -> ContractId {
    ContractId::from_raw_id(&[n; 32])
}

/// Ledger service double backed by a map of account snapshots.
#[derive(Default)]
pub struct MockLedger {
    accounts: Mutex<HashMap<AccountId, AccountSnapshot>>,
    paths: Mutex<Vec<PathRecord>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_account(&self, id: &AccountId, sequence: i64, native_balance_scaled: i128) {
        self.accounts.lock().insert(
            id.clone(),
            AccountSnapshot {
                id: id.clone(),
                sequence,
                balances: vec![Balance {
                    asset: Asset::Native,
                    amount_scaled: native_balance_scaled,
                }],
            },
        );
    }

    pub fn set_paths(&self, records: Vec<PathRecord>) {
        *self.paths.lock() = records;
    }

    pub fn bump_sequence(&self, id: &AccountId) {
        if let Some(account) = self.accounts.lock().get_mut(id) {
            account.sequence += 1;
        }
    }
}

#[async_trait]
impl LedgerService for MockLedger {
    async fn load_account(&self, id: &AccountId) -> Result<AccountSnapshot, ProtocolError> {
        self.accounts
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| ProtocolError::network(format!("account {id} not found")))
    }

    async fn fee_stats(&self) -> Result<FeeStats, ProtocolError> {
        Ok(FeeStats {
            base_fee: 100,
            p95_fee: 200,
        })
    }

    async fn strict_receive_paths(
        &self,
        _source_account: &AccountId,
        _dest_amount_scaled: i128,
    ) -> Result<Vec<PathRecord>, ProtocolError> {
        Ok(self.paths.lock().clone())
    }
}

/// Node double with scripted simulation and confirmation behavior.
pub struct MockNode {
    passphrase: String,
    latest_ledger: AtomicU32,
    resource_fee: AtomicU64,
    nonce: AtomicI64,
    /// Identities that must authorize the next simulated call.
    require_auth_from: Mutex<Vec<AccountId>>,
    /// Scripted node-side simulation failure.
    sim_error: Mutex<Option<String>>,
    /// Scripted ingest rejection for the next send.
    send_reject: Mutex<Option<SendResult>>,
    /// Polls that must return NOT_FOUND before a submission confirms.
    confirm_after_polls: AtomicU32,
    /// Scripted terminal failure codes instead of success.
    fail_codes: Mutex<Option<Vec<String>>>,
    /// hash -> remaining NOT_FOUND polls
    pending: Mutex<HashMap<String, u32>>,
    /// Every envelope handed to send_transaction, in order.
    pub sent: Mutex<Vec<String>>,
}

impl MockNode {
    pub fn new(passphrase: &str) -> Self {
        Self {
            passphrase: passphrase.to_string(),
            latest_ledger: AtomicU32::new(1000),
            resource_fee: AtomicU64::new(5_000),
            nonce: AtomicI64::new(1),
            require_auth_from: Mutex::new(Vec::new()),
            sim_error: Mutex::new(None),
            send_reject: Mutex::new(None),
            confirm_after_polls: AtomicU32::new(0),
            fail_codes: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_latest_ledger(&self, sequence: u32) {
        self.latest_ledger.store(sequence, Ordering::SeqCst);
    }

    pub fn set_resource_fee(&self, fee: u64) {
        self.resource_fee.store(fee, Ordering::SeqCst);
    }

    pub fn require_auth_from(&self, identities: &[AccountId]) {
        *self.require_auth_from.lock() = identities.to_vec();
    }

    pub fn fail_simulation_with(&self, error: &str) {
        *self.sim_error.lock() = Some(error.to_string());
    }

    pub fn reject_next_send(&self, status: SendStatus, codes: &[&str]) {
        *self.send_reject.lock() = Some(SendResult {
            hash: String::new(),
            status,
            error_codes: codes.iter().map(|c| c.to_string()).collect(),
        });
    }

    pub fn confirm_after_polls(&self, polls: u32) {
        self.confirm_after_polls.store(polls, Ordering::SeqCst);
    }

    pub fn fail_transactions_with(&self, codes: &[&str]) {
        *self.fail_codes.lock() = Some(codes.iter().map(|c| c.to_string()).collect());
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    fn hash_of_envelope(&self, envelope: &str) -> Result<String, ProtocolError> {
        match TransactionEnvelope::from_base64(envelope)? {
            TransactionEnvelope::Transaction(signed) => {
                transaction_hash(&self.passphrase, &signed.tx)
            }
            // A confirmed fee bump confirms its inner transaction; polling
            // happens on the inner hash.
            TransactionEnvelope::FeeBump(bump) => {
                transaction_hash(&self.passphrase, &bump.tx.inner.tx)
            }
        }
    }
}

#[async_trait]
impl SorobanNode for MockNode {
    async fn get_latest_ledger(&self) -> Result<u32, ProtocolError> {
        Ok(self.latest_ledger.load(Ordering::SeqCst))
    }

    async fn simulate_transaction(&self, envelope: &str) -> Result<RawSimulation, ProtocolError> {
        let draft: DraftTransaction = decode_payload(envelope)?;
        let digest = draft.operation.call_digest()?;
        if let Some(error) = self.sim_error.lock().clone() {
            return Ok(RawSimulation {
                error: Some(error),
                auth: Vec::new(),
                footprint: ResourceFootprint::default(),
                resource_fee: 0,
                latest_ledger: self.latest_ledger.load(Ordering::SeqCst),
            });
        }
        let auth = self
            .require_auth_from
            .lock()
            .iter()
            .map(|identity| AuthorizationEntry {
                identity: identity.clone(),
                nonce: self.nonce.fetch_add(1, Ordering::SeqCst),
                call_digest: digest,
            })
            .collect();
        Ok(RawSimulation {
            error: None,
            auth,
            footprint: ResourceFootprint {
                read_entries: vec!["contract_code".to_string(), "contract_data".to_string()],
                write_entries: vec!["token_balances".to_string()],
                instructions: 1_000_000,
            },
            resource_fee: self.resource_fee.load(Ordering::SeqCst),
            latest_ledger: self.latest_ledger.load(Ordering::SeqCst),
        })
    }

    async fn send_transaction(&self, envelope: &str) -> Result<SendResult, ProtocolError> {
        self.sent.lock().push(envelope.to_string());
        let hash = self.hash_of_envelope(envelope)?;
        if let Some(mut rejection) = self.send_reject.lock().take() {
            rejection.hash = hash;
            return Ok(rejection);
        }
        self.pending
            .lock()
            .insert(hash.clone(), self.confirm_after_polls.load(Ordering::SeqCst));
        Ok(SendResult {
            hash,
            status: SendStatus::Pending,
            error_codes: Vec::new(),
        })
    }

    async fn get_transaction(&self, hash: &str) -> Result<TxStatusResponse, ProtocolError> {
        let mut pending = self.pending.lock();
        match pending.get_mut(hash) {
            None => Ok(TxStatusResponse {
                status: TxStatus::NotFound,
                ledger: None,
                result_codes: Vec::new(),
            }),
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(TxStatusResponse {
                    status: TxStatus::NotFound,
                    ledger: None,
                    result_codes: Vec::new(),
                })
            }
            Some(_) => {
                if let Some(codes) = self.fail_codes.lock().clone() {
                    return Ok(TxStatusResponse {
                        status: TxStatus::Failed,
                        ledger: None,
                        result_codes: codes,
                    });
                }
                Ok(TxStatusResponse {
                    status: TxStatus::Success,
                    ledger: Some(self.latest_ledger.load(Ordering::SeqCst)),
                    result_codes: Vec::new(),
                })
            }
        }
    }
}
