//! Transaction assembly, submission and confirmation polling
//!
//! The last leg of an attempt: attach the simulation's resource footprint
//! and fee to the now-authorized operation, have the payer sign the outer
//! transaction, hand it to the network once, and poll for a terminal status.
//!
//! Two local guards run before anything is sent: the operation must carry
//! the same call digest as the simulation it is paired with (a stale or
//! foreign simulation would submit silently-wrong resource fees), and every
//! attached authorization entry must still be inside its validity window.
//!
//! Nothing here retries. A failed or timed-out submission means a fresh
//! draft: sequence numbers have advanced and the simulation is stale.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::network::{ResourceFootprint, SendStatus, SorobanNode, TxStatus};
use crate::protocol::draft::DraftOperation;
use crate::protocol::encoder::CallDigest;
use crate::protocol::envelope::{encode_payload, TransactionEnvelope};
use crate::protocol::errors::ProtocolError;
use crate::protocol::simulate::SimulationResult;
use crate::signer::{verify_signature, SignatureBytes, TxSigner};
use crate::strkey::AccountId;

/// Default polling bound.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 30;

/// Default fixed interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// A transaction carrying its resource footprint and fee, ready for the
/// payer's signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedTransaction {
    pub source: AccountId,
    pub sequence: i64,
    /// Total fee offered: base fee plus the simulated resource fee.
    pub fee: u64,
    pub timeout_secs: u64,
    pub operation: DraftOperation,
    pub footprint: ResourceFootprint,
    pub resource_fee: u64,
    pub call_digest: CallDigest,
}

/// One signature over a transaction payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxSignature {
    pub signer: AccountId,
    pub signature: SignatureBytes,
}

/// A prepared transaction plus the payer's signature. Submitted once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: PreparedTransaction,
    pub signatures: Vec<TxSignature>,
}

impl SignedTransaction {
    /// Check that the source account has signed this exact payload.
    pub fn verify(&self, network_passphrase: &str) -> Result<(), ProtocolError> {
        let payload = tx_signing_payload(network_passphrase, &self.tx)?;
        let source_sig = self
            .signatures
            .iter()
            .find(|s| s.signer == self.tx.source)
            .ok_or_else(|| {
                ProtocolError::input(format!("missing signature from source {}", self.tx.source))
            })?;
        verify_signature(&source_sig.signer, &payload, &source_sig.signature)
    }
}

/// The byte preimage the payer signs: `sha256(passphrase) || transaction`.
/// Signatures are not part of it, so the transaction hash is stable no
/// matter who else co-signs.
pub fn tx_signing_payload(
    network_passphrase: &str,
    tx: &PreparedTransaction,
) -> Result<Vec<u8>, ProtocolError> {
    let network_id: [u8; 32] = Sha256::digest(network_passphrase.as_bytes()).into();
    let body = bincode::serialize(tx).map_err(|e| ProtocolError::Internal(e.to_string()))?;
    let mut payload = Vec::with_capacity(32 + body.len());
    payload.extend_from_slice(&network_id);
    payload.extend_from_slice(&body);
    Ok(payload)
}

/// Network-wide transaction identifier: hex SHA-256 of the signing payload.
pub fn transaction_hash(
    network_passphrase: &str,
    tx: &PreparedTransaction,
) -> Result<String, ProtocolError> {
    let payload = tx_signing_payload(network_passphrase, tx)?;
    let digest: [u8; 32] = Sha256::digest(&payload).into();
    Ok(hex::encode(digest))
}

/// Attach the simulation's footprint and resource fee to an authorized
/// operation, built around a fresh payer sequence number.
///
/// Rejects operations whose digest does not match the simulation's: a
/// result computed from a different draft must never reach the network.
pub fn assemble(
    operation: DraftOperation,
    sim: &SimulationResult,
    payer: &crate::network::AccountSnapshot,
    base_fee: u64,
) -> Result<PreparedTransaction, ProtocolError> {
    let op_digest = operation.call_digest()?;
    if op_digest != sim.call_digest {
        return Err(ProtocolError::BindingMismatch {
            operation: op_digest.to_hex(),
            simulation: sim.call_digest.to_hex(),
        });
    }
    if operation.auth().is_empty() {
        return Err(ProtocolError::input(
            "operation has no authorization attached",
        ));
    }
    for signed in operation.auth() {
        if signed.entry.call_digest != sim.call_digest {
            return Err(ProtocolError::BindingMismatch {
                operation: signed.entry.call_digest.to_hex(),
                simulation: sim.call_digest.to_hex(),
            });
        }
    }

    let fee = base_fee
        .checked_add(sim.resource_fee)
        .ok_or_else(|| ProtocolError::Overflow(format!("{base_fee} + {}", sim.resource_fee)))?;
    Ok(PreparedTransaction {
        source: payer.id.clone(),
        sequence: payer.sequence + 1,
        fee,
        timeout_secs: crate::protocol::draft::TX_TIMEOUT_SECS,
        operation,
        footprint: sim.footprint.clone(),
        resource_fee: sim.resource_fee,
        call_digest: sim.call_digest,
    })
}

/// Have the paying party sign the outer transaction.
pub async fn sign_transaction(
    tx: PreparedTransaction,
    network_passphrase: &str,
    signer: &dyn TxSigner,
) -> Result<SignedTransaction, ProtocolError> {
    if signer.public_key() != tx.source {
        return Err(ProtocolError::Signing(format!(
            "payer {} cannot sign transaction sourced from {}",
            signer.public_key(),
            tx.source
        )));
    }
    let payload = tx_signing_payload(network_passphrase, &tx)?;
    let signature = signer.sign_envelope_payload(&payload).await?;
    let signer_id = signer.public_key();
    Ok(SignedTransaction {
        tx,
        signatures: vec![TxSignature {
            signer: signer_id,
            signature,
        }],
    })
}

/// Reject any attached authorization entry whose window has already closed
/// at `current_ledger`.
pub fn check_auth_expiry(
    tx: &PreparedTransaction,
    current_ledger: u32,
) -> Result<(), ProtocolError> {
    for signed in tx.operation.auth() {
        if signed.is_expired(current_ledger) {
            return Err(ProtocolError::AuthExpired {
                valid_until: signed.signature_expiration_ledger,
                current: current_ledger,
            });
        }
    }
    Ok(())
}

/// Accepted-for-inclusion handle returned by a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionHandle {
    pub hash: String,
}

/// Terminal outcome of polling one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalStatus {
    Success { ledger: Option<u32> },
    Failed { codes: Vec<String> },
    /// Polling exhausted without a terminal status. The transaction's fate
    /// is unknown; re-query by hash, never resubmit blindly.
    TimedOut,
}

/// Submit a signed transaction once.
///
/// Expired authorization entries are rejected here, before the envelope is
/// sent. Network rejections carry the node's result codes verbatim.
pub async fn submit(
    node: &dyn SorobanNode,
    network_passphrase: &str,
    signed: &SignedTransaction,
) -> Result<SubmissionHandle, ProtocolError> {
    let current = node.get_latest_ledger().await?;
    check_auth_expiry(&signed.tx, current)?;

    let hash = transaction_hash(network_passphrase, &signed.tx)?;
    let envelope = encode_payload(&TransactionEnvelope::Transaction(signed.clone()))?;
    let result = node.send_transaction(&envelope).await?;
    match result.status {
        SendStatus::Pending => {
            tracing::info!(%hash, "transaction accepted for inclusion");
            Ok(SubmissionHandle { hash })
        }
        status => {
            let mut codes = result.error_codes;
            if codes.is_empty() {
                codes.push(format!("{status:?}"));
            }
            tracing::warn!(%hash, ?codes, "submission rejected");
            Err(ProtocolError::Submission { codes })
        }
    }
}

/// Poll for a terminal status with a bounded number of fixed-interval
/// attempts. Exhaustion is TIMEOUT, not failure: the outcome is unknown.
pub async fn poll(
    node: &dyn SorobanNode,
    hash: &str,
    max_attempts: u32,
    interval: Duration,
) -> Result<FinalStatus, ProtocolError> {
    for attempt in 1..=max_attempts {
        let response = node.get_transaction(hash).await?;
        match response.status {
            TxStatus::Success => {
                tracing::info!(%hash, ledger = ?response.ledger, "transaction confirmed");
                return Ok(FinalStatus::Success {
                    ledger: response.ledger,
                });
            }
            TxStatus::Failed => {
                tracing::warn!(%hash, codes = ?response.result_codes, "transaction failed");
                return Ok(FinalStatus::Failed {
                    codes: response.result_codes,
                });
            }
            TxStatus::NotFound => {
                if attempt < max_attempts {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }
    tracing::warn!(%hash, max_attempts, "polling exhausted; outcome unknown");
    Ok(FinalStatus::TimedOut)
}
