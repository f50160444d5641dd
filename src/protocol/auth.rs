//! Authorization-entry signing
//!
//! The caller never signs the outer transaction, only the authorization
//! payload of their own sub-call, bounded by a ledger-sequence expiry. That
//! asymmetry is the whole point of the protocol: the payer owns the
//! envelope, the caller owns the approval.
//!
//! The validity horizon is a balance: too short and the entry expires before
//! the relay submits, too long and a leaked signature stays replayable
//! against this exact call for longer than necessary.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::network::SorobanNode;
use crate::protocol::encoder::CallDigest;
use crate::protocol::errors::ProtocolError;
use crate::signer::{verify_signature, AuthEntrySigner, SignatureBytes};
use crate::strkey::AccountId;

/// Ledgers added to the current sequence when choosing an expiry
/// (roughly tens of minutes).
pub const AUTH_VALIDITY_HORIZON: u32 = 1000;

/// An unsigned authorization requirement discovered by simulation.
///
/// The entry is bound to one exact call through `call_digest`; signing it
/// and then attaching it to a different operation is invalid and rejected
/// locally before any submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationEntry {
    /// The identity that must approve the sub-call.
    pub identity: AccountId,
    /// Node-assigned replay-prevention nonce.
    pub nonce: i64,
    /// Digest of the call this entry authorizes.
    pub call_digest: CallDigest,
}

/// An authorization entry after the owning identity signed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAuthorizationEntry {
    pub entry: AuthorizationEntry,
    /// Last ledger sequence at which the signature is valid.
    pub signature_expiration_ledger: u32,
    pub signature: SignatureBytes,
}

impl SignedAuthorizationEntry {
    pub fn is_expired(&self, current_ledger: u32) -> bool {
        self.signature_expiration_ledger < current_ledger
    }

    /// Recompute the preimage and check the signature against the entry's
    /// identity.
    pub fn verify(&self, network_passphrase: &str) -> Result<(), ProtocolError> {
        let payload = auth_signing_payload(
            network_passphrase,
            &self.entry,
            self.signature_expiration_ledger,
        );
        verify_signature(&self.entry.identity, &payload, &self.signature)
    }
}

/// The byte preimage the key-holder signs:
/// `sha256(passphrase) || nonce || expiration ledger || call digest`.
pub fn auth_signing_payload(
    network_passphrase: &str,
    entry: &AuthorizationEntry,
    signature_expiration_ledger: u32,
) -> Vec<u8> {
    let network_id: [u8; 32] = Sha256::digest(network_passphrase.as_bytes()).into();
    let mut payload = Vec::with_capacity(32 + 8 + 4 + 32);
    payload.extend_from_slice(&network_id);
    payload.extend_from_slice(&entry.nonce.to_be_bytes());
    payload.extend_from_slice(&signature_expiration_ledger.to_be_bytes());
    payload.extend_from_slice(&entry.call_digest.0);
    payload
}

/// Have the key-holder sign one entry with an explicit expiry.
pub async fn sign_auth(
    entry: &AuthorizationEntry,
    valid_until_ledger: u32,
    network_passphrase: &str,
    signer: &dyn AuthEntrySigner,
) -> Result<SignedAuthorizationEntry, ProtocolError> {
    if signer.public_key() != entry.identity {
        return Err(ProtocolError::Signing(format!(
            "signer {} cannot authorize entry owned by {}",
            signer.public_key(),
            entry.identity
        )));
    }
    let payload = auth_signing_payload(network_passphrase, entry, valid_until_ledger);
    let signature = signer.sign_auth_payload(&payload).await?;
    Ok(SignedAuthorizationEntry {
        entry: entry.clone(),
        signature_expiration_ledger: valid_until_ledger,
        signature,
    })
}

/// Fetch the current ledger, apply the safety horizon and sign. The expiry
/// must land strictly after the ledger the simulation was taken at.
pub async fn authorize_entry(
    node: &dyn SorobanNode,
    entry: &AuthorizationEntry,
    simulation_ledger: u32,
    network_passphrase: &str,
    signer: &dyn AuthEntrySigner,
) -> Result<SignedAuthorizationEntry, ProtocolError> {
    let latest = node.get_latest_ledger().await?;
    let valid_until = latest + AUTH_VALIDITY_HORIZON;
    if valid_until <= simulation_ledger {
        return Err(ProtocolError::Internal(format!(
            "validity window ends at {valid_until}, before simulation ledger {simulation_ledger}"
        )));
    }
    tracing::debug!(
        identity = %entry.identity,
        valid_until,
        latest,
        "signing authorization entry"
    );
    sign_auth(entry, valid_until, network_passphrase, signer).await
}
