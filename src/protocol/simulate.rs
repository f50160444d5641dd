//! Simulation and authorization extraction
//!
//! The node runs the draft in recording mode and reports which identities
//! must approve which sub-calls, plus the resource footprint and fee. The
//! result is stamped with the digest of the simulated call so that later
//! steps can prove they are still working on the same operation.
//!
//! A simulation result is implicitly tied to the ledger state it was taken
//! against; it is never reused across submission attempts.

use serde::{Deserialize, Serialize};

use crate::network::{ResourceFootprint, SorobanNode};
use crate::protocol::auth::AuthorizationEntry;
use crate::protocol::draft::DraftTransaction;
use crate::protocol::encoder::CallDigest;
use crate::protocol::envelope::encode_payload;
use crate::protocol::errors::ProtocolError;
use crate::strkey::AccountId;

/// What simulation learned about one draft: who must authorize, what the
/// call touches, what it costs, and which call it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub auth: Vec<AuthorizationEntry>,
    pub footprint: ResourceFootprint,
    pub resource_fee: u64,
    /// Ledger sequence the node simulated against.
    pub latest_ledger: u32,
    /// Digest of the draft this result belongs to.
    pub call_digest: CallDigest,
}

/// Simulate a draft transaction. A node-reported failure is fatal to the
/// attempt; the caller restarts from the draft step with corrected inputs.
pub async fn simulate(
    node: &dyn SorobanNode,
    draft: &DraftTransaction,
) -> Result<SimulationResult, ProtocolError> {
    let digest = draft.operation.call_digest()?;
    let envelope = encode_payload(draft)?;
    let raw = node.simulate_transaction(&envelope).await?;

    if let Some(error) = raw.error {
        tracing::warn!(%digest, %error, "simulation failed");
        return Err(ProtocolError::Simulation(error));
    }
    // The node derives entries from the call it executed; a different digest
    // means the collaborator is broken, not the caller.
    if let Some(entry) = raw.auth.iter().find(|e| e.call_digest != digest) {
        return Err(ProtocolError::Internal(format!(
            "node returned auth entry bound to foreign call {}",
            entry.call_digest
        )));
    }

    tracing::debug!(
        %digest,
        auth_entries = raw.auth.len(),
        resource_fee = raw.resource_fee,
        latest_ledger = raw.latest_ledger,
        "simulation complete"
    );
    Ok(SimulationResult {
        auth: raw.auth,
        footprint: raw.footprint,
        resource_fee: raw.resource_fee,
        latest_ledger: raw.latest_ledger,
        call_digest: digest,
    })
}

/// Return the one entry attributed to `identity`.
///
/// Absence means the contract's logic did not require this identity's
/// approval. That is a configuration mismatch, not something a retry fixes. More
/// than one entry for the same identity is a collaborator bug.
pub fn extract_auth_for(
    sim: &SimulationResult,
    identity: &AccountId,
) -> Result<AuthorizationEntry, ProtocolError> {
    let mut matching = sim.auth.iter().filter(|e| &e.identity == identity);
    let entry = matching.next().ok_or_else(|| ProtocolError::MissingAuth {
        identity: identity.to_string(),
    })?;
    if matching.next().is_some() {
        return Err(ProtocolError::Internal(format!(
            "simulation returned multiple auth entries for {identity}"
        )));
    }
    Ok(entry.clone())
}
