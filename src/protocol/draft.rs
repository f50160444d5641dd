//! Draft-operation construction
//!
//! A draft wraps one aggregate call as an invoke-operation addressed at the
//! router contract, with no authorization attached. Paired with any funding
//! source account it becomes a simulatable draft transaction; the source
//! used here only pays the placeholder fee for simulation and need not be
//! the final payer.

use serde::{Deserialize, Serialize};

use crate::network::AccountSnapshot;
use crate::protocol::auth::SignedAuthorizationEntry;
use crate::protocol::encoder::{AggregateCall, CallDigest, ScValue};
use crate::protocol::errors::ProtocolError;
use crate::strkey::{AccountId, ContractId};

/// The router's aggregate entry point.
pub const EXEC_FUNCTION: &str = "exec";

/// Transaction time bound used for drafts and submissions.
pub const TX_TIMEOUT_SECS: u64 = 60;

/// An invoke-operation against the router, authorized or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftOperation {
    router: ContractId,
    function: String,
    args: Vec<ScValue>,
    auth: Vec<SignedAuthorizationEntry>,
}

impl DraftOperation {
    pub fn router(&self) -> &ContractId {
        &self.router
    }

    pub fn args(&self) -> &[ScValue] {
        &self.args
    }

    pub fn auth(&self) -> &[SignedAuthorizationEntry] {
        &self.auth
    }

    /// Digest of the call carried by this operation.
    pub fn call_digest(&self) -> Result<CallDigest, ProtocolError> {
        CallDigest::of_args(&self.args)
    }

    /// The same operation with signed authorization attached. Argument list
    /// and target are untouched, which is what keeps the digest stable
    /// across the handoff.
    pub fn with_auth(self, auth: Vec<SignedAuthorizationEntry>) -> Self {
        Self { auth, ..self }
    }

    /// Pair with a funding source account to form a simulatable draft.
    pub fn into_transaction(self, source: &AccountSnapshot, fee: u64) -> DraftTransaction {
        DraftTransaction {
            source: source.id.clone(),
            sequence: source.sequence + 1,
            fee,
            timeout_secs: TX_TIMEOUT_SECS,
            operation: self,
        }
    }
}

/// Build the unauthorized invoke-operation for one aggregate call.
pub fn build_draft_operation(router: &ContractId, call: &AggregateCall) -> DraftOperation {
    DraftOperation {
        router: router.clone(),
        function: EXEC_FUNCTION.to_string(),
        args: call.exec_args(),
        auth: Vec::new(),
    }
}

/// An unsubmittable transaction good for exactly one simulation round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftTransaction {
    pub source: AccountId,
    pub sequence: i64,
    pub fee: u64,
    pub timeout_secs: u64,
    pub operation: DraftOperation,
}
