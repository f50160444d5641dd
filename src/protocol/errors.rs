//! Error taxonomy for the sponsored relay protocol
//!
//! Every step of the protocol fails closed: an error at step N discards all
//! intermediate artifacts and the attempt restarts from a fresh draft. The
//! variants here separate local fail-fast rejections (input validation,
//! binding mismatch, expired auth) from failures reported by the network, so
//! callers and the relay boundary can translate them without string matching.

use thiserror::Error;

/// Error type covering the full attempt lifecycle: encoding, estimation,
/// drafting, simulation, auth signing, assembly, submission and polling.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Malformed local input: bad strkey, bad symbol, unparsable envelope,
    /// missing required field. Rejected before any network call.
    #[error("invalid input: {0}")]
    Input(String),

    /// The node reported a simulation failure (reverted sub-call, resource
    /// limits, malformed invocation). Fatal to the attempt; the caller must
    /// restart from the draft step with corrected inputs.
    #[error("simulation failed: {0}")]
    Simulation(String),

    /// The simulation result carries no authorization entry for the expected
    /// identity. A caller/contract mismatch, not retryable without changing
    /// which identity is used.
    #[error("no authorization entry for identity {identity}")]
    MissingAuth {
        /// The identity that was expected to appear in the auth list
        identity: String,
    },

    /// A signed authorization entry or prepared transaction is paired with a
    /// simulation result produced from a different call. Caught locally by
    /// digest comparison, never submitted.
    #[error("call digest mismatch: operation {operation}, simulation {simulation}")]
    BindingMismatch {
        operation: String,
        simulation: String,
    },

    /// An attached authorization entry expires at or before the current
    /// ledger. Caught by the assembler before submission.
    #[error("authorization expired: valid until ledger {valid_until}, current ledger {current}")]
    AuthExpired { valid_until: u32, current: u32 },

    /// The key-holder refused or failed to produce a signature.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The network rejected a submission. Result codes are carried verbatim.
    #[error("submission rejected: {codes:?}")]
    Submission {
        /// Network result codes, verbatim
        codes: Vec<String>,
    },

    /// Polling exhausted its attempts without a terminal status. The outcome
    /// is unknown, not failed; re-query by hash before doing anything else.
    #[error("polling exhausted; outcome unknown for {hash}, re-query by hash")]
    TimeoutAmbiguity { hash: String },

    /// Transport-level failure talking to a collaborator (ledger service,
    /// node, wallet bridge).
    #[error("network error: {0}")]
    Network(String),

    /// Arithmetic overflow while computing an on-chain amount.
    #[error("amount overflow: {0}")]
    Overflow(String),

    /// Internal invariant violation; indicates a bug, not an input problem.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    /// Whether re-running the attempt from a fresh draft might succeed
    /// without changing inputs or code.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::TimeoutAmbiguity { .. } => true,
            // Sequence-dependent rejections clear up once state is rebuilt
            Self::Submission { codes } => codes.iter().any(|c| c.contains("bad_seq")),
            Self::AuthExpired { .. } => true,

            Self::Input(_) => false,
            Self::Simulation(_) => false,
            Self::MissingAuth { .. } => false,
            Self::BindingMismatch { .. } => false,
            Self::Signing(_) => false,
            Self::Overflow(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Stable category label for metrics and structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Simulation(_) => "simulation",
            Self::MissingAuth { .. } => "missing_auth",
            Self::BindingMismatch { .. } => "binding",
            Self::AuthExpired { .. } => "auth_expired",
            Self::Signing(_) => "signing",
            Self::Submission { .. } => "submission",
            Self::TimeoutAmbiguity { .. } => "timeout",
            Self::Network(_) => "network",
            Self::Overflow(_) => "overflow",
            Self::Internal(_) => "internal",
        }
    }

    pub fn input(reason: impl Into<String>) -> Self {
        Self::Input(reason.into())
    }

    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network(reason.into())
    }
}

impl From<crate::strkey::StrkeyError> for ProtocolError {
    fn from(err: crate::strkey::StrkeyError) -> Self {
        Self::Input(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ProtocolError::AuthExpired {
            valid_until: 100,
            current: 200,
        };
        assert_eq!(
            err.to_string(),
            "authorization expired: valid until ledger 100, current ledger 200"
        );
    }

    #[test]
    fn test_retryability() {
        assert!(ProtocolError::network("timeout").is_retryable());
        assert!(ProtocolError::Submission {
            codes: vec!["tx_bad_seq".into()]
        }
        .is_retryable());

        assert!(!ProtocolError::Submission {
            codes: vec!["tx_bad_auth".into()]
        }
        .is_retryable());
        assert!(!ProtocolError::input("bad key").is_retryable());
        assert!(!ProtocolError::Simulation("reverted".into()).is_retryable());
        assert!(!ProtocolError::MissingAuth {
            identity: "G".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_categories() {
        assert_eq!(ProtocolError::input("x").category(), "input");
        assert_eq!(
            ProtocolError::TimeoutAmbiguity { hash: "h".into() }.category(),
            "timeout"
        );
    }
}
