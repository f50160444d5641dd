//! The four-step sponsored relay protocol
//!
//! A caller with no native balance gets a contract invocation onto the
//! network by splitting one transaction between two parties: the caller
//! authorizes the aggregate call, the relay pays for and submits it.
//!
//! ## Architecture
//!
//! The protocol is split into focused modules:
//! - **errors**: failure taxonomy shared by every step
//! - **encoder**: typed invocation values and canonical call encoding
//! - **estimator**: native fee heuristic and fee-token spend ceiling
//! - **bundle**: the standard payment-plus-fee-swap aggregate call
//! - **draft**: unauthorized invoke-operation and simulatable draft
//! - **simulate**: node simulation and per-identity auth extraction
//! - **auth**: authorization-entry signing with ledger-bounded validity
//! - **assemble**: footprint/fee attachment, payer signature, submission,
//!   polling
//! - **envelope**: base64 wire forms, including the fee-bump wrapper
//! - **handoff**: the two serializable cross-party messages and the
//!   backend/frontend role drivers
//!
//! ## Attempt lifecycle
//!
//! ```text
//! DRAFT -> SIMULATED -> AUTH_SIGNED -> ASSEMBLED -> TX_SIGNED
//!       -> SUBMITTED -> { CONFIRMED | FAILED | TIMED_OUT }
//! ```
//!
//! Every arrow is one-directional and nothing retries automatically: a
//! failed or timed-out attempt restarts from DRAFT, because sequence
//! numbers advance and simulation results go stale. Data flows strictly
//! forward; each step consumes the previous step's output type, so a stale
//! artifact cannot re-enter the pipeline.

pub mod errors;
pub use errors::ProtocolError;

pub mod assemble;
pub mod auth;
pub mod bundle;
pub mod draft;
pub mod encoder;
pub mod envelope;
pub mod estimator;
pub mod handoff;
pub mod simulate;

pub use assemble::{FinalStatus, PreparedTransaction, SignedTransaction, SubmissionHandle};
pub use auth::{AuthorizationEntry, SignedAuthorizationEntry};
pub use draft::{DraftOperation, DraftTransaction};
pub use encoder::{AggregateCall, CallDigest, Invocation, ScValue};
pub use envelope::TransactionEnvelope;
pub use handoff::{
    AttemptOutcome, BackendRole, FrontendRole, SignedAuthResponse, UnsignedAuthRequest,
};
pub use simulate::SimulationResult;

/// Where an attempt currently is, for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Draft,
    Simulated,
    AuthSigned,
    Assembled,
    TxSigned,
    Submitted,
    Confirmed,
    Failed,
    TimedOut,
}

impl std::fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Draft => "draft",
            Self::Simulated => "simulated",
            Self::AuthSigned => "auth_signed",
            Self::Assembled => "assembled",
            Self::TxSigned => "tx_signed",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        };
        f.write_str(label)
    }
}
