//! Cross-party handoff
//!
//! The backend and frontend are two separate parties even when they run in
//! one process, so the two handoffs of the protocol are explicit
//! serializable messages rather than function calls:
//!
//! - [`UnsignedAuthRequest`] (backend → frontend): "simulation says your
//!   identity must approve this entry".
//! - [`SignedAuthResponse`] (frontend → backend): "here is my signature,
//!   valid until this ledger".
//!
//! [`BackendRole`] owns the payer key, the node and the ledger service;
//! [`FrontendRole`] owns only the caller's auth-entry signer. Neither side
//! ever holds the other's key material.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::network::{LedgerService, SorobanNode};
use crate::protocol::assemble::{
    assemble, poll, sign_transaction, submit, FinalStatus, DEFAULT_POLL_ATTEMPTS,
    DEFAULT_POLL_INTERVAL,
};
use crate::protocol::auth::{authorize_entry, AuthorizationEntry, SignedAuthorizationEntry};
use crate::protocol::draft::{build_draft_operation, DraftOperation};
use crate::protocol::encoder::AggregateCall;
use crate::protocol::errors::ProtocolError;
use crate::protocol::simulate::{extract_auth_for, simulate, SimulationResult};
use crate::protocol::AttemptPhase;
use crate::signer::{AuthEntrySigner, TxSigner};
use crate::strkey::ContractId;

/// Backend → frontend: the authorization requirement discovered by
/// simulation, addressed to the identity that must approve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedAuthRequest {
    pub attempt_id: Uuid,
    pub entry: AuthorizationEntry,
    /// Ledger the simulation was taken at; the signed validity window must
    /// end after it.
    pub simulation_ledger: u32,
    pub network_passphrase: String,
}

/// Frontend → backend: the signed entry for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedAuthResponse {
    pub attempt_id: Uuid,
    pub signed_entry: SignedAuthorizationEntry,
}

/// Backend-held state between the two handoffs. Discarded on any failure;
/// there is nothing to resume.
#[derive(Debug, Clone)]
pub struct PendingAttempt {
    pub attempt_id: Uuid,
    operation: DraftOperation,
    sim: SimulationResult,
}

/// Terminal report for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub attempt_id: Uuid,
    pub hash: String,
    pub status: FinalStatus,
}

impl AttemptOutcome {
    /// Collapse to a hard result. A network failure surfaces with its
    /// verbatim result codes; an exhausted poll surfaces as an unknown
    /// outcome, never as failure.
    pub fn ensure_confirmed(self) -> Result<Self, ProtocolError> {
        match &self.status {
            FinalStatus::Success { .. } => Ok(self),
            FinalStatus::Failed { codes } => Err(ProtocolError::Submission {
                codes: codes.clone(),
            }),
            FinalStatus::TimedOut => Err(ProtocolError::TimeoutAmbiguity {
                hash: self.hash.clone(),
            }),
        }
    }
}

/// The relaying party: simulates, assembles, pays for and submits.
pub struct BackendRole {
    node: Arc<dyn SorobanNode>,
    ledger: Arc<dyn LedgerService>,
    payer: Arc<dyn TxSigner>,
    router: ContractId,
    network_passphrase: String,
    base_fee: u64,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl BackendRole {
    pub fn new(
        node: Arc<dyn SorobanNode>,
        ledger: Arc<dyn LedgerService>,
        payer: Arc<dyn TxSigner>,
        router: ContractId,
        network_passphrase: &str,
        base_fee: u64,
    ) -> Self {
        Self {
            node,
            ledger,
            payer,
            router,
            network_passphrase: network_passphrase.to_string(),
            base_fee,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }

    /// Steps 1–2: draft the operation, simulate it, and extract the
    /// caller's authorization requirement into a request for the frontend.
    pub async fn open_attempt(
        &self,
        call: &AggregateCall,
    ) -> Result<(PendingAttempt, UnsignedAuthRequest), ProtocolError> {
        let attempt_id = Uuid::new_v4();
        let operation = build_draft_operation(&self.router, call);
        tracing::info!(%attempt_id, phase = %AttemptPhase::Draft, caller = %call.caller(), "attempt opened");

        let payer_account = self.ledger.load_account(&self.payer.public_key()).await?;
        let draft = operation
            .clone()
            .into_transaction(&payer_account, self.base_fee);
        let sim = simulate(self.node.as_ref(), &draft).await?;
        let entry = extract_auth_for(&sim, call.caller())?;
        tracing::info!(%attempt_id, phase = %AttemptPhase::Simulated, "caller auth requirement extracted");

        let request = UnsignedAuthRequest {
            attempt_id,
            entry,
            simulation_ledger: sim.latest_ledger,
            network_passphrase: self.network_passphrase.clone(),
        };
        Ok((
            PendingAttempt {
                attempt_id,
                operation,
                sim,
            },
            request,
        ))
    }

    /// Steps 3–4: take the frontend's signed entry, rebuild the operation
    /// with it, assemble against the stored simulation, sign as payer,
    /// submit and poll.
    pub async fn finish_attempt(
        &self,
        attempt: PendingAttempt,
        response: SignedAuthResponse,
    ) -> Result<AttemptOutcome, ProtocolError> {
        if response.attempt_id != attempt.attempt_id {
            return Err(ProtocolError::input(format!(
                "auth response for attempt {} does not match pending attempt {}",
                response.attempt_id, attempt.attempt_id
            )));
        }
        response.signed_entry.verify(&self.network_passphrase)?;
        tracing::info!(attempt_id = %attempt.attempt_id, phase = %AttemptPhase::AuthSigned, "caller signature verified");

        let operation = attempt.operation.with_auth(vec![response.signed_entry]);
        let payer_account = self.ledger.load_account(&self.payer.public_key()).await?;
        let prepared = assemble(operation, &attempt.sim, &payer_account, self.base_fee)?;
        tracing::info!(attempt_id = %attempt.attempt_id, phase = %AttemptPhase::Assembled, fee = prepared.fee, "resources attached");

        let signed = sign_transaction(prepared, &self.network_passphrase, self.payer.as_ref())
            .await?;
        tracing::info!(attempt_id = %attempt.attempt_id, phase = %AttemptPhase::TxSigned, "payer signed");

        let handle = submit(self.node.as_ref(), &self.network_passphrase, &signed).await?;
        tracing::info!(attempt_id = %attempt.attempt_id, phase = %AttemptPhase::Submitted, hash = %handle.hash, "submitted");

        let status = poll(
            self.node.as_ref(),
            &handle.hash,
            self.poll_attempts,
            self.poll_interval,
        )
        .await?;
        let phase = match &status {
            FinalStatus::Success { .. } => AttemptPhase::Confirmed,
            FinalStatus::Failed { .. } => AttemptPhase::Failed,
            FinalStatus::TimedOut => AttemptPhase::TimedOut,
        };
        tracing::info!(attempt_id = %attempt.attempt_id, %phase, hash = %handle.hash, "attempt finished");
        Ok(AttemptOutcome {
            attempt_id: attempt.attempt_id,
            hash: handle.hash,
            status,
        })
    }
}

/// The calling party: holds only the auth-entry signer and a read-only node
/// reference for the current ledger sequence.
pub struct FrontendRole {
    signer: Arc<dyn AuthEntrySigner>,
    node: Arc<dyn SorobanNode>,
}

impl FrontendRole {
    pub fn new(signer: Arc<dyn AuthEntrySigner>, node: Arc<dyn SorobanNode>) -> Self {
        Self { signer, node }
    }

    /// Step 3: approve exactly the entry attributed to this identity,
    /// bounded by the safety horizon above the current ledger.
    pub async fn approve(
        &self,
        request: &UnsignedAuthRequest,
    ) -> Result<SignedAuthResponse, ProtocolError> {
        let signed_entry = authorize_entry(
            self.node.as_ref(),
            &request.entry,
            request.simulation_ledger,
            &request.network_passphrase,
            self.signer.as_ref(),
        )
        .await?;
        Ok(SignedAuthResponse {
            attempt_id: request.attempt_id,
            signed_entry,
        })
    }
}

/// Run the whole four-step flow with both roles in-process. The two
/// messages still cross the role boundary as values, exactly as they would
/// over a wire.
pub async fn run_sponsored_call(
    backend: &BackendRole,
    frontend: &FrontendRole,
    call: &AggregateCall,
) -> Result<AttemptOutcome, ProtocolError> {
    let (pending, request) = backend.open_attempt(call).await?;
    let response = frontend.approve(&request).await?;
    backend.finish_attempt(pending, response).await
}
