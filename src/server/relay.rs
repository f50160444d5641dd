//! The /relay endpoint
//!
//! Accepts `{ "xdr": "<base64 envelope>" }`, validates the inner signature,
//! checks the sponsor can still pay, wraps the transaction in a fee bump
//! signed by the sponsor, submits it and polls for the outcome. Network
//! result codes are passed through verbatim; a polling timeout is reported
//! as an unknown outcome, distinct from failure.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::metrics::METRICS;
use crate::protocol::assemble::{poll, FinalStatus, SignedTransaction};
use crate::protocol::envelope::{
    encode_payload, fee_bump_signing_payload, FeeBumpTransaction, SignedFeeBump,
    TransactionEnvelope,
};
use crate::protocol::errors::ProtocolError;
use crate::network::SendStatus;
use crate::server::RelayState;

#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    pub xdr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySuccess {
    pub success: bool,
    pub transaction_hash: String,
    pub ledger: Option<u32>,
    pub sponsor: String,
    pub submitted_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayFailure {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_codes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
}

fn failure(
    status: StatusCode,
    error: &str,
    message: impl Into<String>,
    result_codes: Option<Vec<String>>,
) -> HttpResponse {
    HttpResponse::build(status).json(RelayFailure {
        error: error.to_string(),
        message: message.into(),
        result_codes,
        transaction_hash: None,
        sponsor: None,
    })
}

/// Map a protocol failure onto an HTTP status and stable error class.
fn protocol_failure(err: &ProtocolError) -> HttpResponse {
    let (status, class) = match err {
        ProtocolError::Input(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        ProtocolError::AuthExpired { .. } => (StatusCode::BAD_REQUEST, "auth_expired"),
        ProtocolError::Signing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "signing_failed"),
        ProtocolError::Submission { .. } => (StatusCode::BAD_GATEWAY, "submission_rejected"),
        ProtocolError::Network(_) => (StatusCode::BAD_GATEWAY, "network_error"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };
    let codes = match err {
        ProtocolError::Submission { codes } => Some(codes.clone()),
        _ => None,
    };
    failure(status, class, err.to_string(), codes)
}

pub async fn relay_handler(
    state: web::Data<RelayState>,
    request: HttpRequest,
    body: web::Json<RelayRequest>,
) -> HttpResponse {
    let started = Instant::now();
    METRICS.relay_requests_total.inc();

    let peer = request
        .peer_addr()
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    if !state.allow(&peer) {
        METRICS.relay_rejected_total.inc();
        return failure(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Too many requests from this address, try again later",
            None,
        );
    }

    // Input validation: no network call happens past a malformed envelope
    let signed = match parse_signed_transaction(&body.xdr) {
        Ok(signed) => signed,
        Err(err) => {
            METRICS.relay_rejected_total.inc();
            tracing::warn!(%peer, error = %err, "rejected relay envelope");
            return failure(
                StatusCode::BAD_REQUEST,
                "invalid_envelope",
                err.to_string(),
                None,
            );
        }
    };
    if let Err(err) = signed.verify(&state.network_passphrase) {
        METRICS.relay_rejected_total.inc();
        return failure(
            StatusCode::BAD_REQUEST,
            "invalid_signature",
            err.to_string(),
            None,
        );
    }

    let sponsor = state.sponsor.public_key();
    match state.ledger.load_account(&sponsor).await {
        Ok(account) => {
            let balance = account.native_balance_scaled();
            if balance < state.min_sponsor_balance_scaled {
                tracing::error!(%sponsor, balance, "sponsor underfunded");
                METRICS.relay_rejected_total.inc();
                return HttpResponse::InternalServerError().json(RelayFailure {
                    error: "insufficient_sponsor_balance".to_string(),
                    message: format!(
                        "sponsor holds {balance} scaled native, needs {}",
                        state.min_sponsor_balance_scaled
                    ),
                    result_codes: None,
                    transaction_hash: None,
                    sponsor: Some(sponsor.to_string()),
                });
            }
        }
        Err(err) => {
            METRICS.relay_rejected_total.inc();
            return failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "sponsor_unavailable",
                err.to_string(),
                None,
            );
        }
    }

    // One submission at a time per payer account: the sequence number is
    // the only shared mutable resource here
    let payer = signed.tx.source.clone();
    let lock = state.payer_lock(&payer);
    let _guard = lock.lock().await;

    METRICS.relay_inflight.inc();
    let outcome = bump_and_submit(&state, signed).await;
    METRICS.relay_inflight.dec();
    METRICS
        .relay_latency
        .observe(started.elapsed().as_secs_f64());

    match outcome {
        Ok((hash, FinalStatus::Success { ledger })) => {
            METRICS.relay_success_total.inc();
            tracing::info!(%hash, ?ledger, %sponsor, "relay confirmed");
            HttpResponse::Ok().json(RelaySuccess {
                success: true,
                transaction_hash: hash,
                ledger,
                sponsor: sponsor.to_string(),
                submitted_at: chrono::Utc::now().to_rfc3339(),
            })
        }
        Ok((hash, FinalStatus::Failed { codes })) => {
            METRICS.relay_failed_total.inc();
            tracing::warn!(%hash, ?codes, "relayed transaction failed");
            HttpResponse::BadGateway().json(RelayFailure {
                error: "transaction_failed".to_string(),
                message: "the network rejected the transaction".to_string(),
                result_codes: Some(codes),
                transaction_hash: Some(hash),
                sponsor: Some(sponsor.to_string()),
            })
        }
        Ok((hash, FinalStatus::TimedOut)) => {
            METRICS.relay_timeout_total.inc();
            tracing::warn!(%hash, "relay outcome unknown after polling");
            HttpResponse::Accepted().json(RelayFailure {
                error: "outcome_unknown".to_string(),
                message: "polling exhausted; re-query the transaction by hash".to_string(),
                result_codes: None,
                transaction_hash: Some(hash),
                sponsor: Some(sponsor.to_string()),
            })
        }
        Err(err) => {
            METRICS.relay_failed_total.inc();
            tracing::warn!(error = %err, category = err.category(), "relay failed");
            protocol_failure(&err)
        }
    }
}

fn parse_signed_transaction(text: &str) -> Result<SignedTransaction, ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::input("transaction envelope is required"));
    }
    match TransactionEnvelope::from_base64(text)? {
        TransactionEnvelope::Transaction(signed) => Ok(signed),
        TransactionEnvelope::FeeBump(_) => Err(ProtocolError::input(
            "envelope is already fee-bumped; submit the inner transaction",
        )),
    }
}

/// Wrap, sign, submit and poll. Returns the hash the caller can re-query
/// even when the final status is unknown.
async fn bump_and_submit(
    state: &RelayState,
    inner: SignedTransaction,
) -> Result<(String, FinalStatus), ProtocolError> {
    let bump = FeeBumpTransaction::wrap(
        inner,
        state.sponsor.public_key(),
        state.fee_bump_margin,
    )?;
    let payload = fee_bump_signing_payload(&state.network_passphrase, &bump)?;
    let signature = state.sponsor.sign_envelope_payload(&payload).await?;
    let envelope = encode_payload(&TransactionEnvelope::FeeBump(SignedFeeBump {
        tx: bump,
        signature,
    }))?;

    let result = state.node.send_transaction(&envelope).await?;
    match result.status {
        SendStatus::Pending => {
            let status = poll(
                state.node.as_ref(),
                &result.hash,
                state.poll_attempts,
                state.poll_interval,
            )
            .await?;
            Ok((result.hash, status))
        }
        status => {
            let mut codes = result.error_codes;
            if codes.is_empty() {
                codes.push(format!("{status:?}"));
            }
            Err(ProtocolError::Submission { codes })
        }
    }
}
