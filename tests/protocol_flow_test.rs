//! End-to-end tests for the four-step sponsored relay protocol against the
//! in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use gasolina::network::{LedgerService, SendStatus};
use gasolina::protocol::assemble::{
    assemble, check_auth_expiry, poll, sign_transaction, submit, FinalStatus,
};
use gasolina::protocol::auth::{sign_auth, AUTH_VALIDITY_HORIZON};
use gasolina::protocol::bundle::{build_payment_bundle, BundleContracts, SponsoredPayment};
use gasolina::protocol::draft::build_draft_operation;
use gasolina::protocol::estimator::{
    estimate_max_spend_in_fee_token, ExchangeRate, FeeEstimator, MaxSpendParams,
};
use gasolina::protocol::handoff::{
    run_sponsored_call, BackendRole, FrontendRole, SignedAuthResponse, UnsignedAuthRequest,
};
use gasolina::protocol::simulate::{extract_auth_for, simulate};
use gasolina::protocol::{AggregateCall, ProtocolError};
use gasolina::signer::LocalKeySigner;
use gasolina::test_utils::{test_account, test_contract, MockLedger, MockNode, TEST_PASSPHRASE};
use gasolina::AccountId;

struct Harness {
    node: Arc<MockNode>,
    ledger: Arc<MockLedger>,
    caller: Arc<LocalKeySigner>,
    payer: Arc<LocalKeySigner>,
}

impl Harness {
    fn new() -> Self {
        let node = Arc::new(MockNode::new(TEST_PASSPHRASE));
        let ledger = Arc::new(MockLedger::new());
        let caller = Arc::new(LocalKeySigner::generate());
        let payer = Arc::new(LocalKeySigner::generate());
        ledger.put_account(&payer.public_key(), 4096, 1_000_000_000);
        node.require_auth_from(&[caller.public_key()]);
        Self {
            node,
            ledger,
            caller,
            payer,
        }
    }

    fn backend(&self) -> BackendRole {
        BackendRole::new(
            self.node.clone(),
            self.ledger.clone(),
            self.payer.clone(),
            test_contract(100),
            TEST_PASSPHRASE,
            100,
        )
        .with_polling(30, Duration::from_millis(1))
    }

    fn frontend(&self) -> FrontendRole {
        FrontendRole::new(self.caller.clone(), self.node.clone())
    }

    /// The scenario-A bundle: pay 10,000 fee-token units, swap for twice
    /// the minimum fee at rate 0.4 with margin 0.001.
    fn payment_call(&self) -> AggregateCall {
        let fee_native = FeeEstimator::default().estimate_fee_in_native();
        let max_spend = estimate_max_spend_in_fee_token(MaxSpendParams {
            margin_scaled: 10_000,
            estimated_native: fee_native,
            rate: ExchangeRate::from_scaled(4_000_000).unwrap(),
        })
        .unwrap();
        assert_eq!(max_spend, 800_010_000);
        build_payment_bundle(
            &self.caller.public_key(),
            &BundleContracts {
                fee_token: test_contract(1),
                native_token: test_contract(2),
                swap_router: test_contract(3),
            },
            &SponsoredPayment {
                recipient: test_account(9),
                amount: 10_000,
            },
            fee_native,
            max_spend,
        )
        .unwrap()
    }
}

#[tokio::test]
async fn test_full_flow_confirms() {
    let harness = Harness::new();
    let outcome = run_sponsored_call(
        &harness.backend(),
        &harness.frontend(),
        &harness.payment_call(),
    )
    .await
    .unwrap();

    assert!(matches!(outcome.status, FinalStatus::Success { ledger: Some(_) }));
    assert_eq!(harness.node.sent_count(), 1);
}

#[tokio::test]
async fn test_handoff_messages_survive_serialization() {
    let harness = Harness::new();
    let backend = harness.backend();
    let frontend = harness.frontend();

    let (pending, request) = backend.open_attempt(&harness.payment_call()).await.unwrap();

    // Backend -> frontend over a wire
    let request_json = serde_json::to_string(&request).unwrap();
    let request: UnsignedAuthRequest = serde_json::from_str(&request_json).unwrap();
    assert_eq!(request.entry.identity, harness.caller.public_key());

    let response = frontend.approve(&request).await.unwrap();

    // Frontend -> backend over a wire
    let response_json = serde_json::to_string(&response).unwrap();
    let response: SignedAuthResponse = serde_json::from_str(&response_json).unwrap();

    let outcome = backend.finish_attempt(pending, response).await.unwrap();
    assert!(matches!(outcome.status, FinalStatus::Success { .. }));
}

#[tokio::test]
async fn test_simulation_has_auth_for_caller_only() {
    // Scenario: two invocations, auth required from the caller, none from
    // the payer, which only signs the outer transaction.
    let harness = Harness::new();
    let call = harness.payment_call();
    let operation = build_draft_operation(&test_contract(100), &call);
    let payer_account = harness
        .ledger
        .load_account(&harness.payer.public_key())
        .await
        .unwrap();
    let draft = operation.into_transaction(&payer_account, 100);

    let sim = simulate(harness.node.as_ref(), &draft).await.unwrap();
    let matching: Vec<_> = sim
        .auth
        .iter()
        .filter(|e| e.identity == harness.caller.public_key())
        .collect();
    assert_eq!(matching.len(), 1);

    assert!(extract_auth_for(&sim, &harness.caller.public_key()).is_ok());
    assert!(matches!(
        extract_auth_for(&sim, &harness.payer.public_key()),
        Err(ProtocolError::MissingAuth { .. })
    ));
}

#[tokio::test]
async fn test_simulation_failure_is_fatal() {
    let harness = Harness::new();
    harness
        .node
        .fail_simulation_with("host invocation failed: swap spend ceiling exceeded");

    let result = harness.backend().open_attempt(&harness.payment_call()).await;
    assert!(matches!(result, Err(ProtocolError::Simulation(msg)) if msg.contains("ceiling")));
    assert_eq!(harness.node.sent_count(), 0);
}

#[tokio::test]
async fn test_missing_caller_auth_aborts_before_signing() {
    let harness = Harness::new();
    // Contract logic did not require the caller's approval at all
    harness.node.require_auth_from(&[]);

    let result = harness.backend().open_attempt(&harness.payment_call()).await;
    assert!(matches!(result, Err(ProtocolError::MissingAuth { .. })));
}

#[tokio::test]
async fn test_stale_simulation_is_rejected_at_assembly() {
    // Scenario: an operation paired with the simulation of a different
    // call must never reach the network.
    let harness = Harness::new();
    let call_a = harness.payment_call();
    let other = harness.payment_amounts_differ();

    let payer_account = harness
        .ledger
        .load_account(&harness.payer.public_key())
        .await
        .unwrap();

    // Simulate call A
    let draft_a = build_draft_operation(&test_contract(100), &call_a)
        .into_transaction(&payer_account, 100);
    let sim_a = simulate(harness.node.as_ref(), &draft_a).await.unwrap();

    // Simulate call B and sign its auth entry
    let draft_b = build_draft_operation(&test_contract(100), &other)
        .into_transaction(&payer_account, 100);
    let sim_b = simulate(harness.node.as_ref(), &draft_b).await.unwrap();
    let entry_b = extract_auth_for(&sim_b, &harness.caller.public_key()).unwrap();
    let signed_b = sign_auth(&entry_b, 5000, TEST_PASSPHRASE, harness.caller.as_ref())
        .await
        .unwrap();

    // Operation B assembled against simulation A: digest mismatch
    let op_b = build_draft_operation(&test_contract(100), &other).with_auth(vec![signed_b]);
    let result = assemble(op_b, &sim_a, &payer_account, 100);
    assert!(matches!(result, Err(ProtocolError::BindingMismatch { .. })));
    assert_eq!(harness.node.sent_count(), 0);
}

impl Harness {
    /// A second call differing only in amount, for binding-mismatch tests.
    fn payment_amounts_differ(&self) -> AggregateCall {
        build_payment_bundle(
            &self.caller.public_key(),
            &BundleContracts {
                fee_token: test_contract(1),
                native_token: test_contract(2),
                swap_router: test_contract(3),
            },
            &SponsoredPayment {
                recipient: test_account(9),
                amount: 20_000,
            },
            200,
            800_010_000,
        )
        .unwrap()
    }
}

#[tokio::test]
async fn test_expired_auth_is_rejected_before_submission() {
    let harness = Harness::new();
    let backend = harness.backend();
    let call = harness.payment_call();

    let (_, request) = backend.open_attempt(&call).await.unwrap();
    // Sign with a window that will be closed by submission time
    let signed_entry = sign_auth(
        &request.entry,
        1500,
        TEST_PASSPHRASE,
        harness.caller.as_ref(),
    )
    .await
    .unwrap();

    let payer_account = harness
        .ledger
        .load_account(&harness.payer.public_key())
        .await
        .unwrap();
    let draft = build_draft_operation(&test_contract(100), &call)
        .into_transaction(&payer_account, 100);
    let sim = simulate(harness.node.as_ref(), &draft).await.unwrap();
    let operation = build_draft_operation(&test_contract(100), &call).with_auth(vec![signed_entry]);
    let prepared = assemble(operation, &sim, &payer_account, 100).unwrap();

    // Ledger advances past the expiry before the payer submits
    harness.node.set_latest_ledger(2000);
    assert!(matches!(
        check_auth_expiry(&prepared, 2000),
        Err(ProtocolError::AuthExpired { valid_until: 1500, current: 2000 })
    ));

    let signed = sign_transaction(prepared, TEST_PASSPHRASE, harness.payer.as_ref())
        .await
        .unwrap();
    let result = submit(harness.node.as_ref(), TEST_PASSPHRASE, &signed).await;
    assert!(matches!(result, Err(ProtocolError::AuthExpired { .. })));
    // Fail-fast: the envelope never reached the node
    assert_eq!(harness.node.sent_count(), 0);
}

#[tokio::test]
async fn test_poll_times_out_then_later_confirms() {
    // Scenario: a transaction that needs two polling intervals to confirm.
    let harness = Harness::new();
    harness.node.confirm_after_polls(2);

    let backend = harness.backend().with_polling(1, Duration::from_millis(1));
    let outcome = run_sponsored_call(&backend, &harness.frontend(), &harness.payment_call())
        .await
        .unwrap();
    // One attempt is not enough: unknown outcome, not failure
    assert_eq!(outcome.status, FinalStatus::TimedOut);
    assert!(matches!(
        outcome.clone().ensure_confirmed(),
        Err(ProtocolError::TimeoutAmbiguity { .. })
    ));

    // A later poll on the same hash resolves it
    let status = poll(
        harness.node.as_ref(),
        &outcome.hash,
        30,
        Duration::from_millis(1),
    )
    .await
    .unwrap();
    assert!(matches!(status, FinalStatus::Success { .. }));
}

#[tokio::test]
async fn test_failed_transaction_reports_codes_verbatim() {
    let harness = Harness::new();
    harness.node.fail_transactions_with(&["op_underfunded"]);

    let outcome = run_sponsored_call(
        &harness.backend(),
        &harness.frontend(),
        &harness.payment_call(),
    )
    .await
    .unwrap();
    assert_eq!(
        outcome.status,
        FinalStatus::Failed {
            codes: vec!["op_underfunded".to_string()]
        }
    );
    match outcome.ensure_confirmed() {
        Err(ProtocolError::Submission { codes }) => {
            assert_eq!(codes, vec!["op_underfunded".to_string()]);
        }
        other => panic!("expected submission error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_send_rejection_carries_codes() {
    let harness = Harness::new();
    harness
        .node
        .reject_next_send(SendStatus::Error, &["tx_bad_seq"]);

    let result = run_sponsored_call(
        &harness.backend(),
        &harness.frontend(),
        &harness.payment_call(),
    )
    .await;
    match result {
        Err(ProtocolError::Submission { codes }) => {
            assert_eq!(codes, vec!["tx_bad_seq".to_string()]);
        }
        other => panic!("expected submission rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_auth_response_for_wrong_attempt_is_rejected() {
    let harness = Harness::new();
    let backend = harness.backend();
    let frontend = harness.frontend();

    let (pending_a, _) = backend.open_attempt(&harness.payment_call()).await.unwrap();
    let (_, request_b) = backend.open_attempt(&harness.payment_call()).await.unwrap();
    let response_b = frontend.approve(&request_b).await.unwrap();

    let result = backend.finish_attempt(pending_a, response_b).await;
    assert!(matches!(result, Err(ProtocolError::Input(_))));
}

#[tokio::test]
async fn test_frontend_validity_horizon() {
    let harness = Harness::new();
    harness.node.set_latest_ledger(5_000);
    let (_, request) = harness
        .backend()
        .open_attempt(&harness.payment_call())
        .await
        .unwrap();
    let response = harness.frontend().approve(&request).await.unwrap();
    assert_eq!(
        response.signed_entry.signature_expiration_ledger,
        5_000 + AUTH_VALIDITY_HORIZON
    );
    assert!(response.signed_entry.signature_expiration_ledger > request.simulation_ledger);
}

#[tokio::test]
async fn test_foreign_signer_cannot_approve() {
    let harness = Harness::new();
    let (_, request) = harness
        .backend()
        .open_attempt(&harness.payment_call())
        .await
        .unwrap();

    let stranger: Arc<LocalKeySigner> = Arc::new(LocalKeySigner::generate());
    let imposter = FrontendRole::new(stranger, harness.node.clone());
    assert!(matches!(
        imposter.approve(&request).await,
        Err(ProtocolError::Signing(_))
    ));
}

#[tokio::test]
async fn test_payer_signature_is_verified() {
    let harness = Harness::new();
    let caller_id: AccountId = harness.caller.public_key();
    assert_ne!(caller_id, harness.payer.public_key());

    let payer_account = harness
        .ledger
        .load_account(&harness.payer.public_key())
        .await
        .unwrap();
    let call = harness.payment_call();
    let draft = build_draft_operation(&test_contract(100), &call)
        .into_transaction(&payer_account, 100);
    let sim = simulate(harness.node.as_ref(), &draft).await.unwrap();
    let entry = extract_auth_for(&sim, &caller_id).unwrap();
    let signed_entry = sign_auth(&entry, 5_000, TEST_PASSPHRASE, harness.caller.as_ref())
        .await
        .unwrap();
    let operation = build_draft_operation(&test_contract(100), &call).with_auth(vec![signed_entry]);
    let prepared = assemble(operation, &sim, &payer_account, 100).unwrap();

    // Only the source account may sign the outer transaction
    let result = sign_transaction(prepared, TEST_PASSPHRASE, harness.caller.as_ref()).await;
    assert!(matches!(result, Err(ProtocolError::Signing(_))));
}
