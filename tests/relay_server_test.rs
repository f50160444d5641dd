//! Endpoint tests for the relay HTTP boundary.

use actix_web::{test, App};
use std::sync::Arc;
use std::time::Duration;

use gasolina::network::LedgerService;
use gasolina::protocol::assemble::{assemble, sign_transaction, SignedTransaction};
use gasolina::protocol::auth::sign_auth;
use gasolina::protocol::draft::build_draft_operation;
use gasolina::protocol::envelope::{encode_payload, TransactionEnvelope};
use gasolina::protocol::simulate::{extract_auth_for, simulate};
use gasolina::protocol::{AggregateCall, Invocation, ScValue};
use gasolina::server::{configure, RelayState, SERVICE_NAME};
use gasolina::signer::LocalKeySigner;
use gasolina::test_utils::{test_account, test_contract, MockLedger, MockNode, TEST_PASSPHRASE};

struct Fixture {
    node: Arc<MockNode>,
    ledger: Arc<MockLedger>,
    caller: Arc<LocalKeySigner>,
    payer: Arc<LocalKeySigner>,
    sponsor: Arc<LocalKeySigner>,
}

impl Fixture {
    fn new() -> Self {
        let node = Arc::new(MockNode::new(TEST_PASSPHRASE));
        let ledger = Arc::new(MockLedger::new());
        let caller = Arc::new(LocalKeySigner::generate());
        let payer = Arc::new(LocalKeySigner::generate());
        let sponsor = Arc::new(LocalKeySigner::generate());
        ledger.put_account(&payer.public_key(), 100, 1_000_000_000);
        ledger.put_account(&sponsor.public_key(), 200, 1_000_000_000);
        node.require_auth_from(&[caller.public_key()]);
        Self {
            node,
            ledger,
            caller,
            payer,
            sponsor,
        }
    }

    fn state(&self) -> Arc<RelayState> {
        Arc::new(RelayState::new(
            self.node.clone(),
            self.ledger.clone(),
            self.sponsor.clone(),
            TEST_PASSPHRASE,
            100,
            100_000,
            1000,
            10,
            Duration::from_millis(1),
        ))
    }

    /// Build a payer-signed transaction the way a backend would, without
    /// submitting it.
    async fn signed_transaction(&self) -> SignedTransaction {
        let call = AggregateCall::new(
            self.caller.public_key(),
            vec![Invocation::new(
                test_contract(1),
                "transfer",
                vec![
                    ScValue::Account(self.caller.public_key()),
                    ScValue::Account(test_account(9)),
                    ScValue::I128(10_000),
                ],
                false,
            )
            .unwrap()],
        )
        .unwrap();

        let payer_account = self
            .ledger
            .load_account(&self.payer.public_key())
            .await
            .unwrap();
        let draft = build_draft_operation(&test_contract(100), &call)
            .into_transaction(&payer_account, 100);
        let sim = simulate(self.node.as_ref(), &draft).await.unwrap();
        let entry = extract_auth_for(&sim, &self.caller.public_key()).unwrap();
        let signed_entry = sign_auth(&entry, 5_000, TEST_PASSPHRASE, self.caller.as_ref())
            .await
            .unwrap();
        let operation =
            build_draft_operation(&test_contract(100), &call).with_auth(vec![signed_entry]);
        let prepared = assemble(operation, &sim, &payer_account, 100).unwrap();
        sign_transaction(prepared, TEST_PASSPHRASE, self.payer.as_ref())
            .await
            .unwrap()
    }
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(actix_web::web::Data::from($state))
                .configure(configure),
        )
        .await
    };
}

#[actix_rt::test]
async fn test_health_shape() {
    let fixture = Fixture::new();
    let app = init_app!(fixture.state());

    let request = test::TestRequest::get().uri("/health").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], SERVICE_NAME);
    assert!(body["timestamp"].is_string());
}

#[actix_rt::test]
async fn test_relay_confirms_and_reports_sponsor() {
    let fixture = Fixture::new();
    let app = init_app!(fixture.state());
    let signed = fixture.signed_transaction().await;
    let envelope = encode_payload(&TransactionEnvelope::Transaction(signed)).unwrap();

    let request = test::TestRequest::post()
        .uri("/relay")
        .set_json(serde_json::json!({ "xdr": envelope }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["sponsor"], fixture.sponsor.public_key().to_string());
    assert!(body["transactionHash"].is_string());
    assert!(body["ledger"].is_number());

    // Exactly one envelope reached the node: the fee bump
    assert_eq!(fixture.node.sent_count(), 1);
    let sent = fixture.node.sent.lock()[0].clone();
    match TransactionEnvelope::from_base64(&sent).unwrap() {
        TransactionEnvelope::FeeBump(bump) => {
            assert_eq!(bump.tx.fee_source, fixture.sponsor.public_key());
            assert!(bump.tx.fee > bump.tx.inner.tx.fee);
            bump.verify(TEST_PASSPHRASE).unwrap();
        }
        other => panic!("expected fee bump envelope, got {other:?}"),
    }
}

#[actix_rt::test]
async fn test_relay_rejects_malformed_envelope() {
    let fixture = Fixture::new();
    let app = init_app!(fixture.state());

    let request = test::TestRequest::post()
        .uri("/relay")
        .set_json(serde_json::json!({ "xdr": "definitely not base64 !!!" }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 400);

    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["error"], "invalid_envelope");
    assert_eq!(fixture.node.sent_count(), 0);
}

#[actix_rt::test]
async fn test_relay_rejects_empty_envelope() {
    let fixture = Fixture::new();
    let app = init_app!(fixture.state());

    let request = test::TestRequest::post()
        .uri("/relay")
        .set_json(serde_json::json!({ "xdr": "" }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 400);
}

#[actix_rt::test]
async fn test_relay_rejects_tampered_signature() {
    let fixture = Fixture::new();
    let app = init_app!(fixture.state());

    let mut signed = fixture.signed_transaction().await;
    // Corrupt the payer's signature
    signed.signatures[0].signature.0[0] ^= 0xff;
    let envelope = encode_payload(&TransactionEnvelope::Transaction(signed)).unwrap();

    let request = test::TestRequest::post()
        .uri("/relay")
        .set_json(serde_json::json!({ "xdr": envelope }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 400);

    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["error"], "invalid_signature");
    assert_eq!(fixture.node.sent_count(), 0);
}

#[actix_rt::test]
async fn test_relay_rejects_already_bumped_envelope() {
    let fixture = Fixture::new();
    let app = init_app!(fixture.state());
    let signed = fixture.signed_transaction().await;

    let bump = gasolina::protocol::envelope::FeeBumpTransaction::wrap(
        signed,
        fixture.sponsor.public_key(),
        100,
    )
    .unwrap();
    let payload =
        gasolina::protocol::envelope::fee_bump_signing_payload(TEST_PASSPHRASE, &bump).unwrap();
    let signature = {
        use gasolina::signer::TxSigner;
        fixture.sponsor.sign_envelope_payload(&payload).await.unwrap()
    };
    let envelope = encode_payload(&TransactionEnvelope::FeeBump(
        gasolina::protocol::envelope::SignedFeeBump {
            tx: bump,
            signature,
        },
    ))
    .unwrap();

    let request = test::TestRequest::post()
        .uri("/relay")
        .set_json(serde_json::json!({ "xdr": envelope }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 400);
}

#[actix_rt::test]
async fn test_relay_refuses_when_sponsor_underfunded() {
    let fixture = Fixture::new();
    // Below the configured 0.01 native minimum
    fixture
        .ledger
        .put_account(&fixture.sponsor.public_key(), 200, 5_000);
    let app = init_app!(fixture.state());
    let signed = fixture.signed_transaction().await;
    let envelope = encode_payload(&TransactionEnvelope::Transaction(signed)).unwrap();

    let request = test::TestRequest::post()
        .uri("/relay")
        .set_json(serde_json::json!({ "xdr": envelope }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 500);

    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["error"], "insufficient_sponsor_balance");
    assert_eq!(body["sponsor"], fixture.sponsor.public_key().to_string());
    assert_eq!(fixture.node.sent_count(), 0);
}

#[actix_rt::test]
async fn test_relay_reports_unknown_outcome_on_poll_exhaustion() {
    let fixture = Fixture::new();
    fixture.node.confirm_after_polls(50);
    let app = init_app!(fixture.state());
    let signed = fixture.signed_transaction().await;
    let envelope = encode_payload(&TransactionEnvelope::Transaction(signed)).unwrap();

    let request = test::TestRequest::post()
        .uri("/relay")
        .set_json(serde_json::json!({ "xdr": envelope }))
        .to_request();
    let response = test::call_service(&app, request).await;
    // Unknown outcome is not reported as failure
    assert_eq!(response.status(), 202);

    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["error"], "outcome_unknown");
    assert!(body["transactionHash"].is_string());
}

#[actix_rt::test]
async fn test_metrics_endpoint_serves_prometheus_text() {
    let fixture = Fixture::new();
    let app = init_app!(fixture.state());

    let request = test::TestRequest::get().uri("/metrics").to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 200);
    let body = test::read_body(response).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("relay_requests_total"));
}
