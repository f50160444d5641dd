//! Soroban node JSON-RPC client
//!
//! Production implementation of [`crate::network::SorobanNode`]. The node
//! is a black box: it takes serialized envelopes, runs them in recording
//! mode or enqueues them for inclusion, and reports per-transaction status.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

use crate::network::{
    RawSimulation, ResourceFootprint, SendResult, SendStatus, SorobanNode, TxStatus,
    TxStatusResponse,
};
use crate::protocol::auth::AuthorizationEntry;
use crate::protocol::errors::ProtocolError;

const TRANSPORT_RETRIES: usize = 2;
const RETRY_INTERVAL_MS: u64 = 250;

pub struct NodeClient {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct LatestLedgerResult {
    sequence: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResult {
    error: Option<String>,
    #[serde(default)]
    auth: Vec<AuthorizationEntry>,
    #[serde(default)]
    footprint: ResourceFootprint,
    #[serde(default)]
    min_resource_fee: u64,
    latest_ledger: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResultDto {
    hash: String,
    status: SendStatus,
    #[serde(default)]
    error_result_codes: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxStatusDto {
    status: TxStatus,
    ledger: Option<u32>,
    #[serde(default)]
    result_codes: Vec<String>,
}

impl NodeClient {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ProtocolError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let strategy = FixedInterval::from_millis(RETRY_INTERVAL_MS).take(TRANSPORT_RETRIES);
        let response = Retry::spawn(strategy, || {
            self.client.post(self.url.as_str()).json(&request).send()
        })
        .await
        .map_err(|e| ProtocolError::network(format!("node: {e}")))?;
        if !response.status().is_success() {
            return Err(ProtocolError::network(format!(
                "node: HTTP {} for {method}",
                response.status()
            )));
        }
        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ProtocolError::network(format!("node: {e}")))?;
        if let Some(error) = parsed.error {
            return Err(ProtocolError::network(format!(
                "node: {method} failed with code {}: {}",
                error.code, error.message
            )));
        }
        parsed
            .result
            .ok_or_else(|| ProtocolError::network(format!("node: empty result for {method}")))
    }
}

#[async_trait]
impl SorobanNode for NodeClient {
    async fn get_latest_ledger(&self) -> Result<u32, ProtocolError> {
        let result: LatestLedgerResult = self.call("getLatestLedger", json!({})).await?;
        Ok(result.sequence)
    }

    async fn simulate_transaction(&self, envelope: &str) -> Result<RawSimulation, ProtocolError> {
        let result: SimulateResult = self
            .call("simulateTransaction", json!({ "transaction": envelope }))
            .await?;
        Ok(RawSimulation {
            error: result.error,
            auth: result.auth,
            footprint: result.footprint,
            resource_fee: result.min_resource_fee,
            latest_ledger: result.latest_ledger,
        })
    }

    async fn send_transaction(&self, envelope: &str) -> Result<SendResult, ProtocolError> {
        let result: SendResultDto = self
            .call("sendTransaction", json!({ "transaction": envelope }))
            .await?;
        Ok(SendResult {
            hash: result.hash,
            status: result.status,
            error_codes: result.error_result_codes,
        })
    }

    async fn get_transaction(&self, hash: &str) -> Result<TxStatusResponse, ProtocolError> {
        let result: TxStatusDto = self.call("getTransaction", json!({ "hash": hash })).await?;
        Ok(TxStatusResponse {
            status: result.status,
            ledger: result.ledger,
            result_codes: result.result_codes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_latest_ledger() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"sequence":1234}}"#)
            .create_async()
            .await;

        let client = NodeClient::new(&server.url());
        assert_eq!(client.get_latest_ledger().await.unwrap(), 1234);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rpc_error_surfaces_as_network_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"bad"}}"#)
            .create_async()
            .await;

        let client = NodeClient::new(&server.url());
        let result = client.get_latest_ledger().await;
        assert!(matches!(result, Err(ProtocolError::Network(msg)) if msg.contains("-32600")));
    }

    #[tokio::test]
    async fn test_send_transaction_parses_status_and_codes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                r#"{"jsonrpc":"2.0","id":1,"result":
                   {"hash":"abc123","status":"ERROR","errorResultCodes":["tx_bad_seq"]}}"#,
            )
            .create_async()
            .await;

        let client = NodeClient::new(&server.url());
        let result = client.send_transaction("AAAA").await.unwrap();
        assert_eq!(result.status, SendStatus::Error);
        assert_eq!(result.error_codes, vec!["tx_bad_seq"]);
    }
}
