//! Horizon ledger-service client
//!
//! Production implementation of [`crate::network::LedgerService`] over the
//! Horizon REST API. Transient transport failures are retried a couple of
//! times with a short fixed interval; HTTP error statuses are not retried.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

use crate::network::{AccountSnapshot, Asset, Balance, FeeStats, LedgerService, PathRecord};
use crate::protocol::errors::ProtocolError;
use crate::protocol::estimator::{format_scaled_amount, parse_scaled_amount};
use crate::strkey::AccountId;

const TRANSPORT_RETRIES: usize = 2;
const RETRY_INTERVAL_MS: u64 = 250;

pub struct HorizonClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    sequence: String,
    balances: Vec<BalanceResponse>,
}

#[derive(Deserialize)]
struct BalanceResponse {
    asset_type: String,
    balance: String,
    asset_code: Option<String>,
    asset_issuer: Option<String>,
}

#[derive(Deserialize)]
struct FeeStatsResponse {
    last_ledger_base_fee: String,
    fee_charged: FeeCharged,
}

#[derive(Deserialize)]
struct FeeCharged {
    p95: String,
}

#[derive(Deserialize)]
struct PathsResponse {
    #[serde(rename = "_embedded")]
    embedded: EmbeddedRecords,
}

#[derive(Deserialize)]
struct EmbeddedRecords {
    records: Vec<PathResponse>,
}

#[derive(Deserialize)]
struct PathResponse {
    source_asset_type: String,
    source_asset_code: Option<String>,
    source_asset_issuer: Option<String>,
    source_amount: String,
    path: Vec<PathHop>,
}

#[derive(Deserialize)]
struct PathHop {
    asset_type: String,
    asset_code: Option<String>,
    asset_issuer: Option<String>,
}

fn parse_asset(
    asset_type: &str,
    code: Option<&str>,
    issuer: Option<&str>,
) -> Result<Asset, ProtocolError> {
    match asset_type {
        "native" => Ok(Asset::Native),
        "credit_alphanum4" | "credit_alphanum12" => {
            let code = code
                .ok_or_else(|| ProtocolError::network("credit asset without code"))?
                .to_string();
            let issuer = AccountId::from_str(
                issuer.ok_or_else(|| ProtocolError::network("credit asset without issuer"))?,
            )?;
            Ok(Asset::Credit { code, issuer })
        }
        other => Err(ProtocolError::network(format!(
            "unknown asset type {other:?}"
        ))),
    }
}

impl HorizonClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ProtocolError> {
        let url = format!("{}{path}", self.base_url);
        let strategy = FixedInterval::from_millis(RETRY_INTERVAL_MS).take(TRANSPORT_RETRIES);
        let response = Retry::spawn(strategy, || self.client.get(url.as_str()).send())
            .await
            .map_err(|e| ProtocolError::network(format!("horizon: {e}")))?;
        if !response.status().is_success() {
            return Err(ProtocolError::network(format!(
                "horizon: HTTP {} for {path}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ProtocolError::network(format!("horizon: {e}")))
    }
}

#[async_trait]
impl LedgerService for HorizonClient {
    async fn load_account(&self, id: &AccountId) -> Result<AccountSnapshot, ProtocolError> {
        let raw: AccountResponse = self.get_json(&format!("/accounts/{id}")).await?;
        let sequence: i64 = raw
            .sequence
            .parse()
            .map_err(|_| ProtocolError::network(format!("bad sequence {:?}", raw.sequence)))?;
        let mut balances = Vec::with_capacity(raw.balances.len());
        for b in &raw.balances {
            balances.push(Balance {
                asset: parse_asset(&b.asset_type, b.asset_code.as_deref(), b.asset_issuer.as_deref())?,
                amount_scaled: parse_scaled_amount(&b.balance)?,
            });
        }
        Ok(AccountSnapshot {
            id: id.clone(),
            sequence,
            balances,
        })
    }

    async fn fee_stats(&self) -> Result<FeeStats, ProtocolError> {
        let raw: FeeStatsResponse = self.get_json("/fee_stats").await?;
        let base_fee = raw
            .last_ledger_base_fee
            .parse()
            .map_err(|_| ProtocolError::network("bad base fee"))?;
        let p95_fee = raw
            .fee_charged
            .p95
            .parse()
            .map_err(|_| ProtocolError::network("bad p95 fee"))?;
        Ok(FeeStats { base_fee, p95_fee })
    }

    async fn strict_receive_paths(
        &self,
        source_account: &AccountId,
        dest_amount_scaled: i128,
    ) -> Result<Vec<PathRecord>, ProtocolError> {
        let path = format!(
            "/paths/strict-receive?source_account={source_account}\
             &destination_asset_type=native&destination_amount={}",
            format_scaled_amount(dest_amount_scaled)
        );
        let raw: PathsResponse = self.get_json(&path).await?;
        let mut records = Vec::with_capacity(raw.embedded.records.len());
        for r in &raw.embedded.records {
            let mut hops = Vec::with_capacity(r.path.len());
            for hop in &r.path {
                hops.push(parse_asset(
                    &hop.asset_type,
                    hop.asset_code.as_deref(),
                    hop.asset_issuer.as_deref(),
                )?);
            }
            records.push(PathRecord {
                source_asset: parse_asset(
                    &r.source_asset_type,
                    r.source_asset_code.as_deref(),
                    r.source_asset_issuer.as_deref(),
                )?,
                source_amount_scaled: parse_scaled_amount(&r.source_amount)?,
                path: hops,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_account;

    #[tokio::test]
    async fn test_load_account_parses_horizon_shape() {
        let mut server = mockito::Server::new_async().await;
        let account = test_account(1);
        let body = format!(
            r#"{{
                "sequence": "4097",
                "balances": [
                    {{"asset_type": "native", "balance": "100.5000000"}},
                    {{"asset_type": "credit_alphanum4", "balance": "12.5",
                      "asset_code": "USDC",
                      "asset_issuer": "{issuer}"}}
                ]
            }}"#,
            issuer = test_account(2)
        );
        let mock = server
            .mock("GET", format!("/accounts/{account}").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let client = HorizonClient::new(&server.url());
        let snapshot = client.load_account(&account).await.unwrap();
        mock.assert_async().await;

        assert_eq!(snapshot.sequence, 4097);
        assert_eq!(snapshot.native_balance_scaled(), 1_005_000_000);
        assert_eq!(snapshot.balances.len(), 2);
    }

    #[tokio::test]
    async fn test_fee_stats() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/fee_stats")
            .with_status(200)
            .with_body(r#"{"last_ledger_base_fee": "100", "fee_charged": {"p95": "250"}}"#)
            .create_async()
            .await;

        let client = HorizonClient::new(&server.url());
        let stats = client.fee_stats().await.unwrap();
        mock.assert_async().await;
        assert_eq!(stats.base_fee, 100);
        assert_eq!(stats.p95_fee, 250);
    }

    #[tokio::test]
    async fn test_http_error_is_a_network_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fee_stats")
            .with_status(503)
            .create_async()
            .await;

        let client = HorizonClient::new(&server.url());
        assert!(matches!(
            client.fee_stats().await,
            Err(ProtocolError::Network(_))
        ));
    }
}
