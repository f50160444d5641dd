//! Configuration module for the Gasolina relay
//!
//! All keys, contract ids and network endpoints are explicit configuration
//! loaded from a TOML file with environment overrides for secret material.
//! Nothing here is process-wide state: components receive the pieces they
//! need at construction.

use serde::{Deserialize, Serialize};

use crate::strkey::ContractId;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network endpoints and identity
    pub network: NetworkConfig,

    /// Contract addresses the bundle is built against
    pub contracts: ContractsConfig,

    /// Fee/swap estimation parameters
    #[serde(default)]
    pub estimator: EstimatorConfig,

    /// Relay server configuration
    pub relay: RelayConfig,

    /// Confirmation polling
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Soroban node JSON-RPC endpoint
    pub rpc_url: String,

    /// Ledger/account service (Horizon) base URL
    pub horizon_url: String,

    /// Network passphrase, part of every signature preimage
    pub network_passphrase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// The aggregate router executing bundles
    pub router: ContractId,

    /// Token the caller pays with
    pub fee_token: ContractId,

    /// Wrapped native token, the swap output
    pub native_token: ContractId,

    /// Swap router for the fee conversion
    pub swap_router: ContractId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Multiple of the minimum per-operation fee to budget for
    #[serde(default = "default_fee_multiplier")]
    pub fee_multiplier: u32,

    /// Demo native -> fee-token rate in 7-decimal scaled units (0.4)
    #[serde(default = "default_rate_scaled")]
    pub rate_scaled: i64,

    /// Extra margin in scaled fee-token units (0.001)
    #[serde(default = "default_margin_scaled")]
    pub margin_scaled: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Sponsor secret seed (S...). Prefer the GASOLINA_SPONSOR_SECRET
    /// environment variable over putting this in the file.
    #[serde(default)]
    pub sponsor_secret: Option<String>,

    /// Added on top of the inner fee when fee-bumping
    #[serde(default = "default_fee_bump_margin")]
    pub fee_bump_margin: u64,

    /// Minimum native sponsor balance (scaled) required to accept work
    #[serde(default = "default_min_sponsor_balance")]
    pub min_sponsor_balance_scaled: i64,

    /// Per-IP request budget on /relay
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

// Default value functions
fn default_fee_multiplier() -> u32 {
    2
}
fn default_rate_scaled() -> i64 {
    4_000_000
}
fn default_margin_scaled() -> i64 {
    10_000
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3001
}
fn default_fee_bump_margin() -> u64 {
    100
}
fn default_min_sponsor_balance() -> i64 {
    100_000 // 0.01 native
}
fn default_rate_limit() -> u32 {
    100
}
fn default_poll_attempts() -> u32 {
    30
}
fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            fee_multiplier: default_fee_multiplier(),
            rate_scaled: default_rate_scaled(),
            margin_scaled: default_margin_scaled(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_poll_attempts(),
            interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Environment variable consulted for the sponsor seed before the file.
pub const SPONSOR_SECRET_ENV: &str = "GASOLINA_SPONSOR_SECRET";

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        if let Ok(secret) = std::env::var(SPONSOR_SECRET_ENV) {
            config.relay.sponsor_secret = Some(secret);
        }
        Ok(config)
    }

    /// The sponsor seed, wherever it came from
    pub fn sponsor_secret(&self) -> anyhow::Result<&str> {
        self.relay
            .sponsor_secret
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("sponsor secret not configured (set {SPONSOR_SECRET_ENV})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    const SAMPLE: &str = r#"
[network]
rpc_url = "https://soroban-testnet.stellar.org"
horizon_url = "https://horizon-testnet.stellar.org"
network_passphrase = "Test SDF Network ; September 2015"

[contracts]
router = "CCNXMLQRLAAZ5MGK5HXMWFDZEU6SE67Y5CHI3QTKXIGY46PUU5NJJZS5"
fee_token = "CBIELTK6YBZJU5UP2WWQEUCYKLPU6AUNZ2BQ4WWFEIE3USCIHMXQDAMA"
native_token = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC"
swap_router = "CCMAPXWVZD4USEKDWRYS7DA4Y3D7E2SDMGBFJUCEXTC7VN6CUBGWPFUS"

[relay]
port = 8080
"#;

    #[test]
    fn test_load_sample_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.relay.port, 8080);
        assert_eq!(config.relay.rate_limit_per_minute, 100);
        assert_eq!(config.estimator.fee_multiplier, 2);
        assert_eq!(config.estimator.rate_scaled, 4_000_000);
        assert_eq!(config.polling.max_attempts, 30);
        assert!(config.relay.sponsor_secret.is_none());
        assert!(config.sponsor_secret().is_err());
    }

    #[test]
    fn test_rejects_malformed_contract_id() {
        let broken = SAMPLE.replace(
            "CCNXMLQRLAAZ5MGK5HXMWFDZEU6SE67Y5CHI3QTKXIGY46PUU5NJJZS5",
            "not-a-contract",
        );
        assert!(toml::from_str::<Config>(&broken).is_err());
    }
}
