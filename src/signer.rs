//! Key-holder capability interface
//!
//! The protocol never touches key material directly: the caller signs
//! authorization payloads and the payer signs transaction envelopes through
//! these traits. Two variants are provided, selected at the boundary: an
//! in-process ed25519 key (relay payer, tests) and an HTTP bridge to a
//! remote wallet (browser extension, hardware signer).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::protocol::errors::ProtocolError;
use crate::strkey::{AccountId, SecretSeed};

/// A detached ed25519 signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBytes(pub Vec<u8>);

impl SignatureBytes {
    fn to_fixed(&self) -> Result<[u8; 64], ProtocolError> {
        self.0
            .as_slice()
            .try_into()
            .map_err(|_| ProtocolError::input(format!("signature must be 64 bytes, got {}", self.0.len())))
    }
}

/// Signs authorization-entry payloads on behalf of the caller identity.
#[async_trait]
pub trait AuthEntrySigner: Send + Sync {
    fn public_key(&self) -> AccountId;

    async fn sign_auth_payload(&self, payload: &[u8]) -> Result<SignatureBytes, ProtocolError>;
}

/// Signs transaction envelopes on behalf of the paying identity.
#[async_trait]
pub trait TxSigner: Send + Sync {
    fn public_key(&self) -> AccountId;

    async fn sign_envelope_payload(&self, payload: &[u8])
        -> Result<SignatureBytes, ProtocolError>;
}

/// Verify a detached signature against the identity's public key.
pub fn verify_signature(
    account: &AccountId,
    payload: &[u8],
    signature: &SignatureBytes,
) -> Result<(), ProtocolError> {
    let key = VerifyingKey::from_bytes(&account.raw_key())
        .map_err(|e| ProtocolError::input(format!("invalid public key for {account}: {e}")))?;
    let sig = Signature::from_bytes(&signature.to_fixed()?);
    key.verify_strict(payload, &sig)
        .map_err(|e| ProtocolError::Signing(format!("signature verification failed: {e}")))
}

/// In-process ed25519 key. The seed is decoded from an `S...` strkey and
/// zeroized after the signing key is derived.
pub struct LocalKeySigner {
    signing_key: SigningKey,
    account: AccountId,
}

impl LocalKeySigner {
    pub fn from_secret_seed(seed: &str) -> Result<Self, ProtocolError> {
        let seed = SecretSeed::from_str(seed)?;
        Ok(Self::from_seed_bytes(seed.raw()))
    }

    pub fn from_seed_bytes(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let account = AccountId::from_raw_key(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            account,
        }
    }

    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        let signing_key = SigningKey::generate(&mut rng);
        let account = AccountId::from_raw_key(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            account,
        }
    }

    /// The identity this key controls.
    pub fn public_key(&self) -> AccountId {
        self.account.clone()
    }

    fn sign(&self, payload: &[u8]) -> SignatureBytes {
        SignatureBytes(self.signing_key.sign(payload).to_bytes().to_vec())
    }
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthEntrySigner for LocalKeySigner {
    fn public_key(&self) -> AccountId {
        self.account.clone()
    }

    async fn sign_auth_payload(&self, payload: &[u8]) -> Result<SignatureBytes, ProtocolError> {
        Ok(self.sign(payload))
    }
}

#[async_trait]
impl TxSigner for LocalKeySigner {
    fn public_key(&self) -> AccountId {
        self.account.clone()
    }

    async fn sign_envelope_payload(
        &self,
        payload: &[u8],
    ) -> Result<SignatureBytes, ProtocolError> {
        Ok(self.sign(payload))
    }
}

#[derive(Serialize)]
struct RemoteSignRequest<'a> {
    payload: &'a str,
}

#[derive(Deserialize)]
struct RemoteSignResponse {
    signature: String,
}

/// HTTP bridge to a wallet that holds the key elsewhere. The bridge exposes
/// `POST /sign-auth-entry` and `POST /sign-transaction`, both taking and
/// returning base64.
pub struct RemoteWalletSigner {
    client: reqwest::Client,
    base_url: String,
    account: AccountId,
}

impl RemoteWalletSigner {
    pub fn new(base_url: &str, account: AccountId) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            account,
        }
    }

    pub fn public_key(&self) -> AccountId {
        self.account.clone()
    }

    async fn request_signature(
        &self,
        endpoint: &str,
        payload: &[u8],
    ) -> Result<SignatureBytes, ProtocolError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let body = RemoteSignRequest {
            payload: &BASE64.encode(payload),
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProtocolError::network(format!("wallet bridge: {e}")))?;
        if !response.status().is_success() {
            return Err(ProtocolError::Signing(format!(
                "wallet bridge refused to sign: HTTP {}",
                response.status()
            )));
        }
        let parsed: RemoteSignResponse = response
            .json()
            .await
            .map_err(|e| ProtocolError::network(format!("wallet bridge: {e}")))?;
        let bytes = BASE64
            .decode(&parsed.signature)
            .map_err(|e| ProtocolError::Signing(format!("wallet returned bad base64: {e}")))?;
        Ok(SignatureBytes(bytes))
    }
}

#[async_trait]
impl AuthEntrySigner for RemoteWalletSigner {
    fn public_key(&self) -> AccountId {
        self.account.clone()
    }

    async fn sign_auth_payload(&self, payload: &[u8]) -> Result<SignatureBytes, ProtocolError> {
        self.request_signature("sign-auth-entry", payload).await
    }
}

#[async_trait]
impl TxSigner for RemoteWalletSigner {
    fn public_key(&self) -> AccountId {
        self.account.clone()
    }

    async fn sign_envelope_payload(
        &self,
        payload: &[u8],
    ) -> Result<SignatureBytes, ProtocolError> {
        self.request_signature("sign-transaction", payload).await
    }
}
