//! Wire envelopes
//!
//! Everything that crosses a process boundary (drafts sent to the node for
//! simulation, signed transactions posted to the relay, fee-bump wrappers)
//! travels as base64 over a canonical binary encoding. Decoding failures are
//! input errors: rejected immediately, no network call attempted.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::protocol::assemble::SignedTransaction;
use crate::protocol::errors::ProtocolError;
use crate::signer::SignatureBytes;
use crate::strkey::AccountId;

/// Serialize a wire value to its base64 envelope form.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    let bytes = bincode::serialize(value).map_err(|e| ProtocolError::Internal(e.to_string()))?;
    Ok(BASE64.encode(bytes))
}

/// Parse a base64 envelope. Malformed input is an [`ProtocolError::Input`].
pub fn decode_payload<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    let bytes = BASE64
        .decode(text.trim())
        .map_err(|e| ProtocolError::input(format!("invalid base64 envelope: {e}")))?;
    bincode::deserialize(&bytes)
        .map_err(|e| ProtocolError::input(format!("malformed envelope: {e}")))
}

/// The outermost wire form accepted by the relay: either a payer-signed
/// transaction or a fee-bump wrapper around one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransactionEnvelope {
    Transaction(SignedTransaction),
    FeeBump(SignedFeeBump),
}

impl TransactionEnvelope {
    pub fn to_base64(&self) -> Result<String, ProtocolError> {
        encode_payload(self)
    }

    pub fn from_base64(text: &str) -> Result<Self, ProtocolError> {
        decode_payload(text)
    }
}

/// A fee-bump transaction: the relay takes over the fee for an already
/// signed inner transaction without touching its contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeBumpTransaction {
    pub fee_source: AccountId,
    /// Total fee the fee source offers; must exceed the inner fee.
    pub fee: u64,
    pub inner: SignedTransaction,
}

impl FeeBumpTransaction {
    /// Wrap a signed inner transaction, offering `margin` on top of its fee.
    pub fn wrap(
        inner: SignedTransaction,
        fee_source: AccountId,
        margin: u64,
    ) -> Result<Self, ProtocolError> {
        let fee = inner
            .tx
            .fee
            .checked_add(margin)
            .ok_or_else(|| ProtocolError::Overflow(format!("{} + {margin}", inner.tx.fee)))?;
        Ok(Self {
            fee_source,
            fee,
            inner,
        })
    }
}

/// A fee-bump transaction after the fee source signed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedFeeBump {
    pub tx: FeeBumpTransaction,
    pub signature: SignatureBytes,
}

impl SignedFeeBump {
    pub fn verify(&self, network_passphrase: &str) -> Result<(), ProtocolError> {
        let payload = fee_bump_signing_payload(network_passphrase, &self.tx)?;
        crate::signer::verify_signature(&self.tx.fee_source, &payload, &self.signature)
    }
}

/// The byte preimage the fee source signs: `sha256(passphrase) || fee bump`.
pub fn fee_bump_signing_payload(
    network_passphrase: &str,
    tx: &FeeBumpTransaction,
) -> Result<Vec<u8>, ProtocolError> {
    use sha2::{Digest, Sha256};
    let network_id: [u8; 32] = Sha256::digest(network_passphrase.as_bytes()).into();
    let body = bincode::serialize(tx).map_err(|e| ProtocolError::Internal(e.to_string()))?;
    let mut payload = Vec::with_capacity(32 + body.len());
    payload.extend_from_slice(&network_id);
    payload.extend_from_slice(&body);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let value = vec![1u64, 2, 3];
        let encoded = encode_payload(&value).unwrap();
        let decoded: Vec<u64> = decode_payload(&encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_bad_base64_is_an_input_error() {
        let result: Result<Vec<u64>, _> = decode_payload("not base64 !!!");
        assert!(matches!(result, Err(ProtocolError::Input(_))));
    }

    #[test]
    fn test_truncated_payload_is_an_input_error() {
        let encoded = encode_payload(&vec![1u64, 2, 3]).unwrap();
        let truncated = &encoded[..encoded.len() / 2];
        let result: Result<Vec<u64>, _> = decode_payload(truncated);
        assert!(matches!(result, Err(ProtocolError::Input(_))));
    }
}
