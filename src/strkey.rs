//! Strkey identity types
//!
//! Stellar addresses are base32-encoded payloads with a version byte and a
//! CRC16 checksum: `G...` for accounts, `C...` for contracts, `S...` for
//! secret seeds. The protocol only ever moves these around as text, so the
//! newtypes here validate on construction and stay cheap to clone.
//!
//! Seeds are parse-only: they never implement `Serialize` and their raw bytes
//! are zeroized on drop.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

const VERSION_ACCOUNT: u8 = 6 << 3; // 'G'
const VERSION_CONTRACT: u8 = 2 << 3; // 'C'
const VERSION_SEED: u8 = 18 << 3; // 'S'

/// Encoded strkey length: 1 version byte + 32 payload bytes + 2 checksum
/// bytes, base32 without padding.
pub const STRKEY_LEN: usize = 56;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrkeyError {
    #[error("invalid strkey length: expected {STRKEY_LEN} characters, got {0}")]
    Length(usize),

    #[error("invalid base32 character {0:?}")]
    Charset(char),

    #[error("wrong version byte: expected {expected:#04x}, got {actual:#04x}")]
    Version { expected: u8, actual: u8 },

    #[error("checksum mismatch")]
    Checksum,
}

/// CRC16-XModem over the version byte and payload.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 8 / 5 + 1);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(text: &str) -> Result<Vec<u8>, StrkeyError> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for ch in text.chars() {
        let value = ALPHABET
            .iter()
            .position(|&a| a as char == ch)
            .ok_or(StrkeyError::Charset(ch))? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    Ok(out)
}

fn encode(version: u8, payload: &[u8; 32]) -> String {
    let mut data = Vec::with_capacity(35);
    data.push(version);
    data.extend_from_slice(payload);
    let checksum = crc16(&data);
    data.extend_from_slice(&checksum.to_le_bytes());
    base32_encode(&data)
}

fn decode(version: u8, text: &str) -> Result<[u8; 32], StrkeyError> {
    if text.len() != STRKEY_LEN {
        return Err(StrkeyError::Length(text.len()));
    }
    let data = base32_decode(text)?;
    // 56 base32 chars decode to 35 bytes exactly
    debug_assert_eq!(data.len(), 35);
    if data[0] != version {
        return Err(StrkeyError::Version {
            expected: version,
            actual: data[0],
        });
    }
    let checksum = u16::from_le_bytes([data[33], data[34]]);
    if crc16(&data[..33]) != checksum {
        return Err(StrkeyError::Checksum);
    }
    let mut payload = [0u8; 32];
    payload.copy_from_slice(&data[1..33]);
    Ok(payload)
}

/// A Stellar account identity (`G...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn from_str(text: &str) -> Result<Self, StrkeyError> {
        decode(VERSION_ACCOUNT, text)?;
        Ok(Self(text.to_string()))
    }

    /// Encode a raw ed25519 public key as an account identity.
    pub fn from_raw_key(key: &[u8; 32]) -> Self {
        Self(encode(VERSION_ACCOUNT, key))
    }

    /// The raw 32-byte ed25519 public key behind this identity.
    pub fn raw_key(&self) -> [u8; 32] {
        // Validated on construction, so this cannot fail
        decode(VERSION_ACCOUNT, &self.0).expect("validated strkey")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = StrkeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Soroban contract identity (`C...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractId(String);

impl ContractId {
    pub fn from_str(text: &str) -> Result<Self, StrkeyError> {
        decode(VERSION_CONTRACT, text)?;
        Ok(Self(text.to_string()))
    }

    pub fn from_raw_id(id: &[u8; 32]) -> Self {
        Self(encode(VERSION_CONTRACT, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContractId {
    type Error = StrkeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<ContractId> for String {
    fn from(value: ContractId) -> Self {
        value.0
    }
}

impl std::fmt::Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A secret seed (`S...`), parse-only. The decoded bytes live in a zeroizing
/// buffer and the textual form is never kept.
pub struct SecretSeed {
    raw: Zeroizing<[u8; 32]>,
}

impl SecretSeed {
    pub fn from_str(text: &str) -> Result<Self, StrkeyError> {
        let raw = decode(VERSION_SEED, text)?;
        Ok(Self {
            raw: Zeroizing::new(raw),
        })
    }

    pub fn raw(&self) -> &[u8; 32] {
        &self.raw
    }
}

impl std::fmt::Debug for SecretSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretSeed(..)")
    }
}
