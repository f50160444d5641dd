//! Invocation encoding
//!
//! The router contract executes a bundle of sub-calls passed as
//! `exec(caller, Vec<(contract, method, args, allow_failure)>)`. This module
//! builds those 4-field tuples from typed argument values and gives every
//! call a canonical byte form, so that encoding the same invocation twice is
//! byte-for-byte identical and call digests are stable.
//!
//! Only shape validation happens here (strkey format, symbol charset);
//! semantic validation such as balance checks is left to the network at
//! simulation time.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::protocol::errors::ProtocolError;
use crate::strkey::{AccountId, ContractId};

/// Longest method name the contract calling convention accepts.
pub const MAX_SYMBOL_LEN: usize = 32;

/// A typed contract-call argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScValue {
    Account(AccountId),
    Contract(ContractId),
    Symbol(String),
    Str(String),
    Bool(bool),
    U32(u32),
    U64(u64),
    I128(i128),
    U128(u128),
    Bytes(Vec<u8>),
    Vec(Vec<ScValue>),
}

impl ScValue {
    /// Canonical byte form. Identical values always serialize identically.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serialize(self).map_err(|e| ProtocolError::Internal(e.to_string()))
    }
}

fn validate_symbol(method: &str) -> Result<(), ProtocolError> {
    if method.is_empty() || method.len() > MAX_SYMBOL_LEN {
        return Err(ProtocolError::input(format!(
            "method symbol must be 1..={MAX_SYMBOL_LEN} characters, got {}",
            method.len()
        )));
    }
    if let Some(ch) = method
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(ProtocolError::input(format!(
            "method symbol contains invalid character {ch:?}"
        )));
    }
    Ok(())
}

/// One sub-call to be executed by the router.
///
/// Immutable once built; `allow_failure` tells the router to push the error
/// value instead of reverting the whole bundle when this sub-call fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    contract: ContractId,
    method: String,
    args: Vec<ScValue>,
    allow_failure: bool,
}

impl Invocation {
    pub fn new(
        contract: ContractId,
        method: &str,
        args: Vec<ScValue>,
        allow_failure: bool,
    ) -> Result<Self, ProtocolError> {
        validate_symbol(method)?;
        Ok(Self {
            contract,
            method: method.to_string(),
            args,
            allow_failure,
        })
    }

    pub fn contract(&self) -> &ContractId {
        &self.contract
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn allow_failure(&self) -> bool {
        self.allow_failure
    }

    /// Encode as the router's 4-field tuple:
    /// `(Address, Symbol, Vec<Val>, bool)`.
    pub fn encode(&self) -> ScValue {
        ScValue::Vec(vec![
            ScValue::Contract(self.contract.clone()),
            ScValue::Symbol(self.method.clone()),
            ScValue::Vec(self.args.clone()),
            ScValue::Bool(self.allow_failure),
        ])
    }
}

/// The full bundle the router executes on behalf of one caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCall {
    caller: AccountId,
    invocations: Vec<Invocation>,
}

impl AggregateCall {
    pub fn new(caller: AccountId, invocations: Vec<Invocation>) -> Result<Self, ProtocolError> {
        if invocations.is_empty() {
            return Err(ProtocolError::input("aggregate call has no invocations"));
        }
        Ok(Self {
            caller,
            invocations,
        })
    }

    pub fn caller(&self) -> &AccountId {
        &self.caller
    }

    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }

    /// The argument list for the router's `exec` entry point:
    /// `[caller, Vec<encoded invocation>]`.
    pub fn exec_args(&self) -> Vec<ScValue> {
        vec![
            ScValue::Account(self.caller.clone()),
            ScValue::Vec(self.invocations.iter().map(Invocation::encode).collect()),
        ]
    }

    /// SHA-256 over the canonical encoding of the exec arguments. This is
    /// the value that binds simulation results and signed authorization
    /// entries to exactly this call.
    pub fn digest(&self) -> Result<CallDigest, ProtocolError> {
        CallDigest::of_args(&self.exec_args())
    }
}

/// Digest binding an operation, its simulation and its authorization
/// entries together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallDigest(pub [u8; 32]);

impl CallDigest {
    pub fn of_args(args: &[ScValue]) -> Result<Self, ProtocolError> {
        let bytes =
            bincode::serialize(args).map_err(|e| ProtocolError::Internal(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(Self(hasher.finalize().into()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for CallDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
