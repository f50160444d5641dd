//! Gasolina - Sponsored Relay Library
//!
//! Lets a wallet user without native-token balance get a Soroban contract
//! invocation submitted: the caller signs only an authorization entry, the
//! relay pays for and submits the outer transaction.

pub mod config;
pub mod horizon;
pub mod metrics;
pub mod network;
pub mod protocol;
pub mod rpc;
pub mod server;
pub mod signer;
pub mod strkey;

// Test doubles for the network collaborators, shared by unit and
// integration tests.
pub mod test_utils;

// Re-export commonly used types
pub use protocol::{AggregateCall, Invocation, ProtocolError, ScValue};
pub use strkey::{AccountId, ContractId};
