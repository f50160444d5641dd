//! The standard sponsored-payment bundle
//!
//! One aggregate call with two sub-calls: pay the recipient in the fee
//! token, and swap fee token for exactly the native amount the attempt
//! needs. The swap sub-call uses a strict-receive style entry point
//! (`swap_tokens_for_exact_tokens`) so the caller spends at most the
//! estimated ceiling.

use serde::{Deserialize, Serialize};

use crate::protocol::encoder::{AggregateCall, Invocation, ScValue};
use crate::protocol::errors::ProtocolError;
use crate::strkey::{AccountId, ContractId};

/// Swap deadline for demo bundles (year 3000, effectively no deadline).
pub const SWAP_DEADLINE_FOREVER: u64 = 32_503_680_000;

/// Contracts involved in the standard bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleContracts {
    /// Token the caller holds and pays with.
    pub fee_token: ContractId,
    /// Wrapped native token, the swap's output side.
    pub native_token: ContractId,
    /// The swap router executing the conversion.
    pub swap_router: ContractId,
}

/// What the caller actually wants done: pay someone in the fee token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsoredPayment {
    pub recipient: AccountId,
    /// Amount in the fee token's smallest units.
    pub amount: i128,
}

/// Build the two-invocation bundle: transfer to the recipient, then swap
/// fee token for exactly `fee_native` with spend capped at `max_spend`.
pub fn build_payment_bundle(
    caller: &AccountId,
    contracts: &BundleContracts,
    payment: &SponsoredPayment,
    fee_native: i128,
    max_spend: i128,
) -> Result<AggregateCall, ProtocolError> {
    if payment.amount <= 0 {
        return Err(ProtocolError::input("payment amount must be positive"));
    }
    if max_spend < 0 || fee_native < 0 {
        return Err(ProtocolError::input(
            "fee and spend ceiling must be non-negative",
        ));
    }

    let transfer = Invocation::new(
        contracts.fee_token.clone(),
        "transfer",
        vec![
            ScValue::Account(caller.clone()),
            ScValue::Account(payment.recipient.clone()),
            ScValue::I128(payment.amount),
        ],
        false,
    )?;

    let swap = Invocation::new(
        contracts.swap_router.clone(),
        "swap_tokens_for_exact_tokens",
        vec![
            ScValue::I128(fee_native),
            ScValue::I128(max_spend),
            ScValue::Vec(vec![
                ScValue::Contract(contracts.fee_token.clone()),
                ScValue::Contract(contracts.native_token.clone()),
            ]),
            ScValue::Account(caller.clone()),
            ScValue::U64(SWAP_DEADLINE_FOREVER),
        ],
        false,
    )?;

    AggregateCall::new(caller.clone(), vec![transfer, swap])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_account, test_contract};

    fn contracts() -> BundleContracts {
        BundleContracts {
            fee_token: test_contract(1),
            native_token: test_contract(2),
            swap_router: test_contract(3),
        }
    }

    #[test]
    fn test_bundle_shape() {
        let caller = test_account(1);
        let call = build_payment_bundle(
            &caller,
            &contracts(),
            &SponsoredPayment {
                recipient: test_account(2),
                amount: 10_000,
            },
            200,
            800_010_000,
        )
        .unwrap();

        assert_eq!(call.caller(), &caller);
        assert_eq!(call.invocations().len(), 2);
        assert_eq!(call.invocations()[0].method(), "transfer");
        assert_eq!(
            call.invocations()[1].method(),
            "swap_tokens_for_exact_tokens"
        );
        assert!(!call.invocations()[0].allow_failure());
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let caller = test_account(1);
        let payment = SponsoredPayment {
            recipient: test_account(2),
            amount: 0,
        };
        assert!(build_payment_bundle(&caller, &contracts(), &payment, 200, 1).is_err());
    }
}
