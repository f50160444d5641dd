//! Fee and swap-spend estimation
//!
//! Two estimates feed the bundle: how much native fee currency the attempt
//! needs, and the ceiling on fee-token spend the caller authorizes for the
//! swap that acquires it. Both are computed with integer arithmetic only:
//! the final numbers go on-chain as `i128`, so there is no floating point
//! anywhere on that path and overflow is an error, never a wrap.
//!
//! The fixed-multiple heuristic matches the demo contract: it must never
//! underestimate below what the swap sub-call requires, because an
//! underestimate reverts the whole aggregate call. A live strict-receive
//! quote is available for deployments that want market-accurate numbers.

use crate::network::{Asset, LedgerService};
use crate::protocol::errors::ProtocolError;
use crate::strkey::AccountId;

/// Minimum per-operation fee in the network's smallest native unit.
pub const BASE_FEE: u64 = 100;

/// Smallest-unit precision of token amounts: 7 decimal places.
pub const AMOUNT_SCALE: i128 = 10_000_000;

/// Slippage buffer applied to live path quotes, in percent.
const QUOTE_SLIPPAGE_PCT: i128 = 2;

fn checked_mul(a: i128, b: i128) -> Result<i128, ProtocolError> {
    a.checked_mul(b)
        .ok_or_else(|| ProtocolError::Overflow(format!("{a} * {b}")))
}

fn ceil_div(a: i128, b: i128) -> Result<i128, ProtocolError> {
    if b <= 0 {
        return Err(ProtocolError::input("division by non-positive denominator"));
    }
    let add = a
        .checked_add(b - 1)
        .ok_or_else(|| ProtocolError::Overflow(format!("{a} + {b} - 1")))?;
    Ok(add / b)
}

/// Exchange rate expressed as a rational number of fee-token units per
/// native unit, so estimates stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeRate {
    numer: i128,
    denom: i128,
}

impl ExchangeRate {
    pub fn new(numer: i128, denom: i128) -> Result<Self, ProtocolError> {
        if numer < 0 || denom <= 0 {
            return Err(ProtocolError::input(
                "exchange rate must be non-negative with a positive denominator",
            ));
        }
        Ok(Self { numer, denom })
    }

    /// Rate given in 7-decimal scaled units, e.g. `4_000_000` for 0.4.
    pub fn from_scaled(scaled: i128) -> Result<Self, ProtocolError> {
        Self::new(scaled, AMOUNT_SCALE)
    }
}

/// Native fee estimate: a fixed multiple of the minimum per-operation fee.
#[derive(Debug, Clone, Copy)]
pub struct FeeEstimator {
    base_fee: u64,
    multiplier: u32,
}

impl FeeEstimator {
    pub fn new(base_fee: u64, multiplier: u32) -> Self {
        Self {
            base_fee,
            multiplier,
        }
    }

    /// How much native fee currency the caller must acquire for one attempt.
    pub fn estimate_fee_in_native(&self) -> i128 {
        self.base_fee as i128 * self.multiplier as i128
    }
}

impl Default for FeeEstimator {
    fn default() -> Self {
        Self::new(BASE_FEE, 2)
    }
}

/// Inputs for the fee-token spend ceiling.
#[derive(Debug, Clone, Copy)]
pub struct MaxSpendParams {
    /// Extra margin in 7-decimal scaled fee-token units.
    pub margin_scaled: i128,
    /// Estimated native amount the swap must deliver, in smallest units.
    pub estimated_native: i128,
    /// Native → fee-token conversion rate.
    pub rate: ExchangeRate,
}

/// Ceiling on fee-token spend:
/// `ceil((estimated_native * rate + margin) * scale)`, computed exactly as
/// `ceil(native * numer * scale / denom) + margin_scaled`.
pub fn estimate_max_spend_in_fee_token(params: MaxSpendParams) -> Result<i128, ProtocolError> {
    if params.margin_scaled < 0 || params.estimated_native < 0 {
        return Err(ProtocolError::input(
            "margin and native amount must be non-negative",
        ));
    }
    let scaled_product = checked_mul(
        checked_mul(params.estimated_native, params.rate.numer)?,
        AMOUNT_SCALE,
    )?;
    let converted = ceil_div(scaled_product, params.rate.denom)?;
    converted
        .checked_add(params.margin_scaled)
        .ok_or_else(|| ProtocolError::Overflow(format!("{converted} + {}", params.margin_scaled)))
}

/// Parse a 7-decimal amount string ("12.5", "0.0000001") into scaled units.
/// Amounts are always non-negative on this path.
pub fn parse_scaled_amount(text: &str) -> Result<i128, ProtocolError> {
    if text.starts_with('-') {
        return Err(ProtocolError::input("negative amount"));
    }
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(ProtocolError::input("empty amount"));
    }
    if frac.len() > 7 {
        return Err(ProtocolError::input(format!(
            "amount {text:?} has more than 7 decimal places"
        )));
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::input(format!("invalid amount {text:?}")));
    }
    let whole: i128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| ProtocolError::input(format!("invalid amount {text:?}")))?
    };
    let mut frac_scaled: i128 = 0;
    if !frac.is_empty() {
        let parsed: i128 = frac
            .parse()
            .map_err(|_| ProtocolError::input(format!("invalid amount {text:?}")))?;
        frac_scaled = parsed * 10i128.pow(7 - frac.len() as u32);
    }
    checked_mul(whole, AMOUNT_SCALE)?
        .checked_add(frac_scaled)
        .ok_or_else(|| ProtocolError::Overflow(text.to_string()))
}

/// Format scaled units back into the 7-decimal string form the ledger
/// service expects.
pub fn format_scaled_amount(scaled: i128) -> String {
    let whole = scaled / AMOUNT_SCALE;
    let frac = (scaled % AMOUNT_SCALE).abs();
    format!("{whole}.{frac:07}")
}

/// A live swap quote: the send ceiling plus the asset hops to route through.
#[derive(Debug, Clone)]
pub struct PathQuote {
    pub send_max_scaled: i128,
    pub path: Vec<Asset>,
}

/// Query strict-receive paths for delivering `dest_amount_scaled` of native
/// to the caller, preferring paths that spend the configured fee token, and
/// add a slippage buffer on top of the cheapest source amount.
pub async fn quote_swap_strict_receive(
    ledger: &dyn LedgerService,
    source_account: &AccountId,
    fee_token: &Asset,
    dest_amount_scaled: i128,
) -> Result<PathQuote, ProtocolError> {
    let records = ledger
        .strict_receive_paths(source_account, dest_amount_scaled)
        .await?;
    if records.is_empty() {
        return Err(ProtocolError::input(
            "no swap path found to deliver the requested native amount",
        ));
    }

    let mut candidates: Vec<_> = records
        .iter()
        .filter(|r| &r.source_asset == fee_token)
        .collect();
    if candidates.is_empty() {
        candidates = records.iter().collect();
    }
    candidates.sort_by_key(|r| r.source_amount_scaled);
    let best = candidates[0];

    let send_max_scaled = ceil_div(
        checked_mul(best.source_amount_scaled, 100 + QUOTE_SLIPPAGE_PCT)?,
        100,
    )?;
    Ok(PathQuote {
        send_max_scaled,
        path: best.path.clone(),
    })
}
