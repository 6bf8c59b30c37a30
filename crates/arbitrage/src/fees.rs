//! Basis point arithmetic, fee adjustment, and exchange truncation rules.
//!
//! A basis point is 1/10 000. Fees apply to both legs: the buy costs
//! `price * (1 + fee)` and the sell yields `price * (1 - fee)`.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Basis points per unit.
pub const BPS_DENOMINATOR: Decimal = dec!(10000);

/// Decimal places allowed in a base currency order quantity.
pub const QUANTITY_PRECISION: u32 = 5;

/// Decimal places allowed in a limit price.
pub const PRICE_PRECISION: u32 = 8;

// =============================================================================
// Truncation
// =============================================================================

/// Truncates a quantity toward zero to [`QUANTITY_PRECISION`] places.
#[must_use]
pub fn truncate_quantity(quantity: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(QUANTITY_PRECISION, RoundingStrategy::ToZero)
}

/// Truncates a price toward zero to [`PRICE_PRECISION`] places.
#[must_use]
pub fn truncate_price(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(PRICE_PRECISION, RoundingStrategy::ToZero)
}

// =============================================================================
// Fee Model
// =============================================================================

/// Symmetric per-leg fee expressed in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeModel {
    fee_rate_bps: Decimal,
}

impl FeeModel {
    /// Creates a fee model from a rate in basis points.
    #[must_use]
    pub fn new(fee_rate_bps: Decimal) -> Self {
        Self { fee_rate_bps }
    }

    /// A model that charges nothing.
    #[must_use]
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Returns the fee rate in basis points.
    #[must_use]
    pub fn rate_bps(&self) -> Decimal {
        self.fee_rate_bps
    }

    /// Returns the fee as a fraction.
    #[must_use]
    pub fn rate(&self) -> Decimal {
        self.fee_rate_bps / BPS_DENOMINATOR
    }

    /// Quote amount paid for a buy of the given pre-fee value.
    #[must_use]
    pub fn with_buy_fee(&self, amount: Decimal) -> Decimal {
        amount * (Decimal::ONE + self.rate())
    }

    /// Quote amount received for a sell of the given pre-fee value.
    #[must_use]
    pub fn net_of_sell_fee(&self, amount: Decimal) -> Decimal {
        amount * (Decimal::ONE - self.rate())
    }
}

// =============================================================================
// Profitability
// =============================================================================

/// Return of moving from `from` to `to`, in basis points of `from`.
///
/// Returns `None` when `from` is not positive.
#[must_use]
pub fn bps_between(from: Decimal, to: Decimal) -> Option<Decimal> {
    if from <= Decimal::ZERO {
        return None;
    }
    Some((to - from) / from * BPS_DENOMINATOR)
}

/// Returns true if buying at `ask` and selling at `bid` clears the threshold.
///
/// Both prices are scaled by `1 + fee` before comparison. Non-positive asks
/// never qualify.
#[must_use]
pub fn is_arb_above_threshold(
    ask: Decimal,
    bid: Decimal,
    fee_rate_bps: Decimal,
    profit_threshold_bps: Decimal,
) -> bool {
    let fees = FeeModel::new(fee_rate_bps);
    let adjusted_buy = fees.with_buy_fee(ask);
    let adjusted_sell = fees.with_buy_fee(bid);

    bps_between(adjusted_buy, adjusted_sell).is_some_and(|bps| bps >= profit_threshold_bps)
}
