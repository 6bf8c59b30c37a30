//! Detected arbitrage opportunities and their lifecycle status.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InvalidTransition;
use crate::order::OrderRequest;
use crate::types::Pair;

// =============================================================================
// Lifecycle Status
// =============================================================================

/// Where an opportunity is in its buy-then-sell lifecycle.
///
/// ```text
/// INIT -> BUY_STARTED -> BUY_COMPLETE -> SELL_STARTED -> SELL_COMPLETE -> DONE
///              \                              \
///               +-> CANCELED                   +-> CANCELED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArbStatus {
    /// Detected, nothing placed yet.
    Init,
    /// Buy order resting on the book.
    BuyStarted,
    /// Buy filled; sell not yet placed.
    BuyComplete,
    /// Sell order resting on the book.
    SellStarted,
    /// Sell filled.
    SellComplete,
    /// Profit realized and logged.
    Done,
    /// Aborted while an order was resting.
    Canceled,
}

impl ArbStatus {
    /// Returns true if the status table allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::BuyStarted)
                | (Self::BuyStarted, Self::BuyComplete | Self::Canceled)
                | (Self::BuyComplete, Self::SellStarted)
                | (Self::SellStarted, Self::SellComplete | Self::Canceled)
                | (Self::SellComplete, Self::Done)
        )
    }

    /// Returns true for `DONE` and `CANCELED`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }

    /// Numeric status code used in log lines.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Init => 0,
            Self::BuyStarted => 50,
            Self::BuyComplete => 100,
            Self::SellStarted => 150,
            Self::SellComplete => 200,
            Self::Done => 300,
            Self::Canceled => -1,
        }
    }

    /// Returns the display name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::BuyStarted => "BUY_STARTED",
            Self::BuyComplete => "BUY_COMPLETE",
            Self::SellStarted => "SELL_STARTED",
            Self::SellComplete => "SELL_COMPLETE",
            Self::Done => "DONE",
            Self::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for ArbStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Opportunity
// =============================================================================

/// A sized, priced arbitrage trade on one pair.
///
/// VWAPs are fee-inclusive: `buy_vwap` includes the buy fee and `sell_vwap`
/// is net of the sell fee, so `(sell_vwap - buy_vwap) * quantity` is the
/// expected profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbOpportunity {
    /// Instrument traded.
    pub pair: Pair,
    /// Fee-inclusive average cost of the buy leg.
    pub buy_vwap: Decimal,
    /// Fee-net average proceeds of the sell leg.
    pub sell_vwap: Decimal,
    /// Limit price for the buy order (highest ask consumed).
    pub buy_limit_price: Decimal,
    /// Limit price for the sell order (lowest bid consumed).
    pub sell_limit_price: Decimal,
    /// Base currency quantity to buy then sell.
    pub quantity: Decimal,
    /// Expected profit in quote currency.
    pub expected_profit: Decimal,
    /// Expected return in basis points of the buy cost.
    pub profit_bps: Decimal,
    /// Lifecycle status.
    pub status: ArbStatus,
    /// When the opportunity was found.
    pub detected_at: DateTime<Utc>,
    /// When the buy order went live.
    pub buy_started_at: Option<DateTime<Utc>>,
}

impl ArbOpportunity {
    /// Moves to `next`, stamping the buy start time on `BUY_STARTED`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if the status table forbids the move;
    /// the status is left unchanged.
    pub fn transition(&mut self, next: ArbStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if next == ArbStatus::BuyStarted {
            self.buy_started_at = Some(Utc::now());
        }
        self.status = next;
        Ok(())
    }

    /// Buy order for the full opportunity quantity.
    #[must_use]
    pub fn buy_order(&self) -> OrderRequest {
        OrderRequest::buy(self.pair.clone(), self.quantity, self.buy_limit_price)
    }

    /// Sell order for whatever the buy actually filled.
    #[must_use]
    pub fn sell_order(&self, filled_quantity: Decimal) -> OrderRequest {
        OrderRequest::sell(self.pair.clone(), filled_quantity, self.sell_limit_price)
    }

    /// Quote currency committed at the buy limit.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.quantity * self.buy_limit_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn opportunity() -> ArbOpportunity {
        ArbOpportunity {
            pair: Pair::new("btc", "usd"),
            buy_vwap: dec!(100),
            sell_vwap: dec!(101),
            buy_limit_price: dec!(100),
            sell_limit_price: dec!(101),
            quantity: dec!(2),
            expected_profit: dec!(2),
            profit_bps: dec!(100),
            status: ArbStatus::Init,
            detected_at: Utc::now(),
            buy_started_at: None,
        }
    }

    // ==================== Status Table Tests ====================

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            ArbStatus::Init,
            ArbStatus::BuyStarted,
            ArbStatus::BuyComplete,
            ArbStatus::SellStarted,
            ArbStatus::SellComplete,
            ArbStatus::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_cancel_only_from_resting_states() {
        let all = [
            ArbStatus::Init,
            ArbStatus::BuyStarted,
            ArbStatus::BuyComplete,
            ArbStatus::SellStarted,
            ArbStatus::SellComplete,
            ArbStatus::Done,
            ArbStatus::Canceled,
        ];
        let allowed: Vec<_> = all
            .iter()
            .filter(|s| s.can_transition_to(ArbStatus::Canceled))
            .copied()
            .collect();
        assert_eq!(allowed, vec![ArbStatus::BuyStarted, ArbStatus::SellStarted]);
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let all = [
            ArbStatus::Init,
            ArbStatus::BuyStarted,
            ArbStatus::BuyComplete,
            ArbStatus::SellStarted,
            ArbStatus::SellComplete,
            ArbStatus::Done,
            ArbStatus::Canceled,
        ];
        for next in all {
            assert!(!ArbStatus::Done.can_transition_to(next));
            assert!(!ArbStatus::Canceled.can_transition_to(next));
        }
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(!ArbStatus::Init.can_transition_to(ArbStatus::BuyComplete));
        assert!(!ArbStatus::BuyStarted.can_transition_to(ArbStatus::SellStarted));
        assert!(!ArbStatus::BuyComplete.can_transition_to(ArbStatus::Canceled));
        assert!(!ArbStatus::SellStarted.can_transition_to(ArbStatus::Done));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ArbStatus::Init.code(), 0);
        assert_eq!(ArbStatus::SellStarted.code(), 150);
        assert_eq!(ArbStatus::Done.code(), 300);
        assert_eq!(ArbStatus::Canceled.code(), -1);
    }

    // ==================== Opportunity Tests ====================

    #[test]
    fn test_transition_stamps_buy_start() {
        let mut opp = opportunity();
        assert!(opp.buy_started_at.is_none());

        opp.transition(ArbStatus::BuyStarted).unwrap();
        assert_eq!(opp.status, ArbStatus::BuyStarted);
        assert!(opp.buy_started_at.is_some());
    }

    #[test]
    fn test_invalid_transition_leaves_status() {
        let mut opp = opportunity();
        let err = opp.transition(ArbStatus::SellComplete).unwrap_err();
        assert_eq!(err.from, ArbStatus::Init);
        assert_eq!(err.to, ArbStatus::SellComplete);
        assert_eq!(opp.status, ArbStatus::Init);
    }

    #[test]
    fn test_orders_from_opportunity() {
        let opp = opportunity();

        let buy = opp.buy_order();
        assert_eq!(buy.quantity, dec!(2));
        assert_eq!(buy.limit_price, dec!(100));

        let sell = opp.sell_order(dec!(1.5));
        assert_eq!(sell.quantity, dec!(1.5));
        assert_eq!(sell.limit_price, dec!(101));
        assert_eq!(opp.notional(), dec!(200));
    }
}
