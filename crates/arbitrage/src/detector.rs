//! Crossed book detection.
//!
//! [`find_arb`] walks the ask ladder from the top, pairing each ask against
//! the bid cursor for as long as the pairing clears the profit threshold and
//! quote budget remains. The result is one buy limit order that sweeps every
//! consumed ask and one sell limit order that sweeps every consumed bid.

use chrono::Utc;
use crossarb_core::{ArbOpportunity, ArbStatus, OrderBook, Pair, TradeLimits};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

use crate::fees::{
    bps_between, is_arb_above_threshold, truncate_price, truncate_quantity, FeeModel,
};

// =============================================================================
// Book Walk
// =============================================================================

/// Totals accumulated while pairing asks against bids.
#[derive(Debug, Default)]
struct Walk {
    bought: Decimal,
    buy_cost: Decimal,
    sell_proceeds: Decimal,
    highest_buy: Option<Decimal>,
    lowest_sell: Option<Decimal>,
}

fn walk_book(book: &OrderBook, limits: &TradeLimits, fees: FeeModel, budget: Decimal) -> Walk {
    let passes = |ask: Decimal, bid: Decimal| {
        is_arb_above_threshold(ask, bid, limits.fee_rate_bps, limits.profit_threshold_bps)
    };

    let mut bids = book.bids.clone();
    let mut bid_index = 0;
    let mut walk = Walk::default();

    'asks: for ask in &book.asks {
        if ask.price <= Decimal::ZERO {
            break;
        }

        // The buy is one limit order at the worst consumed ask, so the whole
        // quantity must be affordable at this ask's price.
        let affordable = budget / fees.with_buy_fee(ask.price) - walk.bought;
        if affordable <= Decimal::ZERO {
            break;
        }
        let mut ask_left = affordable.min(ask.quantity);

        while ask_left > Decimal::ZERO {
            let Some(bid) = bids.get_mut(bid_index) else {
                break 'asks;
            };
            // Asks only get worse from here, so a failed pairing ends the scan.
            if !passes(ask.price, bid.price) {
                break 'asks;
            }

            let slice = ask_left.min(bid.quantity);
            if slice > Decimal::ZERO {
                bid.quantity -= slice;
                ask_left -= slice;

                walk.bought += slice;
                walk.buy_cost += slice * ask.price;
                walk.sell_proceeds += slice * bid.price;
                walk.highest_buy = Some(ask.price);
                walk.lowest_sell = Some(bid.price);
            }

            if bid.quantity <= Decimal::ZERO {
                bid_index += 1;
            }
        }
    }

    walk
}

// =============================================================================
// Detection
// =============================================================================

/// Finds the largest profitable crossed trade in `book`.
///
/// The quote budget is the smaller of `limits.max_order_amount` and
/// `available_quote`. Returns `None` when the book is not crossed, nothing
/// clears the threshold, or the sized trade fails any of the limits.
///
/// The caller's book is never modified.
#[must_use]
pub fn find_arb(
    book: &OrderBook,
    limits: &TradeLimits,
    available_quote: Decimal,
) -> Option<ArbOpportunity> {
    if !book.is_crossed() {
        return None;
    }

    let fees = FeeModel::new(limits.fee_rate_bps);
    let budget = limits.max_order_amount.min(available_quote);
    if budget <= Decimal::ZERO {
        trace!(pair = %book.pair, "No quote budget available");
        return None;
    }

    let walk = walk_book(book, limits, fees, budget);
    let (Some(highest_buy), Some(lowest_sell)) = (walk.highest_buy, walk.lowest_sell) else {
        trace!(pair = %book.pair, "No ask/bid pairing clears the threshold");
        return None;
    };

    let buy_vwap = fees.with_buy_fee(walk.buy_cost) / walk.bought;
    let sell_vwap = fees.net_of_sell_fee(walk.sell_proceeds) / walk.bought;

    let quantity = truncate_quantity(walk.bought);
    if quantity <= Decimal::ZERO {
        trace!(pair = %book.pair, bought = %walk.bought, "Quantity truncates to zero");
        return None;
    }

    let edge = sell_vwap - buy_vwap;
    let expected_profit = edge * quantity;
    let profit_bps = bps_between(buy_vwap, sell_vwap)?;
    let buy_limit_price = truncate_price(highest_buy);
    let sell_limit_price = truncate_price(lowest_sell);

    if expected_profit <= Decimal::ZERO || profit_bps < limits.profit_threshold_bps {
        trace!(
            pair = %book.pair,
            profit = %expected_profit,
            profit_bps = %profit_bps,
            threshold_bps = %limits.profit_threshold_bps,
            "Fee-inclusive profit below threshold"
        );
        return None;
    }
    if quantity < limits.min_order_quantity || quantity >= limits.max_order_quantity {
        trace!(
            pair = %book.pair,
            quantity = %quantity,
            min = %limits.min_order_quantity,
            max = %limits.max_order_quantity,
            "Quantity outside limits"
        );
        return None;
    }
    if quantity * buy_limit_price < limits.min_order_amount {
        trace!(
            pair = %book.pair,
            amount = %(quantity * buy_limit_price),
            min = %limits.min_order_amount,
            "Order amount below minimum"
        );
        return None;
    }

    Some(ArbOpportunity {
        pair: book.pair.clone(),
        buy_vwap,
        sell_vwap,
        buy_limit_price,
        sell_limit_price,
        quantity,
        expected_profit,
        profit_bps,
        status: ArbStatus::Init,
        detected_at: Utc::now(),
        buy_started_at: None,
    })
}

/// Runs [`find_arb`] against a fixed set of limits.
#[derive(Debug, Clone)]
pub struct ArbDetector {
    limits: TradeLimits,
}

impl ArbDetector {
    /// Creates a detector for one pair's limits.
    #[must_use]
    pub fn new(limits: TradeLimits) -> Self {
        Self { limits }
    }

    /// Returns the limits.
    #[must_use]
    pub fn limits(&self) -> &TradeLimits {
        &self.limits
    }

    /// Detects an opportunity in `book` given the available quote balance.
    #[must_use]
    pub fn detect(&self, book: &OrderBook, available_quote: Decimal) -> Option<ArbOpportunity> {
        let opp = find_arb(book, &self.limits, available_quote)?;
        debug!(
            pair = %opp.pair,
            sequence = book.sequence,
            quantity = %opp.quantity,
            buy_limit = %opp.buy_limit_price,
            sell_limit = %opp.sell_limit_price,
            buy_vwap = %opp.buy_vwap,
            sell_vwap = %opp.sell_vwap,
            expected_profit = %opp.expected_profit,
            profit_bps = %opp.profit_bps,
            "Crossed book opportunity detected"
        );
        Some(opp)
    }

    /// Summarizes the top of `book` for diagnostics.
    #[must_use]
    pub fn summarize(&self, book: &OrderBook) -> Option<SpreadSummary> {
        SpreadSummary::from_book(book, self.limits.fee_rate_bps)
    }
}

// =============================================================================
// Spread Summary
// =============================================================================

/// Top-of-book snapshot used for per-update debug logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadSummary {
    /// Instrument.
    pub pair: Pair,
    /// Best bid price.
    pub best_bid: Decimal,
    /// Best ask price.
    pub best_ask: Decimal,
    /// Best bid minus best ask.
    pub spread: Decimal,
    /// Spread in basis points of the ask.
    pub spread_bps: Decimal,
    /// Return of buying the ask and selling the bid after both fees.
    pub net_spread_bps: Decimal,
}

impl SpreadSummary {
    /// Builds a summary, or `None` if either side of the book is empty.
    #[must_use]
    pub fn from_book(book: &OrderBook, fee_rate_bps: Decimal) -> Option<Self> {
        let best_bid = book.best_bid()?.price;
        let best_ask = book.best_ask()?.price;
        let fees = FeeModel::new(fee_rate_bps);

        Some(Self {
            pair: book.pair.clone(),
            best_bid,
            best_ask,
            spread: best_bid - best_ask,
            spread_bps: bps_between(best_ask, best_bid)?,
            net_spread_bps: bps_between(
                fees.with_buy_fee(best_ask),
                fees.net_of_sell_fee(best_bid),
            )?,
        })
    }

    /// Returns true if the top of book is profitable after fees.
    #[must_use]
    pub fn is_profitable(&self) -> bool {
        self.net_spread_bps > Decimal::ZERO
    }
}

impl fmt::Display for SpreadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bid {} ask {} spread {} ({} bps, {} bps net)",
            self.pair,
            self.best_bid,
            self.best_ask,
            self.spread,
            self.spread_bps.round_dp(2),
            self.net_spread_bps.round_dp(2)
        )
    }
}
