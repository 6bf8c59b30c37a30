//! Market data and trading limit types.
//!
//! An [`OrderBook`] is a snapshot of one pair's ladders as delivered by the
//! market data feed. [`TradeLimits`] bound what the detector may propose for
//! that pair.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// Currency & Pair
// =============================================================================

/// A lowercase currency code such as `btc` or `usd`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Creates a currency, normalizing the code to lowercase.
    #[must_use]
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_lowercase())
    }

    /// Returns the currency code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Quote currencies recognised when parsing unseparated symbols like `btcusd`.
/// Longer codes come first so `btcusdt` is not split as `btcu`/`sdt`.
const KNOWN_QUOTES: [&str; 6] = ["usdt", "usdc", "usd", "eur", "btc", "eth"];

/// Error returned when a trading pair symbol cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid trading pair: {0:?}")]
pub struct ParsePairError(pub String);

/// A base/quote trading pair. Displays as the exchange symbol, e.g. `btcusd`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pair {
    /// Currency being bought and sold.
    pub base: Currency,
    /// Currency the price is denominated in.
    pub quote: Currency,
}

impl Pair {
    /// Creates a pair from its two currencies.
    #[must_use]
    pub fn new(base: impl Into<Currency>, quote: impl Into<Currency>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Returns the exchange symbol (`btcusd`).
    #[must_use]
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}

impl FromStr for Pair {
    type Err = ParsePairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();

        if let Some((base, quote)) = raw.split_once(['/', '-', '_']) {
            if base.is_empty() || quote.is_empty() {
                return Err(ParsePairError(s.to_string()));
            }
            return Ok(Self::new(base, quote));
        }

        KNOWN_QUOTES
            .iter()
            .find_map(|quote| {
                raw.strip_suffix(quote)
                    .filter(|base| base.len() >= 2)
                    .map(|base| Self::new(base, *quote))
            })
            .ok_or_else(|| ParsePairError(s.to_string()))
    }
}

impl TryFrom<String> for Pair {
    type Error = ParsePairError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pair> for String {
    fn from(pair: Pair) -> Self {
        pair.symbol()
    }
}

// =============================================================================
// Order Book
// =============================================================================

/// One level of an order book ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price in quote currency.
    pub price: Decimal,
    /// Quantity resting at this price, in base currency.
    pub quantity: Decimal,
}

impl PriceLevel {
    /// Creates a new price level.
    #[must_use]
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    /// Returns the quote value of the whole level.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// Structural problems found by [`OrderBook::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    /// Ask prices must be non-decreasing.
    #[error("ask ladder out of order at level {index}")]
    UnsortedAsks {
        /// Index of the first offending level.
        index: usize,
    },

    /// Bid prices must be non-increasing.
    #[error("bid ladder out of order at level {index}")]
    UnsortedBids {
        /// Index of the first offending level.
        index: usize,
    },

    /// A level carried a negative quantity.
    #[error("negative quantity {quantity} at price {price}")]
    NegativeQuantity {
        /// Price of the offending level.
        price: Decimal,
        /// The negative quantity.
        quantity: Decimal,
    },
}

/// Full depth snapshot for one pair.
///
/// Asks are sorted ascending by price and bids descending, so index 0 of each
/// ladder is the top of book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    /// Instrument this snapshot belongs to.
    pub pair: Pair,
    /// Exchange-assigned sequence number of the update.
    pub sequence: u64,
    /// Sell offers, best (lowest) first.
    pub asks: Vec<PriceLevel>,
    /// Buy offers, best (highest) first.
    pub bids: Vec<PriceLevel>,
    /// When the exchange produced the update.
    pub produced_at: DateTime<Utc>,
    /// When the update arrived locally.
    pub received_at: DateTime<Utc>,
}

impl OrderBook {
    /// Creates a snapshot stamped as produced and received now.
    #[must_use]
    pub fn new(pair: Pair, asks: Vec<PriceLevel>, bids: Vec<PriceLevel>) -> Self {
        let now = Utc::now();
        Self {
            pair,
            sequence: 0,
            asks,
            bids,
            produced_at: now,
            received_at: now,
        }
    }

    /// Sets the sequence number.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Sets the exchange and local timestamps.
    #[must_use]
    pub fn with_timestamps(
        mut self,
        produced_at: DateTime<Utc>,
        received_at: DateTime<Utc>,
    ) -> Self {
        self.produced_at = produced_at;
        self.received_at = received_at;
        self
    }

    /// Returns the best (lowest) ask.
    #[must_use]
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Returns the best (highest) bid.
    #[must_use]
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// Best bid minus best ask. Positive when the book is crossed.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_bid()?.price - self.best_ask()?.price)
    }

    /// Returns true if the best bid exceeds the best ask.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        self.spread().is_some_and(|spread| spread > Decimal::ZERO)
    }

    /// Checks ladder ordering and quantity signs.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), BookError> {
        for level in self.asks.iter().chain(self.bids.iter()) {
            if level.quantity < Decimal::ZERO {
                return Err(BookError::NegativeQuantity {
                    price: level.price,
                    quantity: level.quantity,
                });
            }
        }
        if let Some(index) = self
            .asks
            .windows(2)
            .position(|w| w[1].price < w[0].price)
        {
            return Err(BookError::UnsortedAsks { index: index + 1 });
        }
        if let Some(index) = self
            .bids
            .windows(2)
            .position(|w| w[1].price > w[0].price)
        {
            return Err(BookError::UnsortedBids { index: index + 1 });
        }
        Ok(())
    }

    /// Time between the exchange producing the update and it arriving here.
    #[must_use]
    pub fn network_latency(&self) -> Duration {
        self.received_at - self.produced_at
    }

    /// Time the update has spent inside this process as of `now`.
    #[must_use]
    pub fn internal_latency(&self, now: DateTime<Utc>) -> Duration {
        now - self.received_at
    }

    /// End-to-end age of the update as of `now`.
    #[must_use]
    pub fn total_latency(&self, now: DateTime<Utc>) -> Duration {
        now - self.produced_at
    }
}

// =============================================================================
// Trade Limits
// =============================================================================

/// Per-pair sizing and profitability limits.
///
/// Quantities are in base currency, amounts in quote currency, and
/// `profit_threshold_bps`/`fee_rate_bps` in basis points (1/10 000).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeLimits {
    /// Smallest order quantity the exchange accepts.
    pub min_order_quantity: Decimal,
    /// Quantity ceiling; accepted opportunities stay strictly below it.
    pub max_order_quantity: Decimal,
    /// Smallest order notional the exchange accepts.
    pub min_order_amount: Decimal,
    /// Maximum quote currency committed to a single opportunity.
    pub max_order_amount: Decimal,
    /// Minimum fee-inclusive return required to trade.
    pub profit_threshold_bps: Decimal,
    /// Exchange fee charged on each leg.
    pub fee_rate_bps: Decimal,
}

impl Default for TradeLimits {
    fn default() -> Self {
        Self {
            min_order_quantity: dec!(0.001),
            max_order_quantity: dec!(100),
            min_order_amount: dec!(5),
            max_order_amount: dec!(25),
            profit_threshold_bps: dec!(15),
            fee_rate_bps: dec!(17.5),
        }
    }
}

impl TradeLimits {
    /// Limits that never bind, leaving only price and balance to size trades.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            min_order_quantity: Decimal::ZERO,
            max_order_quantity: Decimal::MAX,
            min_order_amount: Decimal::ZERO,
            max_order_amount: Decimal::MAX,
            profit_threshold_bps: Decimal::ZERO,
            fee_rate_bps: Decimal::ZERO,
        }
    }

    /// Sets the fee rate in basis points.
    #[must_use]
    pub fn with_fee_rate_bps(mut self, fee_rate_bps: Decimal) -> Self {
        self.fee_rate_bps = fee_rate_bps;
        self
    }

    /// Sets the profit threshold in basis points.
    #[must_use]
    pub fn with_profit_threshold_bps(mut self, profit_threshold_bps: Decimal) -> Self {
        self.profit_threshold_bps = profit_threshold_bps;
        self
    }

    /// Sets the order quantity bounds.
    #[must_use]
    pub fn with_quantity_bounds(mut self, min: Decimal, max: Decimal) -> Self {
        self.min_order_quantity = min;
        self.max_order_quantity = max;
        self
    }

    /// Sets the order amount bounds.
    #[must_use]
    pub fn with_amount_bounds(mut self, min: Decimal, max: Decimal) -> Self {
        self.min_order_amount = min;
        self.max_order_amount = max;
        self
    }

    /// Checks that the limits are internally consistent.
    ///
    /// # Errors
    ///
    /// Returns a description of the first inconsistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_order_quantity < Decimal::ZERO || self.min_order_amount < Decimal::ZERO {
            return Err("minimums must be non-negative".to_string());
        }
        if self.max_order_quantity <= self.min_order_quantity {
            return Err(format!(
                "max_order_quantity {} must exceed min_order_quantity {}",
                self.max_order_quantity, self.min_order_quantity
            ));
        }
        if self.max_order_amount < self.min_order_amount {
            return Err(format!(
                "max_order_amount {} is below min_order_amount {}",
                self.max_order_amount, self.min_order_amount
            ));
        }
        if self.fee_rate_bps < Decimal::ZERO || self.profit_threshold_bps < Decimal::ZERO {
            return Err("fee and profit threshold must be non-negative".to_string());
        }
        Ok(())
    }
}
