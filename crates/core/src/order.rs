//! Order requests and exchange-reported order status.
//!
//! Exchange status strings are decoded once into [`OrderState`] at the client
//! boundary so everything downstream matches on a closed set.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ExchangeError;
use crate::types::{Currency, Pair};

/// Algorithm id for the exchange's smart-routed limit order.
pub const SMART_ROUTING_ALGORITHM_ID: u32 = 200;

// =============================================================================
// Side
// =============================================================================

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy base currency with quote currency.
    Buy,
    /// Sell base currency for quote currency.
    Sell,
}

impl Side {
    /// Returns the lowercase side name used in endpoints and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order Identity & Requests
// =============================================================================

/// Exchange-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Wraps an identifier returned by the exchange.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A limit order to submit to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Instrument to trade.
    pub pair: Pair,
    /// Buy or sell.
    pub side: Side,
    /// Base currency quantity.
    pub quantity: Decimal,
    /// Worst acceptable price.
    pub limit_price: Decimal,
    /// Exchange routing algorithm.
    pub algorithm_id: u32,
}

impl OrderRequest {
    /// Creates a smart-routed buy order.
    #[must_use]
    pub fn buy(pair: Pair, quantity: Decimal, limit_price: Decimal) -> Self {
        Self {
            pair,
            side: Side::Buy,
            quantity,
            limit_price,
            algorithm_id: SMART_ROUTING_ALGORITHM_ID,
        }
    }

    /// Creates a smart-routed sell order.
    #[must_use]
    pub fn sell(pair: Pair, quantity: Decimal, limit_price: Decimal) -> Self {
        Self {
            pair,
            side: Side::Sell,
            quantity,
            limit_price,
            algorithm_id: SMART_ROUTING_ALGORITHM_ID,
        }
    }

    /// Overrides the routing algorithm.
    #[must_use]
    pub fn with_algorithm_id(mut self, algorithm_id: u32) -> Self {
        self.algorithm_id = algorithm_id;
        self
    }

    /// Quote value of the order at its limit price.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.quantity * self.limit_price
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle state of an order as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    /// Accepted and working; may be partially filled.
    Started,
    /// No longer working; filled as far as it will fill.
    Done,
    /// Cancelled before completing.
    Canceled,
}

impl OrderState {
    /// Returns true if the order will not change any further.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }

    /// Returns the display name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Done => "done",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderState {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "started" | "cancel pending" => Ok(Self::Started),
            "done" | "filled" => Ok(Self::Done),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            _ => Err(ExchangeError::unknown_order_state(s)),
        }
    }
}

/// Point-in-time view of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatus {
    /// Exchange order id.
    pub id: OrderId,
    /// Decoded order state.
    pub state: OrderState,
    /// Base quantity filled so far.
    pub filled_quantity: Decimal,
    /// Fill-weighted average price.
    pub vwap: Decimal,
    /// Realized quote proceeds net of fees. Negative for buys.
    pub net_proceeds: Decimal,
}

impl OrderStatus {
    /// Creates an unfilled status.
    #[must_use]
    pub fn new(id: OrderId, state: OrderState) -> Self {
        Self {
            id,
            state,
            filled_quantity: Decimal::ZERO,
            vwap: Decimal::ZERO,
            net_proceeds: Decimal::ZERO,
        }
    }

    /// Sets the fill information.
    #[must_use]
    pub fn with_fill(
        mut self,
        filled_quantity: Decimal,
        vwap: Decimal,
        net_proceeds: Decimal,
    ) -> Self {
        self.filled_quantity = filled_quantity;
        self.vwap = vwap;
        self.net_proceeds = net_proceeds;
        self
    }

    /// Returns true if anything has filled.
    #[must_use]
    pub fn has_fills(&self) -> bool {
        self.filled_quantity > Decimal::ZERO
    }
}

// =============================================================================
// Balances
// =============================================================================

/// Available balance of one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Currency held.
    pub currency: Currency,
    /// Amount free to trade.
    pub available: Decimal,
}

impl Balance {
    /// Creates a balance entry.
    #[must_use]
    pub fn new(currency: impl Into<Currency>, available: Decimal) -> Self {
        Self {
            currency: currency.into(),
            available,
        }
    }
}
