//! Core types, exchange traits, and configuration shared by every crossarb crate.
//!
//! # Modules
//!
//! - [`types`]: currencies, pairs, order books, and per-pair trade limits
//! - [`order`]: order requests and the decoded order status reported by the exchange
//! - [`opportunity`]: detected arbitrage opportunities and their lifecycle status
//! - [`traits`]: the exchange client and order book source boundaries
//! - [`error`]: exchange error taxonomy
//! - [`config`] / [`config_loader`]: deployment configuration
//! - [`credentials`]: API key loading

pub mod config;
pub mod config_loader;
pub mod credentials;
pub mod error;
pub mod opportunity;
pub mod order;
pub mod traits;
pub mod types;

pub use config::{AppConfig, ExchangeConfig, PairConfig, PaperConfig, TradingConfig};
pub use config_loader::ConfigLoader;
pub use credentials::ApiCredentials;
pub use error::{ExchangeError, InvalidTransition, Result};
pub use opportunity::{ArbOpportunity, ArbStatus};
pub use order::{
    Balance, OrderId, OrderRequest, OrderState, OrderStatus, Side, SMART_ROUTING_ALGORITHM_ID,
};
pub use traits::{ExchangeClient, OrderBookSource};
pub use types::{BookError, Currency, OrderBook, Pair, ParsePairError, PriceLevel, TradeLimits};
