//! SFOX integration for crossarb.
//!
//! This crate provides:
//! - [`SfoxClient`]: rate-limited REST client implementing
//!   [`ExchangeClient`](crossarb_core::ExchangeClient)
//! - [`OrderBookDecoder`]: turns raw feed messages into validated
//!   [`OrderBook`](crossarb_core::OrderBook) snapshots
//! - [`SfoxFeed`]: websocket connection that subscribes, decodes, and
//!   reconnects
//! - [`PaperClient`]: in-memory exchange that fills every order at its limit
//!
//! # Example
//!
//! ```ignore
//! use crossarb_sfox::{SfoxClient, SfoxClientConfig, SfoxFeed};
//!
//! let client = SfoxClient::new(SfoxClientConfig::from(&config.exchange), api_key)?;
//! let balances = client.balances().await?;
//!
//! let (books, feed) = SfoxFeed::new(&config.exchange, pairs).spawn(64, shutdown_rx);
//! ```
//!
//! # API Endpoints
//!
//! - `POST /v1/orders/{buy|sell}` - Place a limit order
//! - `GET /v1/order/{id}` - Order status
//! - `DELETE /v1/orders/{id}` - Cancel an order
//! - `GET /v1/user/balance` - Account balances

pub mod client;
mod decimal;
pub mod error;
pub mod feed;
pub mod paper;
pub mod websocket;

pub use client::{SfoxClient, SfoxClientConfig, SFOX_API_URL};
pub use feed::{subscription_message, FeedError, OrderBookDecoder};
pub use paper::PaperClient;
pub use websocket::SfoxFeed;
