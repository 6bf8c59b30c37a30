//! Order execution for crossed-book arbitrage.
//!
//! One [`Trader`] per pair consumes snapshots from the [`Router`], sizes
//! opportunities with the detector, and runs at most one [`Lifecycle`] at a
//! time. Exchange calls go through a shared [`ClientPool`]; available quote
//! balances come from a [`BalanceCache`] refreshed in the background.
//!
//! ```text
//! OrderBookSource ──▶ Router ──▶ Trader(btcusd) ──▶ Lifecycle ──▶ ClientPool ──▶ exchange
//!                           └──▶ Trader(ethusd)          │
//!                                                    OrderPoller
//! ```
//!
//! # Modules
//!
//! - [`pool`]: leased exchange client handles
//! - [`balances`]: cached balances and background refresh
//! - [`poller`]: per-order status polling
//! - [`lifecycle`]: the buy/sell state machine for one opportunity
//! - [`trader`]: per-pair consumer loop and its handle
//! - [`router`]: snapshot fan-out by pair
//! - [`manager`]: deployment wiring and shutdown
//! - [`events`]: notifications published by traders

pub mod balances;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod manager;
pub mod poller;
pub mod pool;
pub mod router;
pub mod trader;

pub use balances::BalanceCache;
pub use error::{ExecutionError, Result};
pub use events::{LifecycleOutcome, TraderEvent};
pub use lifecycle::{Lifecycle, LifecycleReport, LifecycleSettings};
pub use manager::{ManagerHandle, TraderManager};
pub use poller::OrderPoller;
pub use pool::{BoxedClient, ClientPool, PooledClient};
pub use router::Router;
pub use trader::{Trader, TraderHandle};
