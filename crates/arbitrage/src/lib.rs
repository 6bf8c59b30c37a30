//! Crossed order book detection and sizing.
//!
//! When a single exchange's best bid rises above its best ask, buying the
//! asks and selling into the bids captures the difference:
//!
//! ```text
//! Asks: 100.0 x 8     Bids: 101.0 x 10
//!
//! Buy 8 @ 100.0      =  800.00
//! Sell 8 @ 101.0     =  808.00
//! Gross profit       =    8.00  (100 bps)
//! ```
//!
//! Fees are charged on both legs, so the detector only proposes trades whose
//! fee-inclusive return clears the configured threshold.
//!
//! # Modules
//!
//! - [`fees`]: basis point arithmetic, fee adjustment, and truncation
//! - [`detector`]: the book-walking detector and spread diagnostics
//!
//! # Example
//!
//! ```ignore
//! use crossarb_arbitrage::ArbDetector;
//! use crossarb_core::TradeLimits;
//!
//! let detector = ArbDetector::new(TradeLimits::default());
//! if let Some(opp) = detector.detect(&book, available_usd) {
//!     println!("buy {} @ {} / sell @ {}", opp.quantity, opp.buy_limit_price, opp.sell_limit_price);
//! }
//! ```

pub mod detector;
pub mod fees;

pub use detector::{find_arb, ArbDetector, SpreadSummary};
pub use fees::{
    bps_between, is_arb_above_threshold, truncate_price, truncate_quantity, FeeModel,
    BPS_DENOMINATOR, PRICE_PRECISION, QUANTITY_PRECISION,
};
