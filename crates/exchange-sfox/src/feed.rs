//! Decoding of SFOX order book feed messages.
//!
//! Each message on an `orderbook.sfox.<pair>` feed carries a full snapshot:
//!
//! ```text
//! {
//!   "sequence": 57,
//!   "recipient": "orderbook.sfox.btcusd",
//!   "timestamp": 1572031166735813600,
//!   "payload": {
//!     "pair": "btcusd",
//!     "bids": [[9379.48, 0.1, "market1"], ...],
//!     "asks": [[9380.10, 0.25, "market2"], ...]
//!   }
//! }
//! ```
//!
//! The first message after subscribing (sequence 1) is the subscription
//! acknowledgment and is never traded on.

use chrono::{DateTime, Utc};
use crossarb_core::{BookError, OrderBook, Pair, ParsePairError, PriceLevel};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::decimal;

/// Feed name prefix for SFOX order book channels.
pub const ORDERBOOK_FEED_PREFIX: &str = "orderbook.sfox.";

/// Builds the subscribe message for the order book feeds of `pairs`.
#[must_use]
pub fn subscription_message(pairs: &[Pair]) -> Value {
    let feeds: Vec<String> = pairs
        .iter()
        .map(|pair| format!("{ORDERBOOK_FEED_PREFIX}{pair}"))
        .collect();
    json!({ "type": "subscribe", "feeds": feeds })
}

/// Reasons a feed message does not produce a snapshot.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Subscription replies and heartbeats carry no book.
    #[error("message carries no order book")]
    NotOrderBook,

    #[error("subscription acknowledgment snapshot on {recipient}")]
    FirstMessage { recipient: String },

    #[error("stale sequence {sequence} on {recipient}, last seen {last}")]
    StaleSequence {
        recipient: String,
        sequence: u64,
        last: u64,
    },

    #[error("invalid {side} level {index}: {level}")]
    InvalidLevel {
        side: &'static str,
        index: usize,
        level: String,
    },

    #[error(transparent)]
    Pair(#[from] ParsePairError),

    #[error("invalid book: {0}")]
    Book(#[from] BookError),
}

impl FeedError {
    /// Returns true for messages that are skipped as part of normal operation.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::NotOrderBook | Self::FirstMessage { .. })
    }
}

#[derive(Debug, Deserialize)]
struct RawFeedMessage {
    #[serde(default)]
    sequence: Option<u64>,
    #[serde(default)]
    recipient: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    payload: Option<RawBookPayload>,
}

#[derive(Debug, Deserialize)]
struct RawBookPayload {
    #[serde(default)]
    pair: Option<String>,
    #[serde(default)]
    bids: Vec<Vec<Value>>,
    #[serde(default)]
    asks: Vec<Vec<Value>>,
}

/// Stateful decoder enforcing strictly increasing sequences per feed.
#[derive(Debug, Default)]
pub struct OrderBookDecoder {
    last_sequence: HashMap<String, u64>,
}

impl OrderBookDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets sequence state, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.last_sequence.clear();
    }

    /// Last accepted sequence for `recipient`.
    #[must_use]
    pub fn last_sequence(&self, recipient: &str) -> Option<u64> {
        self.last_sequence.get(recipient).copied()
    }

    /// Decodes one text frame received at `received_at`.
    ///
    /// # Errors
    ///
    /// Returns a [`FeedError`] for every message that must not reach a trader.
    pub fn decode(
        &mut self,
        text: &str,
        received_at: DateTime<Utc>,
    ) -> Result<OrderBook, FeedError> {
        let raw: RawFeedMessage = serde_json::from_str(text)?;
        let (Some(payload), Some(sequence)) = (raw.payload, raw.sequence) else {
            return Err(FeedError::NotOrderBook);
        };
        let recipient = raw.recipient.unwrap_or_default();

        if sequence == 1 {
            return Err(FeedError::FirstMessage { recipient });
        }
        if let Some(&last) = self.last_sequence.get(&recipient) {
            if sequence <= last {
                return Err(FeedError::StaleSequence {
                    recipient,
                    sequence,
                    last,
                });
            }
        }

        let symbol = payload
            .pair
            .as_deref()
            .or_else(|| recipient.strip_prefix(ORDERBOOK_FEED_PREFIX))
            .unwrap_or_default();
        let pair: Pair = symbol.parse()?;
        let asks = parse_levels("ask", &payload.asks)?;
        let bids = parse_levels("bid", &payload.bids)?;

        let produced_at = raw
            .timestamp
            .map_or(received_at, DateTime::from_timestamp_nanos);
        let book = OrderBook::new(pair, asks, bids)
            .with_sequence(sequence)
            .with_timestamps(produced_at, received_at);
        book.validate()?;

        self.last_sequence.insert(recipient, sequence);
        Ok(book)
    }

    /// Decodes `text`, logging and discarding anything that is not a tradable snapshot.
    pub fn decode_logged(&mut self, text: &str, received_at: DateTime<Utc>) -> Option<OrderBook> {
        match self.decode(text, received_at) {
            Ok(book) => Some(book),
            Err(e) if e.is_expected() => {
                debug!(reason = %e, "feed message skipped");
                None
            }
            Err(e) => {
                warn!(error = %e, "feed message dropped");
                None
            }
        }
    }
}

fn parse_levels(side: &'static str, raw: &[Vec<Value>]) -> Result<Vec<PriceLevel>, FeedError> {
    raw.iter()
        .enumerate()
        .map(|(index, entry)| {
            let price = entry.first().and_then(decimal::from_value);
            let quantity = entry.get(1).and_then(decimal::from_value);
            match (price, quantity) {
                (Some(price), Some(quantity)) => Ok(PriceLevel::new(price, quantity)),
                _ => Err(FeedError::InvalidLevel {
                    side,
                    index,
                    level: Value::Array(entry.clone()).to_string(),
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn message(sequence: u64, bids: Value, asks: Value) -> String {
        json!({
            "sequence": sequence,
            "recipient": "orderbook.sfox.btcusd",
            "timestamp": 1_572_031_166_735_813_600_i64,
            "payload": {
                "pair": "btcusd",
                "currency": "usd",
                "bids": bids,
                "asks": asks,
                "lastupdated": 1_572_031_166_735_i64
            }
        })
        .to_string()
    }

    fn book_message(sequence: u64) -> String {
        message(
            sequence,
            json!([[9379.48, 0.1, "market1"], [9379.00, 2.5, "market2"]]),
            json!([[9380.10, 0.25, "market2"], [9381.00, 1, "market1"]]),
        )
    }

    // ==================== Subscription Tests ====================

    #[test]
    fn test_subscription_message_lists_feeds() {
        let msg = subscription_message(&[Pair::new("btc", "usd"), Pair::new("eth", "usd")]);
        assert_eq!(
            msg,
            json!({
                "type": "subscribe",
                "feeds": ["orderbook.sfox.btcusd", "orderbook.sfox.ethusd"]
            })
        );
    }

    // ==================== Decode Tests ====================

    #[test]
    fn test_decodes_snapshot_exactly() {
        let mut decoder = OrderBookDecoder::new();
        let received = Utc::now();

        let book = decoder.decode(&book_message(2), received).unwrap();

        assert_eq!(book.pair, Pair::new("btc", "usd"));
        assert_eq!(book.sequence, 2);
        assert_eq!(book.bids[0], PriceLevel::new(dec!(9379.48), dec!(0.1)));
        assert_eq!(book.asks[0], PriceLevel::new(dec!(9380.10), dec!(0.25)));
        assert_eq!(book.asks[1].quantity, dec!(1));
        assert_eq!(book.received_at, received);
        assert_eq!(
            book.produced_at,
            DateTime::from_timestamp_nanos(1_572_031_166_735_813_600)
        );
        assert_eq!(decoder.last_sequence("orderbook.sfox.btcusd"), Some(2));
    }

    #[test]
    fn test_first_message_is_skipped() {
        let mut decoder = OrderBookDecoder::new();
        let err = decoder.decode(&book_message(1), Utc::now()).unwrap_err();
        assert!(matches!(err, FeedError::FirstMessage { .. }));
        assert!(err.is_expected());
        assert_eq!(decoder.last_sequence("orderbook.sfox.btcusd"), None);
    }

    #[test]
    fn test_non_increasing_sequences_dropped() {
        let mut decoder = OrderBookDecoder::new();
        decoder.decode(&book_message(5), Utc::now()).unwrap();

        for stale in [5, 4] {
            let err = decoder.decode(&book_message(stale), Utc::now()).unwrap_err();
            assert!(matches!(err, FeedError::StaleSequence { last: 5, .. }));
        }
        assert!(decoder.decode(&book_message(6), Utc::now()).is_ok());
    }

    #[test]
    fn test_sequences_tracked_per_feed() {
        let mut decoder = OrderBookDecoder::new();
        decoder.decode(&book_message(9), Utc::now()).unwrap();

        let eth = book_message(3)
            .replace("orderbook.sfox.btcusd", "orderbook.sfox.ethusd")
            .replace("\"pair\":\"btcusd\"", "\"pair\":\"ethusd\"");
        let book = decoder.decode(&eth, Utc::now()).unwrap();
        assert_eq!(book.pair, Pair::new("eth", "usd"));
    }

    #[test]
    fn test_reset_forgets_sequences() {
        let mut decoder = OrderBookDecoder::new();
        decoder.decode(&book_message(9), Utc::now()).unwrap();
        decoder.reset();
        assert!(decoder.decode(&book_message(2), Utc::now()).is_ok());
    }

    // ==================== Rejection Tests ====================

    #[test]
    fn test_subscription_reply_is_not_a_book() {
        let mut decoder = OrderBookDecoder::new();
        let err = decoder
            .decode(r#"{"type":"success","payload":{}}"#, Utc::now())
            .unwrap_err();
        assert!(matches!(err, FeedError::NotOrderBook));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let mut decoder = OrderBookDecoder::new();
        let err = decoder.decode("{\"sequence\": ", Utc::now()).unwrap_err();
        assert!(matches!(err, FeedError::Malformed(_)));
        assert!(!err.is_expected());
    }

    #[test]
    fn test_unsorted_ladder_rejected() {
        let mut decoder = OrderBookDecoder::new();
        let text = message(2, json!([[100, 1], [101, 1]]), json!([[102, 1], [103, 1]]));
        let err = decoder.decode(&text, Utc::now()).unwrap_err();
        assert!(matches!(err, FeedError::Book(BookError::UnsortedBids { index: 1 })));
        assert_eq!(decoder.last_sequence("orderbook.sfox.btcusd"), None);
    }

    #[test]
    fn test_bad_level_rejected() {
        let mut decoder = OrderBookDecoder::new();
        let text = message(2, json!([[100, "lots"]]), json!([]));
        let err = decoder.decode(&text, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            FeedError::InvalidLevel {
                side: "bid",
                index: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_pair_falls_back_to_recipient() {
        let mut decoder = OrderBookDecoder::new();
        let text = json!({
            "sequence": 4,
            "recipient": "orderbook.sfox.ltcusd",
            "payload": {"bids": [[50, 1]], "asks": [[51, 1]]}
        })
        .to_string();
        let received = Utc::now();

        let book = decoder.decode(&text, received).unwrap();
        assert_eq!(book.pair, Pair::new("ltc", "usd"));
        assert_eq!(book.produced_at, received);
    }
}
