use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::types::{Currency, Pair, TradeLimits};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    pub pairs: Vec<PairConfig>,
    #[serde(default)]
    pub paper: PaperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub api_url: String,
    pub ws_url: String,
    pub requests_per_second: u32,
    pub request_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
}

/// Timing and retry tunables for the execution layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Interval between order status polls.
    pub poll_interval_ms: u64,
    /// How long a buy may rest before it is cancelled.
    pub buy_timeout_ms: u64,
    /// Consecutive placement failures tolerated before a lifecycle aborts.
    pub max_placement_errors: u32,
    /// Pause between placement retries.
    pub placement_retry_delay_ms: u64,
    /// Interval between balance refreshes.
    pub balance_refresh_interval_ms: u64,
    /// Number of client handles in the pool.
    pub client_pool_size: usize,
    /// Capacity of each trader's order book channel.
    pub orderbook_channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    pub pair: Pair,
    #[serde(default)]
    pub limits: TradeLimits,
}

/// Simulated account used by `run --paper`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    /// Fee charged on every simulated fill.
    pub fee_rate_bps: Decimal,
    /// Starting balances.
    pub balances: BTreeMap<Currency, Decimal>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            fee_rate_bps: dec!(17.5),
            balances: BTreeMap::from([(Currency::new("usd"), dec!(1000))]),
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.sfox.com".to_string(),
            ws_url: "wss://ws.sfox.com/ws".to_string(),
            requests_per_second: 10,
            request_timeout_ms: 5_000,
            reconnect_delay_ms: 2_000,
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            buy_timeout_ms: 8_000,
            max_placement_errors: 5,
            placement_retry_delay_ms: 250,
            balance_refresh_interval_ms: 5_000,
            client_pool_size: 20,
            orderbook_channel_capacity: 1,
        }
    }
}

impl TradingConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn buy_timeout(&self) -> Duration {
        Duration::from_millis(self.buy_timeout_ms)
    }

    #[must_use]
    pub fn placement_retry_delay(&self) -> Duration {
        Duration::from_millis(self.placement_retry_delay_ms)
    }

    #[must_use]
    pub fn balance_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.balance_refresh_interval_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let pair = |symbol: &str, max_quantity| PairConfig {
            pair: Pair::new(&symbol[..3], &symbol[3..]),
            limits: TradeLimits {
                max_order_quantity: max_quantity,
                ..TradeLimits::default()
            },
        };

        Self {
            exchange: ExchangeConfig::default(),
            trading: TradingConfig::default(),
            paper: PaperConfig::default(),
            pairs: vec![
                pair("btcusd", dec!(1)),
                pair("ethusd", dec!(100)),
                pair("etcusd", dec!(100)),
                pair("ltcusd", dec!(100)),
                pair("bchusd", dec!(100)),
            ],
        }
    }
}

impl AppConfig {
    /// Checks cross-field consistency that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.pairs.is_empty() {
            bail!("at least one pair must be configured");
        }

        let mut seen = HashSet::new();
        for entry in &self.pairs {
            if !seen.insert(&entry.pair) {
                bail!("pair {} is configured more than once", entry.pair);
            }
            entry
                .limits
                .validate()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("invalid limits for {}", entry.pair))?;
        }

        let trading = &self.trading;
        if trading.poll_interval_ms == 0 || trading.balance_refresh_interval_ms == 0 {
            bail!("poll and balance refresh intervals must be positive");
        }
        if trading.max_placement_errors == 0 {
            bail!("max_placement_errors must be at least 1");
        }
        if trading.client_pool_size == 0 {
            bail!("client_pool_size must be at least 1");
        }
        if trading.orderbook_channel_capacity == 0 {
            bail!("orderbook_channel_capacity must be at least 1");
        }
        if self.paper.fee_rate_bps < Decimal::ZERO {
            bail!("paper fee_rate_bps must not be negative");
        }
        if self.exchange.requests_per_second == 0 {
            bail!("requests_per_second must be at least 1");
        }
        Ok(())
    }

    /// Limits configured for `pair`, if it is traded.
    #[must_use]
    pub fn limits_for(&self, pair: &Pair) -> Option<&TradeLimits> {
        self.pairs
            .iter()
            .find(|entry| &entry.pair == pair)
            .map(|entry| &entry.limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pairs.len(), 5);
        assert_eq!(config.trading.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.trading.buy_timeout(), Duration::from_secs(8));
        assert_eq!(config.trading.max_placement_errors, 5);
    }

    #[test]
    fn test_btc_has_tighter_quantity_cap() {
        let config = AppConfig::default();
        let btc = config.limits_for(&Pair::new("btc", "usd")).unwrap();
        let eth = config.limits_for(&Pair::new("eth", "usd")).unwrap();
        assert_eq!(btc.max_order_quantity, dec!(1));
        assert_eq!(eth.max_order_quantity, dec!(100));
    }

    #[test]
    fn test_duplicate_pairs_rejected() {
        let mut config = AppConfig::default();
        let first = config.pairs[0].clone();
        config.pairs.push(first);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_paper_defaults_fund_usd() {
        let paper = PaperConfig::default();
        assert_eq!(paper.balances.get(&Currency::new("usd")), Some(&dec!(1000)));
        assert_eq!(paper.fee_rate_bps, dec!(17.5));
    }

    #[test]
    fn test_zero_pool_rejected() {
        let mut config = AppConfig::default();
        config.trading.client_pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_limits_name_the_pair() {
        let mut config = AppConfig::default();
        config.pairs[1].limits.max_order_quantity = Decimal::ZERO;
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("ethusd"));
    }
}
