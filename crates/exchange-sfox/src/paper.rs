//! In-memory exchange for paper trading against the live feed.
//!
//! [`PaperClient`] makes **zero API calls**. Every order fills completely at
//! its limit price the moment it is placed, the configured fee is charged on
//! the quote side, and balances move accordingly. Orders that the simulated
//! account cannot fund are rejected.

use async_trait::async_trait;
use crossarb_arbitrage::FeeModel;
use crossarb_core::{
    Balance, Currency, ExchangeClient, ExchangeError, OrderId, OrderRequest, OrderState,
    OrderStatus, PaperConfig, Result, Side,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
struct PaperAccount {
    balances: BTreeMap<Currency, Decimal>,
    orders: HashMap<OrderId, OrderStatus>,
}

impl PaperAccount {
    fn available(&self, currency: &Currency) -> Decimal {
        self.balances.get(currency).copied().unwrap_or_default()
    }

    fn adjust(&mut self, currency: &Currency, delta: Decimal) {
        *self.balances.entry(currency.clone()).or_default() += delta;
    }
}

/// Simulated account shared by every clone.
///
/// Clones share state, so a pool built from clones of one client sees a
/// single account.
#[derive(Debug, Clone)]
pub struct PaperClient {
    fees: FeeModel,
    account: Arc<Mutex<PaperAccount>>,
    next_id: Arc<AtomicU64>,
}

impl PaperClient {
    /// Creates an account holding `balances` and charging `fee_rate_bps` per fill.
    #[must_use]
    pub fn new(fee_rate_bps: Decimal, balances: BTreeMap<Currency, Decimal>) -> Self {
        Self {
            fees: FeeModel::new(fee_rate_bps),
            account: Arc::new(Mutex::new(PaperAccount {
                balances,
                orders: HashMap::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Current balance of `currency`.
    #[must_use]
    pub fn balance(&self, currency: &Currency) -> Decimal {
        self.account.lock().available(currency)
    }
}

impl From<&PaperConfig> for PaperClient {
    fn from(config: &PaperConfig) -> Self {
        Self::new(config.fee_rate_bps, config.balances.clone())
    }
}

#[async_trait]
impl ExchangeClient for PaperClient {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderStatus> {
        if order.quantity <= Decimal::ZERO || order.limit_price <= Decimal::ZERO {
            return Err(ExchangeError::OrderRejected(format!(
                "non-positive quantity {} or price {}",
                order.quantity, order.limit_price
            )));
        }

        let base = &order.pair.base;
        let quote = &order.pair.quote;
        let notional = order.notional();
        let mut account = self.account.lock();

        let net_proceeds = match order.side {
            Side::Buy => {
                let cost = self.fees.with_buy_fee(notional);
                if account.available(quote) < cost {
                    return Err(ExchangeError::OrderRejected(format!(
                        "insufficient {quote}: need {cost}, have {}",
                        account.available(quote)
                    )));
                }
                account.adjust(quote, -cost);
                account.adjust(base, order.quantity);
                -cost
            }
            Side::Sell => {
                if account.available(base) < order.quantity {
                    return Err(ExchangeError::OrderRejected(format!(
                        "insufficient {base}: need {}, have {}",
                        order.quantity,
                        account.available(base)
                    )));
                }
                let proceeds = self.fees.net_of_sell_fee(notional);
                account.adjust(base, -order.quantity);
                account.adjust(quote, proceeds);
                proceeds
            }
        };

        let id = OrderId::new(format!("paper-{}", self.next_id.fetch_add(1, Ordering::Relaxed)));
        let status = OrderStatus::new(id.clone(), OrderState::Done).with_fill(
            order.quantity,
            order.limit_price,
            net_proceeds,
        );
        account.orders.insert(id, status.clone());

        info!(
            order_id = %status.id,
            pair = %order.pair,
            side = %order.side,
            quantity = %order.quantity,
            price = %order.limit_price,
            net_proceeds = %net_proceeds,
            "paper fill"
        );
        Ok(status)
    }

    async fn order_status(&self, order_id: &OrderId) -> Result<OrderStatus> {
        self.account
            .lock()
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| ExchangeError::order_not_found(order_id.as_str()))
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<()> {
        // Paper orders are filled at placement; cancelling a done order is a no-op.
        if self.account.lock().orders.contains_key(order_id) {
            Ok(())
        } else {
            Err(ExchangeError::order_not_found(order_id.as_str()))
        }
    }

    async fn balances(&self) -> Result<Vec<Balance>> {
        Ok(self
            .account
            .lock()
            .balances
            .iter()
            .map(|(currency, available)| Balance::new(currency.clone(), *available))
            .collect())
    }
}
