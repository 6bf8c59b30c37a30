//! Scripted exchange and fixtures shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use crossarb_core::{
    ArbOpportunity, ArbStatus, Balance, ExchangeClient, ExchangeError, OrderBook, OrderId,
    OrderRequest, OrderState, OrderStatus, Pair, PriceLevel, Side, TradeLimits,
};
use crossarb_execution::{BoxedClient, ClientPool, TraderEvent, TraderHandle};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// How an order placed on the mock fills.
#[derive(Debug, Clone, Copy)]
pub enum Fill {
    /// Accepted as started, fully filled on the first poll.
    Immediate,
    /// Reported done with a full fill at placement.
    OnPlacement,
    /// Rests with no fills until cancelled.
    Never,
    /// Fills this quantity, then rests.
    Partial(Decimal),
    /// Fills evenly over this many polls.
    Gradual(u32),
}

struct MockOrder {
    request: OrderRequest,
    fill: Fill,
    polls: u32,
    canceled: bool,
}

impl MockOrder {
    fn status(&self, id: &OrderId) -> OrderStatus {
        let quantity = self.request.quantity;
        let (filled, done) = match self.fill {
            Fill::Immediate => (quantity, self.polls > 0),
            Fill::OnPlacement => (quantity, true),
            Fill::Never => (Decimal::ZERO, false),
            Fill::Partial(partial) => (partial.min(quantity), false),
            Fill::Gradual(steps) => {
                let done_steps = self.polls.min(steps);
                (
                    quantity * Decimal::from(done_steps) / Decimal::from(steps),
                    done_steps >= steps,
                )
            }
        };
        let state = if done {
            OrderState::Done
        } else if self.canceled {
            OrderState::Canceled
        } else {
            OrderState::Started
        };

        let value = filled * self.request.limit_price;
        let net_proceeds = match self.request.side {
            Side::Buy => -value,
            Side::Sell => value,
        };
        OrderStatus::new(id.clone(), state).with_fill(
            filled,
            self.request.limit_price,
            net_proceeds,
        )
    }

    fn is_open(&self, id: &OrderId) -> bool {
        !self.status(id).state.is_terminal()
    }
}

struct MockState {
    next_id: u64,
    buy_fill: Fill,
    sell_fill: Fill,
    failing_buys: u32,
    failing_sells: u32,
    place_attempts: u32,
    orders: HashMap<OrderId, MockOrder>,
    placed: Vec<(OrderId, OrderRequest)>,
    canceled: Vec<OrderId>,
    balances: Vec<Balance>,
    max_open_buys: usize,
}

/// In-memory exchange whose fills follow a per-side script.
#[derive(Clone)]
pub struct MockExchange {
    state: Arc<Mutex<MockState>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_id: 0,
                buy_fill: Fill::Immediate,
                sell_fill: Fill::Immediate,
                failing_buys: 0,
                failing_sells: 0,
                place_attempts: 0,
                orders: HashMap::new(),
                placed: Vec::new(),
                canceled: Vec::new(),
                balances: vec![Balance::new("usd", dec!(800))],
                max_open_buys: 0,
            })),
        }
    }

    pub fn with_buy_fill(self, fill: Fill) -> Self {
        self.set_buy_fill(fill);
        self
    }

    pub fn with_sell_fill(self, fill: Fill) -> Self {
        self.state.lock().sell_fill = fill;
        self
    }

    pub fn set_buy_fill(&self, fill: Fill) {
        self.state.lock().buy_fill = fill;
    }

    /// Rejects the next `count` buy placements with a network error.
    pub fn fail_buys(&self, count: u32) {
        self.state.lock().failing_buys = count;
    }

    /// Rejects the next `count` sell placements with a network error.
    pub fn fail_sells(&self, count: u32) {
        self.state.lock().failing_sells = count;
    }

    pub fn place_attempts(&self) -> u32 {
        self.state.lock().place_attempts
    }

    pub fn placed(&self) -> Vec<(OrderId, OrderRequest)> {
        self.state.lock().placed.clone()
    }

    pub fn canceled(&self) -> Vec<OrderId> {
        self.state.lock().canceled.clone()
    }

    /// Highest number of buys ever resting at once.
    pub fn max_open_buys(&self) -> usize {
        self.state.lock().max_open_buys
    }

    pub fn client_pool(&self, size: usize) -> ClientPool {
        let clients = (0..size)
            .map(|_| Box::new(self.clone()) as BoxedClient)
            .collect();
        ClientPool::new(clients)
    }

    pub fn shared_pool(&self, size: usize) -> Arc<ClientPool> {
        Arc::new(self.client_pool(size))
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    async fn place_order(&self, order: &OrderRequest) -> crossarb_core::Result<OrderStatus> {
        let mut state = self.state.lock();
        state.place_attempts += 1;

        let failing = match order.side {
            Side::Buy => &mut state.failing_buys,
            Side::Sell => &mut state.failing_sells,
        };
        if *failing > 0 {
            *failing -= 1;
            return Err(ExchangeError::Network("connection reset".to_string()));
        }

        state.next_id += 1;
        let id = OrderId::new(format!("order-{}", state.next_id));
        let fill = match order.side {
            Side::Buy => state.buy_fill,
            Side::Sell => state.sell_fill,
        };
        let placed = MockOrder {
            request: order.clone(),
            fill,
            polls: 0,
            canceled: false,
        };
        let initial = match fill {
            Fill::OnPlacement => placed.status(&id),
            _ => OrderStatus::new(id.clone(), OrderState::Started),
        };

        state.placed.push((id.clone(), order.clone()));
        state.orders.insert(id, placed);

        let open_buys = state
            .orders
            .iter()
            .filter(|(id, order)| order.request.side == Side::Buy && order.is_open(id))
            .count();
        state.max_open_buys = state.max_open_buys.max(open_buys);

        Ok(initial)
    }

    async fn order_status(&self, order_id: &OrderId) -> crossarb_core::Result<OrderStatus> {
        let mut state = self.state.lock();
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| ExchangeError::order_not_found(order_id.as_str()))?;
        if !order.canceled {
            order.polls += 1;
        }
        Ok(order.status(order_id))
    }

    async fn cancel_order(&self, order_id: &OrderId) -> crossarb_core::Result<()> {
        let mut state = self.state.lock();
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| ExchangeError::order_not_found(order_id.as_str()))?;
        order.canceled = true;
        state.canceled.push(order_id.clone());
        Ok(())
    }

    async fn balances(&self) -> crossarb_core::Result<Vec<Balance>> {
        Ok(self.state.lock().balances.clone())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn btcusd() -> Pair {
    Pair::new("btc", "usd")
}

/// Zero-fee limits wide enough that only price and balance size trades.
pub fn test_limits() -> TradeLimits {
    TradeLimits::unbounded()
        .with_amount_bounds(Decimal::ZERO, dec!(10000000))
        .with_quantity_bounds(Decimal::ZERO, dec!(100000))
        .with_profit_threshold_bps(dec!(1))
}

/// Asks 100 x 8 against bids 101 x 10; sizes to 8 with $800.
pub fn crossed_book() -> OrderBook {
    OrderBook::new(
        btcusd(),
        vec![
            PriceLevel::new(dec!(100), dec!(8)),
            PriceLevel::new(dec!(102), dec!(5)),
        ],
        vec![
            PriceLevel::new(dec!(101), dec!(10)),
            PriceLevel::new(dec!(98), dec!(5)),
        ],
    )
}

/// The opportunity `crossed_book` yields at $800.
pub fn opportunity(quantity: Decimal) -> ArbOpportunity {
    ArbOpportunity {
        pair: btcusd(),
        buy_vwap: dec!(100),
        sell_vwap: dec!(101),
        buy_limit_price: dec!(100),
        sell_limit_price: dec!(101),
        quantity,
        expected_profit: quantity,
        profit_bps: dec!(100),
        status: ArbStatus::Init,
        detected_at: Utc::now(),
        buy_started_at: None,
    }
}

/// Receives the next event, failing the test instead of hanging.
pub async fn next_event(events: &mut broadcast::Receiver<TraderEvent>) -> TraderEvent {
    tokio::time::timeout(Duration::from_secs(120), events.recv())
        .await
        .expect("timed out waiting for a trader event")
        .expect("event channel closed")
}

/// Waits until the trader has returned to idle.
pub async fn wait_idle(handle: &TraderHandle) {
    while handle.is_active() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
