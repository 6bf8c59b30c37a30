//! Execution of one accepted opportunity.
//!
//! ```text
//! INIT ──buy placed──▶ BUY_STARTED ──filled / timeout w/ fill──▶ BUY_COMPLETE
//!                          │                                          │
//!                   cancel / timeout w/o fill                    sell placed
//!                          ▼                                          ▼
//!                       CANCELED ◀──────────cancel─────────────  SELL_STARTED
//!                                                                     │
//!                                                                   filled
//!                                                                     ▼
//!                                                  DONE ◀──────  SELL_COMPLETE
//! ```
//!
//! Placement failures are retried up to the configured error budget. Status
//! updates arrive from an [`OrderPoller`] per resting order; the lifecycle
//! alone decides when to stop it, and it always cancels the order first.

use crossarb_core::{
    ArbOpportunity, ArbStatus, OrderId, OrderRequest, OrderState, OrderStatus, TradingConfig,
};
use rust_decimal::Decimal;
use std::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{ExecutionError, Result};
use crate::events::LifecycleOutcome;
use crate::poller::OrderPoller;
use crate::pool::ClientPool;

const UPDATE_BUFFER: usize = 16;

/// Timing and retry policy for a lifecycle.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub poll_interval: Duration,
    pub buy_timeout: Duration,
    pub max_placement_errors: u32,
    pub placement_retry_delay: Duration,
}

impl From<&TradingConfig> for LifecycleSettings {
    fn from(config: &TradingConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            buy_timeout: config.buy_timeout(),
            max_placement_errors: config.max_placement_errors,
            placement_retry_delay: config.placement_retry_delay(),
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self::from(&TradingConfig::default())
    }
}

/// Final state of a lifecycle run.
#[derive(Debug, Clone)]
pub struct LifecycleReport {
    pub opportunity: ArbOpportunity,
    pub outcome: LifecycleOutcome,
}

/// Early exit from a lifecycle step.
type Step<T> = std::result::Result<T, LifecycleOutcome>;

/// Drives one opportunity through buy and sell.
pub struct Lifecycle {
    opportunity: ArbOpportunity,
    pool: Arc<ClientPool>,
    settings: LifecycleSettings,
    cancel: CancelSignal,
}

impl Lifecycle {
    /// Creates a lifecycle. Sending on the other end of `cancel` requests
    /// cancellation of whichever order is resting.
    #[must_use]
    pub fn new(
        opportunity: ArbOpportunity,
        pool: Arc<ClientPool>,
        settings: LifecycleSettings,
        cancel: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            opportunity,
            pool,
            settings,
            cancel: CancelSignal::new(cancel),
        }
    }

    /// Runs to completion and reports how it ended.
    pub async fn run(mut self) -> LifecycleReport {
        let outcome = match self.execute().await {
            Ok(realized_profit) => LifecycleOutcome::Completed { realized_profit },
            Err(outcome) => outcome,
        };

        let pair = &self.opportunity.pair;
        let status = self.opportunity.status;
        match &outcome {
            LifecycleOutcome::Completed { realized_profit } => info!(
                pair = %pair,
                realized_profit = %realized_profit,
                expected_profit = %self.opportunity.expected_profit,
                "arbitrage complete"
            ),
            LifecycleOutcome::Canceled => {
                info!(pair = %pair, status = %status, "arbitrage canceled");
            }
            LifecycleOutcome::Aborted { reason } => {
                error!(pair = %pair, status = %status, reason = %reason, "arbitrage aborted");
            }
        }

        LifecycleReport {
            opportunity: self.opportunity,
            outcome,
        }
    }

    async fn execute(&mut self) -> Step<Decimal> {
        let buy = self.buy().await?;
        let sell = self.sell(buy.filled_quantity).await?;
        self.advance(ArbStatus::Done);
        Ok(buy.net_proceeds + sell.net_proceeds)
    }

    // =========================================================================
    // Buy Leg
    // =========================================================================

    async fn buy(&mut self) -> Step<OrderStatus> {
        let order = self.opportunity.buy_order();
        let placed = self.place(&order, true).await?;
        self.advance(ArbStatus::BuyStarted);
        info!(
            pair = %order.pair,
            order_id = %placed.id,
            quantity = %order.quantity,
            limit = %order.limit_price,
            "buy placed"
        );

        let filled = match placed.state {
            OrderState::Done => placed,
            _ => self.await_buy(placed).await?,
        };

        if !filled.has_fills() {
            self.advance(ArbStatus::Canceled);
            return Err(LifecycleOutcome::aborted("buy finished without fills"));
        }
        if filled.filled_quantity < self.opportunity.quantity {
            warn!(
                pair = %self.opportunity.pair,
                filled = %filled.filled_quantity,
                wanted = %self.opportunity.quantity,
                "buy partially filled, selling the filled quantity"
            );
        }
        self.advance(ArbStatus::BuyComplete);
        Ok(filled)
    }

    async fn await_buy(&mut self, placed: OrderStatus) -> Step<OrderStatus> {
        let deadline = Instant::now() + self.settings.buy_timeout;
        let (updates_tx, mut updates) = mpsc::channel(UPDATE_BUFFER);
        let mut poller = OrderPoller::spawn(
            placed.id.clone(),
            Arc::clone(&self.pool),
            self.settings.poll_interval,
            updates_tx,
        );
        let mut latest = placed;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.fired() => {
                    self.cancel_resting(&latest.id).await;
                    poller.stop();
                    self.advance(ArbStatus::Canceled);
                    return Err(LifecycleOutcome::Canceled);
                }
                () = time::sleep_until(deadline) => {
                    warn!(
                        pair = %self.opportunity.pair,
                        order_id = %latest.id,
                        filled = %latest.filled_quantity,
                        "buy timed out"
                    );
                    self.cancel_resting(&latest.id).await;
                    poller.stop();
                    return self.unwind_buy(latest).await;
                }
                update = updates.recv() => {
                    let Some(status) = update else {
                        warn!(order_id = %latest.id, "buy canceled by the exchange");
                        return self.unwind_buy(latest).await;
                    };
                    latest = status;
                    if latest.state == OrderState::Done
                        || latest.filled_quantity >= self.opportunity.quantity
                    {
                        poller.stop();
                        return Ok(latest);
                    }
                    debug!(order_id = %latest.id, filled = %latest.filled_quantity, "buy fill");
                }
            }
        }
    }

    /// Settles a buy that stopped early: keeps any partial fill, otherwise cancels.
    async fn unwind_buy(&mut self, last_seen: OrderStatus) -> Step<OrderStatus> {
        let settled = match self.fetch_status(&last_seen.id).await {
            Ok(status) if status.filled_quantity >= last_seen.filled_quantity => status,
            Ok(_) => last_seen,
            Err(e) => {
                warn!(order_id = %last_seen.id, error = %e, "final buy status unavailable");
                last_seen
            }
        };

        if settled.has_fills() {
            Ok(settled)
        } else {
            self.advance(ArbStatus::Canceled);
            Err(LifecycleOutcome::Canceled)
        }
    }

    // =========================================================================
    // Sell Leg
    // =========================================================================

    async fn sell(&mut self, quantity: Decimal) -> Step<OrderStatus> {
        let order = self.opportunity.sell_order(quantity);
        let placed = match self.place(&order, false).await {
            Ok(placed) => placed,
            Err(outcome) => {
                error!(
                    pair = %order.pair,
                    quantity = %quantity,
                    "sell could not be placed, position needs manual intervention"
                );
                return Err(outcome);
            }
        };
        self.advance(ArbStatus::SellStarted);
        info!(
            pair = %order.pair,
            order_id = %placed.id,
            quantity = %order.quantity,
            limit = %order.limit_price,
            "sell placed"
        );

        let filled = match placed.state {
            OrderState::Done => placed,
            _ => self.await_sell(placed, quantity).await?,
        };

        if filled.filled_quantity < quantity {
            warn!(
                pair = %order.pair,
                filled = %filled.filled_quantity,
                wanted = %quantity,
                "sell finished short"
            );
        }
        self.advance(ArbStatus::SellComplete);
        Ok(filled)
    }

    async fn await_sell(&mut self, placed: OrderStatus, quantity: Decimal) -> Step<OrderStatus> {
        let (updates_tx, mut updates) = mpsc::channel(UPDATE_BUFFER);
        let mut poller = OrderPoller::spawn(
            placed.id.clone(),
            Arc::clone(&self.pool),
            self.settings.poll_interval,
            updates_tx,
        );
        let mut latest = placed;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.fired() => {
                    self.cancel_resting(&latest.id).await;
                    poller.stop();
                    let unsold = quantity - latest.filled_quantity;
                    warn!(
                        pair = %self.opportunity.pair,
                        unsold = %unsold,
                        "sell canceled with inventory outstanding"
                    );
                    self.advance(ArbStatus::Canceled);
                    return Err(LifecycleOutcome::Canceled);
                }
                update = updates.recv() => {
                    let Some(status) = update else {
                        self.advance(ArbStatus::Canceled);
                        return Err(LifecycleOutcome::aborted("sell canceled by the exchange"));
                    };
                    latest = status;
                    if latest.state == OrderState::Done || latest.filled_quantity >= quantity {
                        poller.stop();
                        return Ok(latest);
                    }
                    debug!(order_id = %latest.id, filled = %latest.filled_quantity, "sell fill");
                }
            }
        }
    }

    // =========================================================================
    // Exchange Calls
    // =========================================================================

    /// Places `order`, retrying until it is accepted or the error budget runs out.
    async fn place(&mut self, order: &OrderRequest, cancellable: bool) -> Step<OrderStatus> {
        let mut failures = 0;

        loop {
            if cancellable && self.cancel.is_fired() {
                return Err(LifecycleOutcome::aborted("canceled before the buy was placed"));
            }

            match self.submit(order).await {
                Ok(status) if status.state != OrderState::Canceled => return Ok(status),
                Ok(status) => {
                    warn!(order_id = %status.id, side = %order.side, "order canceled on placement");
                }
                Err(ExecutionError::PoolClosed) => {
                    return Err(LifecycleOutcome::aborted("client pool closed"));
                }
                Err(e) => warn!(
                    side = %order.side,
                    attempt = failures + 1,
                    error = %e,
                    "order placement failed"
                ),
            }

            failures += 1;
            if failures >= self.settings.max_placement_errors {
                return Err(LifecycleOutcome::aborted(format!(
                    "{} placement failed {failures} times",
                    order.side
                )));
            }

            let delay = self.settings.placement_retry_delay;
            if cancellable {
                tokio::select! {
                    biased;
                    () = self.cancel.fired() => {
                        return Err(LifecycleOutcome::aborted("canceled before the buy was placed"));
                    }
                    () = time::sleep(delay) => {}
                }
            } else {
                time::sleep(delay).await;
            }
        }
    }

    async fn submit(&self, order: &OrderRequest) -> Result<OrderStatus> {
        let client = self.pool.acquire().await?;
        Ok(client.place_order(order).await?)
    }

    async fn fetch_status(&self, order_id: &OrderId) -> Result<OrderStatus> {
        let client = self.pool.acquire().await?;
        Ok(client.order_status(order_id).await?)
    }

    /// Best-effort cancel; failures are logged only.
    async fn cancel_resting(&self, order_id: &OrderId) {
        let result = match self.pool.acquire().await {
            Ok(client) => client.cancel_order(order_id).await.map_err(ExecutionError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => debug!(order_id = %order_id, "order cancel requested"),
            Err(e) => warn!(order_id = %order_id, error = %e, "order cancel failed"),
        }
    }

    fn advance(&mut self, next: ArbStatus) {
        let from = self.opportunity.status;
        match self.opportunity.transition(next) {
            Ok(()) => info!(
                pair = %self.opportunity.pair,
                from = %from,
                to = %next,
                code = next.code(),
                "status changed"
            ),
            Err(e) => warn!(pair = %self.opportunity.pair, error = %e, "status change ignored"),
        }
    }
}

/// External cancel request. A dropped sender never fires.
struct CancelSignal {
    rx: oneshot::Receiver<()>,
    fired: bool,
    closed: bool,
}

impl CancelSignal {
    fn new(rx: oneshot::Receiver<()>) -> Self {
        Self {
            rx,
            fired: false,
            closed: false,
        }
    }

    fn is_fired(&mut self) -> bool {
        if !self.fired && !self.closed {
            match self.rx.try_recv() {
                Ok(()) => self.fired = true,
                Err(TryRecvError::Closed) => self.closed = true,
                Err(TryRecvError::Empty) => {}
            }
        }
        self.fired
    }

    /// Resolves once cancellation has been requested.
    async fn fired(&mut self) {
        if self.is_fired() {
            return;
        }
        if !self.closed {
            match (&mut self.rx).await {
                Ok(()) => {
                    self.fired = true;
                    return;
                }
                Err(_) => self.closed = true,
            }
        }
        future::pending::<()>().await;
    }
}
