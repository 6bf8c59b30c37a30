//! Per-pair trader: consumes book snapshots and runs at most one lifecycle.

use anyhow::Result as AnyResult;
use chrono::Utc;
use crossarb_arbitrage::ArbDetector;
use crossarb_core::{ArbOpportunity, OrderBook, Pair, TradeLimits};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::balances::BalanceCache;
use crate::events::TraderEvent;
use crate::lifecycle::{Lifecycle, LifecycleSettings};
use crate::pool::ClientPool;

type CancelSlot = Arc<Mutex<Option<oneshot::Sender<()>>>>;

/// Consumer loop for one pair.
pub struct Trader {
    pair: Pair,
    detector: ArbDetector,
    balances: Arc<BalanceCache>,
    pool: Arc<ClientPool>,
    settings: LifecycleSettings,
    events: broadcast::Sender<TraderEvent>,
    active: Arc<AtomicBool>,
    cancel_slot: CancelSlot,
    lifecycle: Option<JoinHandle<()>>,
}

impl Trader {
    #[must_use]
    pub fn new(
        pair: Pair,
        limits: TradeLimits,
        balances: Arc<BalanceCache>,
        pool: Arc<ClientPool>,
        settings: LifecycleSettings,
        events: broadcast::Sender<TraderEvent>,
    ) -> Self {
        Self {
            pair,
            detector: ArbDetector::new(limits),
            balances,
            pool,
            settings,
            events,
            active: Arc::new(AtomicBool::new(false)),
            cancel_slot: Arc::new(Mutex::new(None)),
            lifecycle: None,
        }
    }

    /// Starts the consumer loop with a book channel of `capacity`.
    ///
    /// The loop ends when `shutdown` flips to true or every handle is dropped.
    /// On the way out it cancels the active lifecycle, if any, and waits for it.
    #[must_use]
    pub fn spawn(
        self,
        capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> (TraderHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = TraderHandle {
            pair: self.pair.clone(),
            tx,
            active: Arc::clone(&self.active),
            cancel_slot: Arc::clone(&self.cancel_slot),
            events: self.events.clone(),
        };
        let task = tokio::spawn(self.run(rx, shutdown));
        (handle, task)
    }

    async fn run(
        mut self,
        mut books: mpsc::Receiver<OrderBook>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(pair = %self.pair, "trader started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                book = books.recv() => match book {
                    Some(book) => self.on_book(&book),
                    None => break,
                },
            }
        }

        if let Some(cancel) = self.cancel_slot.lock().take() {
            let _ = cancel.send(());
        }
        if let Some(lifecycle) = self.lifecycle.take() {
            if let Err(e) = lifecycle.await {
                warn!(pair = %self.pair, error = %e, "lifecycle task failed");
            }
        }
        info!(pair = %self.pair, "trader stopped");
    }

    fn on_book(&mut self, book: &OrderBook) {
        let now = Utc::now();
        debug!(
            pair = %self.pair,
            sequence = book.sequence,
            network_ms = book.network_latency().num_milliseconds(),
            internal_ms = book.internal_latency(now).num_milliseconds(),
            total_ms = book.total_latency(now).num_milliseconds(),
            "book latency"
        );
        if let Some(summary) = self.detector.summarize(book) {
            debug!(%summary, "spread");
        }

        let available = self.balances.get(&self.pair.quote);
        let Some(opportunity) = self.detector.detect(book, available) else {
            return;
        };

        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(
                pair = %self.pair,
                quantity = %opportunity.quantity,
                "trader busy, opportunity dropped"
            );
            self.publish(TraderEvent::OpportunityDropped {
                pair: self.pair.clone(),
                opportunity,
            });
            return;
        }

        info!(
            pair = %self.pair,
            sequence = book.sequence,
            quantity = %opportunity.quantity,
            buy_limit = %opportunity.buy_limit_price,
            sell_limit = %opportunity.sell_limit_price,
            expected_profit = %opportunity.expected_profit,
            profit_bps = %opportunity.profit_bps,
            "opportunity accepted"
        );
        self.start_lifecycle(opportunity);
    }

    fn start_lifecycle(&mut self, opportunity: ArbOpportunity) {
        let guard = ActiveGuard {
            active: Arc::clone(&self.active),
            cancel_slot: Arc::clone(&self.cancel_slot),
        };
        let (cancel_tx, cancel_rx) = oneshot::channel();
        *self.cancel_slot.lock() = Some(cancel_tx);

        self.publish(TraderEvent::OpportunityAccepted {
            pair: self.pair.clone(),
            opportunity: opportunity.clone(),
        });

        let lifecycle = Lifecycle::new(
            opportunity,
            Arc::clone(&self.pool),
            self.settings.clone(),
            cancel_rx,
        );
        let events = self.events.clone();
        let pair = self.pair.clone();

        self.lifecycle = Some(tokio::spawn(async move {
            let _guard = guard;
            let report = lifecycle.run().await;
            let _ = events.send(TraderEvent::LifecycleFinished {
                pair,
                final_status: report.opportunity.status,
                outcome: report.outcome,
            });
        }));
    }

    fn publish(&self, event: TraderEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Returns the trader to idle when a lifecycle task ends, including by panic.
struct ActiveGuard {
    active: Arc<AtomicBool>,
    cancel_slot: CancelSlot,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.cancel_slot.lock().take();
        self.active.store(false, Ordering::Release);
    }
}

/// Cloneable access to a running [`Trader`].
#[derive(Debug, Clone)]
pub struct TraderHandle {
    pair: Pair,
    tx: mpsc::Sender<OrderBook>,
    active: Arc<AtomicBool>,
    cancel_slot: CancelSlot,
    events: broadcast::Sender<TraderEvent>,
}

impl TraderHandle {
    #[must_use]
    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    /// Queues a snapshot, waiting for channel capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the trader loop has stopped.
    pub async fn send(&self, book: OrderBook) -> AnyResult<()> {
        self.tx.send(book).await?;
        Ok(())
    }

    /// Sender side of the snapshot channel.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<OrderBook> {
        self.tx.clone()
    }

    /// Returns true while a lifecycle is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Requests cancellation of the active lifecycle.
    ///
    /// Returns false if nothing was active.
    pub fn cancel_position(&self) -> bool {
        let Some(cancel) = self.cancel_slot.lock().take() else {
            return false;
        };
        info!(pair = %self.pair, "cancel requested");
        cancel.send(()).is_ok()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TraderEvent> {
        self.events.subscribe()
    }
}
