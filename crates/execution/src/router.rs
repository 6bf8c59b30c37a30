//! Fan-out of decoded snapshots to per-pair traders.

use anyhow::{Context, Result};
use crossarb_core::{OrderBook, OrderBookSource, Pair};
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Routes each snapshot to the trader registered for its pair.
///
/// Snapshots for one pair arrive in source order. Sends wait for channel
/// capacity, so a slow trader applies backpressure to the source.
#[derive(Debug, Default)]
pub struct Router {
    routes: HashMap<Pair, mpsc::Sender<OrderBook>>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the channel for `pair`, replacing any previous one.
    pub fn register(&mut self, pair: Pair, sender: mpsc::Sender<OrderBook>) {
        self.routes.insert(pair, sender);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Delivers one snapshot. Returns false if it was dropped.
    pub async fn route(&self, book: OrderBook) -> bool {
        let Some(sender) = self.routes.get(&book.pair) else {
            warn!(pair = %book.pair, "no trader for pair, snapshot dropped");
            return false;
        };

        let pair = book.pair.clone();
        if sender.send(book).await.is_err() {
            warn!(pair = %pair, "trader stopped, snapshot dropped");
            return false;
        }
        true
    }

    /// Pumps `source` until it ends or `shutdown` flips to true.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails.
    pub async fn run<S>(self, mut source: S, mut shutdown: watch::Receiver<bool>) -> Result<()>
    where
        S: OrderBookSource,
    {
        info!(pairs = self.routes.len(), "router started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                next = source.next_book() => {
                    match next.context("order book source failed")? {
                        Some(book) => {
                            self.route(book).await;
                        }
                        None => {
                            info!("order book source exhausted");
                            break;
                        }
                    }
                }
            }
        }

        info!("router stopped");
        Ok(())
    }
}
