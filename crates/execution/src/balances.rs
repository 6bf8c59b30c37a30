//! Last-known account balances, refreshed in the background.

use crossarb_core::{Balance, Currency};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::pool::ClientPool;

/// Shared balance map. Reads never wait on the network.
#[derive(Debug, Default)]
pub struct BalanceCache {
    balances: RwLock<HashMap<Currency, Decimal>>,
}

impl BalanceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Available amount of `currency`, or zero if it has never been reported.
    #[must_use]
    pub fn get(&self, currency: &Currency) -> Decimal {
        self.balances
            .read()
            .get(currency)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Copy of every known balance.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<Currency, Decimal> {
        self.balances.read().clone()
    }

    /// Merges fresh balances into the cache.
    ///
    /// Currencies missing from `balances` keep their previous value.
    pub fn apply(&self, balances: Vec<Balance>) {
        let fresh: HashMap<Currency, Decimal> = balances
            .into_iter()
            .map(|balance| (balance.currency, balance.available))
            .collect();

        self.balances.write().extend(fresh);
    }

    /// Fetches balances through the pool and merges them.
    ///
    /// Returns the number of currencies reported.
    ///
    /// # Errors
    ///
    /// Returns an error if no client can be leased or the exchange call fails.
    pub async fn refresh(&self, pool: &ClientPool) -> Result<usize> {
        let balances = {
            let client = pool.acquire().await?;
            client.balances().await?
        };
        let count = balances.len();
        self.apply(balances);
        Ok(count)
    }

    /// Refreshes on `interval` until `shutdown` flips to true.
    ///
    /// The first refresh runs immediately. Failures are logged and the
    /// previous values stay in place.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        pool: Arc<ClientPool>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_ms = interval.as_millis() as u64, "balance refresh started");
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match cache.refresh(&pool).await {
                            Ok(count) => debug!(currencies = count, "balances refreshed"),
                            Err(e) => warn!(error = %e, "balance refresh failed"),
                        }
                    }
                }
            }
            info!("balance refresh stopped");
        })
    }
}
