//! Wiring of traders, router, and balance refresh for a whole deployment.
//!
//! # Example
//!
//! ```ignore
//! let manager = TraderManager::new(config, pool);
//! let handle = manager.start(feed_receiver);
//!
//! tokio::signal::ctrl_c().await?;
//! handle.shutdown().await?;
//! ```

use anyhow::Result;
use crossarb_core::{AppConfig, OrderBookSource, Pair};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::balances::BalanceCache;
use crate::events::TraderEvent;
use crate::lifecycle::LifecycleSettings;
use crate::pool::ClientPool;
use crate::router::Router;
use crate::trader::{Trader, TraderHandle};

const EVENT_CAPACITY: usize = 1024;

/// Builds one trader per configured pair and connects them to a book source.
pub struct TraderManager {
    config: AppConfig,
    pool: Arc<ClientPool>,
}

impl TraderManager {
    #[must_use]
    pub fn new(config: AppConfig, pool: ClientPool) -> Self {
        Self {
            config,
            pool: Arc::new(pool),
        }
    }

    /// Spawns the balance refresh, every trader, and the router.
    #[must_use]
    pub fn start<S>(self, source: S) -> ManagerHandle
    where
        S: OrderBookSource + 'static,
    {
        let trading = &self.config.trading;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let balances = Arc::new(BalanceCache::new());
        let refresh = balances.spawn_refresh(
            Arc::clone(&self.pool),
            trading.balance_refresh_interval(),
            shutdown_rx.clone(),
        );

        let settings = LifecycleSettings::from(trading);
        let mut router = Router::new();
        let mut traders = HashMap::new();
        let mut trader_tasks = Vec::new();

        for entry in &self.config.pairs {
            let trader = Trader::new(
                entry.pair.clone(),
                entry.limits.clone(),
                Arc::clone(&balances),
                Arc::clone(&self.pool),
                settings.clone(),
                events.clone(),
            );
            let (handle, task) =
                trader.spawn(trading.orderbook_channel_capacity, shutdown_rx.clone());
            router.register(entry.pair.clone(), handle.sender());
            traders.insert(entry.pair.clone(), handle);
            trader_tasks.push(task);
        }

        let router = tokio::spawn(router.run(source, shutdown_rx));
        info!(pairs = traders.len(), pool_size = self.pool.size(), "trader manager started");

        ManagerHandle {
            traders,
            balances,
            pool: self.pool,
            events,
            shutdown,
            refresh,
            router,
            trader_tasks,
        }
    }
}

/// Control surface for a running deployment.
pub struct ManagerHandle {
    traders: HashMap<Pair, TraderHandle>,
    balances: Arc<BalanceCache>,
    pool: Arc<ClientPool>,
    events: broadcast::Sender<TraderEvent>,
    shutdown: watch::Sender<bool>,
    refresh: JoinHandle<()>,
    router: JoinHandle<Result<()>>,
    trader_tasks: Vec<JoinHandle<()>>,
}

impl ManagerHandle {
    /// Requests cancellation of the active lifecycle on `pair`.
    ///
    /// Returns false if the pair is unknown or idle.
    pub fn cancel_position(&self, pair: &Pair) -> bool {
        self.traders
            .get(pair)
            .is_some_and(TraderHandle::cancel_position)
    }

    #[must_use]
    pub fn trader(&self, pair: &Pair) -> Option<&TraderHandle> {
        self.traders.get(pair)
    }

    #[must_use]
    pub fn balances(&self) -> &BalanceCache {
        &self.balances
    }

    /// Receives events from every trader.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TraderEvent> {
        self.events.subscribe()
    }

    /// Stops the router, the balance refresh, and every trader.
    ///
    /// Active lifecycles are cancelled and awaited before the pool closes.
    ///
    /// # Errors
    ///
    /// Returns the router's error if the book source failed.
    pub async fn shutdown(self) -> Result<()> {
        info!("trader manager shutting down");
        let _ = self.shutdown.send(true);

        for task in self.trader_tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "trader task failed");
            }
        }
        if let Err(e) = self.refresh.await {
            warn!(error = %e, "balance refresh task failed");
        }
        let routed = match self.router.await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "router task failed");
                Ok(())
            }
        };

        self.pool.close();
        info!("trader manager stopped");
        routed
    }
}
