//! `crossarb run`: stream order books and trade until Ctrl+C.
//!
//! ## Example Usage
//!
//! ```bash
//! # Live trading, keys from SFOX_API_KEYS
//! SFOX_API_KEYS=key1,key2 cargo run -p crossarb-cli -- run
//!
//! # Paper trading against the live feed with a custom config
//! cargo run -p crossarb-cli -- run --paper --config config/Config.toml
//! ```

use anyhow::{Context, Result};
use clap::Args;
use crossarb_core::config_loader::DEFAULT_CONFIG_PATH;
use crossarb_core::{ApiCredentials, AppConfig, ConfigLoader};
use crossarb_execution::{BoxedClient, ClientPool, LifecycleOutcome, TraderEvent, TraderManager};
use crossarb_sfox::{PaperClient, SfoxClient, SfoxClientConfig, SfoxFeed};
use rust_decimal::Decimal;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Snapshots buffered between the websocket and the router.
const FEED_CAPACITY: usize = 64;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Fill orders against a simulated account instead of the exchange
    #[arg(long)]
    pub paper: bool,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = ConfigLoader::load(&args.config)?;
    info!(
        config = %args.config.display(),
        pairs = config.pairs.len(),
        paper = args.paper,
        "starting crossarb"
    );

    let pool = if args.paper {
        paper_pool(&config)
    } else {
        live_pool(&config)?
    };

    let (feed_shutdown, feed_shutdown_rx) = watch::channel(false);
    let pairs = config.pairs.iter().map(|entry| entry.pair.clone()).collect();
    let (books, feed) =
        SfoxFeed::new(&config.exchange, pairs).spawn(FEED_CAPACITY, feed_shutdown_rx);

    let manager = TraderManager::new(config, pool).start(books);
    let stats = tokio::spawn(collect_stats(manager.subscribe()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("ctrl-c received, shutting down");

    let _ = feed_shutdown.send(true);
    let result = manager.shutdown().await;
    if let Err(e) = feed.await {
        warn!(error = %e, "feed task failed");
    }
    match stats.await {
        Ok(stats) => info!(%stats, "session summary"),
        Err(e) => warn!(error = %e, "event task failed"),
    }
    result
}

fn paper_pool(config: &AppConfig) -> ClientPool {
    let paper = PaperClient::from(&config.paper);
    let clients = (0..config.trading.client_pool_size)
        .map(|_| Box::new(paper.clone()) as BoxedClient)
        .collect();
    ClientPool::new(clients)
}

fn live_pool(config: &AppConfig) -> Result<ClientPool> {
    let credentials = ApiCredentials::from_env()?;
    let client_config = SfoxClientConfig::from(&config.exchange);
    info!(
        keys = credentials.len(),
        handles = config.trading.client_pool_size,
        "building client pool"
    );
    ClientPool::from_credentials(&credentials, config.trading.client_pool_size, |key| {
        Ok(Box::new(SfoxClient::new(client_config.clone(), key.clone())?) as BoxedClient)
    })
}

/// Tallies trader events until every sender is gone.
async fn collect_stats(mut events: broadcast::Receiver<TraderEvent>) -> SessionStats {
    let mut stats = SessionStats::default();
    loop {
        match events.recv().await {
            Ok(event) => stats.record(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    stats
}

/// Running totals over one session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct SessionStats {
    accepted: u64,
    dropped: u64,
    completed: u64,
    canceled: u64,
    aborted: u64,
    realized_profit: Decimal,
}

impl SessionStats {
    fn record(&mut self, event: &TraderEvent) {
        match event {
            TraderEvent::OpportunityAccepted { .. } => self.accepted += 1,
            TraderEvent::OpportunityDropped { .. } => self.dropped += 1,
            TraderEvent::LifecycleFinished { outcome, .. } => match outcome {
                LifecycleOutcome::Completed { realized_profit } => {
                    self.completed += 1;
                    self.realized_profit += *realized_profit;
                }
                LifecycleOutcome::Canceled => self.canceled += 1,
                LifecycleOutcome::Aborted { .. } => self.aborted += 1,
            },
        }
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted={} dropped={} completed={} canceled={} aborted={} realized_profit={}",
            self.accepted,
            self.dropped,
            self.completed,
            self.canceled,
            self.aborted,
            self.realized_profit
        )
    }
}
