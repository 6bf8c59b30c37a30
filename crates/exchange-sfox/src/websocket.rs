//! Websocket connection to the SFOX order book feed.
//!
//! [`SfoxFeed`] connects, subscribes to every configured pair, and pushes
//! decoded snapshots onto an `mpsc` channel. The receiving end implements
//! [`OrderBookSource`](crossarb_core::OrderBookSource) and plugs straight
//! into the router. Dropped connections are retried after a fixed delay with
//! fresh sequence state.

use anyhow::{Context, Result};
use chrono::Utc;
use crossarb_core::{ExchangeConfig, OrderBook, Pair};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::feed::{subscription_message, OrderBookDecoder};

/// Why a connection ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The server closed the stream.
    Closed,
    /// Nobody is receiving snapshots any more.
    ConsumerGone,
}

/// Order book feed for a set of pairs.
#[derive(Debug)]
pub struct SfoxFeed {
    ws_url: String,
    pairs: Vec<Pair>,
    reconnect_delay: Duration,
    decoder: OrderBookDecoder,
}

impl SfoxFeed {
    #[must_use]
    pub fn new(config: &ExchangeConfig, pairs: Vec<Pair>) -> Self {
        Self {
            ws_url: config.ws_url.clone(),
            pairs,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            decoder: OrderBookDecoder::new(),
        }
    }

    /// Overrides the websocket URL.
    #[must_use]
    pub fn with_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    /// Sets the pause between a dropped connection and the next attempt.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Runs the feed on a new task and returns the snapshot receiver.
    #[must_use]
    pub fn spawn(
        self,
        capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> (mpsc::Receiver<OrderBook>, JoinHandle<()>) {
        let (books, receiver) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(self.run(books, shutdown));
        (receiver, task)
    }

    /// Connects and forwards snapshots until shutdown or until `books` closes.
    pub async fn run(
        mut self,
        books: mpsc::Sender<OrderBook>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(url = %self.ws_url, pairs = self.pairs.len(), "order book feed started");

        loop {
            let session = tokio::select! {
                biased;
                () = stop_requested(&mut shutdown) => break,
                session = self.session(&books) => session,
            };

            match session {
                Ok(SessionEnd::ConsumerGone) => {
                    info!("snapshot receiver dropped, feed stopping");
                    break;
                }
                Ok(SessionEnd::Closed) => warn!("feed closed by server"),
                Err(e) => {
                    let error = format!("{e:#}");
                    warn!(error = %error, "feed connection failed");
                }
            }

            self.decoder.reset();
            tokio::select! {
                biased;
                () = stop_requested(&mut shutdown) => break,
                () = tokio::time::sleep(self.reconnect_delay) => {
                    info!(delay_ms = self.reconnect_delay.as_millis() as u64, "reconnecting feed");
                }
            }
        }

        info!("order book feed stopped");
    }

    /// One connection: connect, subscribe, and pump messages.
    async fn session(&mut self, books: &mpsc::Sender<OrderBook>) -> Result<SessionEnd> {
        let url = Url::parse(&self.ws_url)
            .with_context(|| format!("invalid feed url {}", self.ws_url))?;
        let (mut stream, response) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect to {url}"))?;
        info!(url = %url, status = %response.status(), "feed connected");

        let subscribe = subscription_message(&self.pairs);
        stream
            .send(Message::Text(subscribe.to_string()))
            .await
            .context("failed to send subscription")?;

        while let Some(message) = stream.next().await {
            match message.context("feed read failed")? {
                Message::Text(text) => {
                    let Some(book) = self.decoder.decode_logged(&text, Utc::now()) else {
                        continue;
                    };
                    if books.send(book).await.is_err() {
                        return Ok(SessionEnd::ConsumerGone);
                    }
                }
                Message::Ping(payload) => {
                    debug!("feed ping");
                    stream
                        .send(Message::Pong(payload))
                        .await
                        .context("failed to answer ping")?;
                }
                Message::Close(frame) => {
                    debug!(frame = ?frame, "feed close frame");
                    return Ok(SessionEnd::Closed);
                }
                _ => {}
            }
        }
        Ok(SessionEnd::Closed)
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop || shutdown.changed().await.is_err() {
            return;
        }
    }
}
