use anyhow::Result as AnyResult;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::order::{Balance, OrderId, OrderRequest, OrderStatus};
use crate::types::OrderBook;

/// Authenticated access to one exchange account.
///
/// Implementations are not required to support concurrent calls; callers
/// serialize access per handle through the client pool.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Submits a limit order and returns its initial status.
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderStatus>;

    /// Fetches the current status of an order.
    async fn order_status(&self, order_id: &OrderId) -> Result<OrderStatus>;

    /// Requests cancellation of a resting order.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<()>;

    /// Lists available balances for every currency on the account.
    async fn balances(&self) -> Result<Vec<Balance>>;
}

/// A stream of decoded order book snapshots.
#[async_trait]
pub trait OrderBookSource: Send {
    /// Returns the next snapshot, or `None` once the source is exhausted.
    async fn next_book(&mut self) -> AnyResult<Option<OrderBook>>;
}

#[async_trait]
impl OrderBookSource for mpsc::Receiver<OrderBook> {
    async fn next_book(&mut self) -> AnyResult<Option<OrderBook>> {
        Ok(self.recv().await)
    }
}
