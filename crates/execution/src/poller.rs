//! Background status polling for one resting order.

use crossarb_core::{OrderId, OrderState, OrderStatus};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{ExecutionError, Result};
use crate::pool::ClientPool;

/// Handle to a task polling one order's status.
///
/// The task forwards an update whenever the filled quantity grows and once
/// more when the order reaches `Done`. It exits without a message when the
/// exchange reports the order `Canceled`, so a closed channel means the order
/// was cancelled. Dropping the handle stops the task.
#[derive(Debug)]
pub struct OrderPoller {
    order_id: OrderId,
    kill: Option<oneshot::Sender<()>>,
}

impl OrderPoller {
    /// Starts polling `order_id` every `interval`.
    #[must_use]
    pub fn spawn(
        order_id: OrderId,
        pool: Arc<ClientPool>,
        interval: Duration,
        updates: mpsc::Sender<OrderStatus>,
    ) -> Self {
        let (kill, killed) = oneshot::channel();
        tokio::spawn(poll_loop(order_id.clone(), pool, interval, updates, killed));
        Self {
            order_id,
            kill: Some(kill),
        }
    }

    /// Order being polled.
    #[must_use]
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Signals the task to exit. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

impl Drop for OrderPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    order_id: OrderId,
    pool: Arc<ClientPool>,
    interval: Duration,
    updates: mpsc::Sender<OrderStatus>,
    mut killed: oneshot::Receiver<()>,
) {
    let mut last_filled = Decimal::ZERO;

    loop {
        let polled = tokio::select! {
            biased;
            _ = &mut killed => {
                debug!(order_id = %order_id, "poller stopped");
                return;
            }
            polled = next_status(&pool, &order_id, interval) => polled,
        };

        let status = match polled {
            Ok(status) => status,
            Err(ExecutionError::PoolClosed) => {
                debug!(order_id = %order_id, "client pool closed, poller exiting");
                return;
            }
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "order status poll failed");
                continue;
            }
        };

        match status.state {
            OrderState::Canceled => {
                debug!(order_id = %order_id, "order canceled, poller exiting");
                return;
            }
            OrderState::Done => {
                let _ = updates.send(status).await;
                return;
            }
            OrderState::Started if status.filled_quantity > last_filled => {
                last_filled = status.filled_quantity;
                if updates.send(status).await.is_err() {
                    return;
                }
            }
            OrderState::Started => {}
        }
    }
}

async fn next_status(
    pool: &ClientPool,
    order_id: &OrderId,
    interval: Duration,
) -> Result<OrderStatus> {
    tokio::time::sleep(interval).await;
    let client = pool.acquire().await?;
    Ok(client.order_status(order_id).await?)
}
