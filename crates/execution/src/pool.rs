//! Fixed-size pool of exchange client handles.
//!
//! Each handle is leased to exactly one caller at a time. Callers wait on a
//! semaphore when every handle is out; the lease returns its handle on drop,
//! so early returns and panics cannot leak one.
//!
//! # Example
//!
//! ```ignore
//! let pool = ClientPool::from_credentials(&credentials, 20, |key| {
//!     Ok(Box::new(SfoxClient::new(client_config.clone(), key.clone())?) as BoxedClient)
//! })?;
//!
//! let client = pool.acquire().await?;
//! let status = client.order_status(&order_id).await?;
//! ```

use anyhow::{bail, Result as AnyResult};
use crossarb_core::{ApiCredentials, ExchangeClient};
use parking_lot::Mutex;
use secrecy::SecretString;
use std::fmt;
use std::ops::Deref;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::{ExecutionError, Result};

/// Owned, type-erased exchange client.
pub type BoxedClient = Box<dyn ExchangeClient>;

pub struct ClientPool {
    clients: Vec<BoxedClient>,
    idle: Mutex<Vec<usize>>,
    permits: Semaphore,
}

impl ClientPool {
    /// Creates a pool over the given handles.
    #[must_use]
    pub fn new(clients: Vec<BoxedClient>) -> Self {
        let idle = (0..clients.len()).rev().collect();
        let permits = Semaphore::new(clients.len());
        Self {
            clients,
            idle: Mutex::new(idle),
            permits,
        }
    }

    /// Builds `size` handles, assigning credentials round-robin.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or the factory fails for any key.
    pub fn from_credentials<F>(
        credentials: &ApiCredentials,
        size: usize,
        mut factory: F,
    ) -> AnyResult<Self>
    where
        F: FnMut(&SecretString) -> AnyResult<BoxedClient>,
    {
        if size == 0 {
            bail!("client pool size must be at least 1");
        }
        let clients = credentials
            .round_robin(size)
            .map(&mut factory)
            .collect::<AnyResult<Vec<_>>>()?;
        Ok(Self::new(clients))
    }

    /// Leases a handle, waiting until one is free.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::PoolClosed`] once [`close`](Self::close) has been called.
    pub async fn acquire(&self) -> Result<PooledClient<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ExecutionError::PoolClosed)?;
        // permits never exceed the idle stack
        let index = self.idle.lock().pop().ok_or(ExecutionError::PoolClosed)?;
        Ok(PooledClient {
            pool: self,
            index,
            _permit: permit,
        })
    }

    /// Total number of handles.
    #[must_use]
    pub fn size(&self) -> usize {
        self.clients.len()
    }

    /// Number of handles not currently leased.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Rejects all pending and future acquisitions.
    pub fn close(&self) {
        self.permits.close();
    }

    fn release(&self, index: usize) {
        self.idle.lock().push(index);
    }
}

impl fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPool")
            .field("size", &self.size())
            .field("available", &self.available())
            .finish()
    }
}

/// A leased client handle. Returned to the pool on drop.
pub struct PooledClient<'a> {
    pool: &'a ClientPool,
    index: usize,
    _permit: SemaphorePermit<'a>,
}

impl PooledClient<'_> {
    /// Position of the handle within the pool.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Deref for PooledClient<'_> {
    type Target = dyn ExchangeClient;

    fn deref(&self) -> &Self::Target {
        self.pool.clients[self.index].as_ref()
    }
}

impl Drop for PooledClient<'_> {
    fn drop(&mut self) {
        // the permit field drops after this, so the handle is back first
        self.pool.release(self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crossarb_core::{Balance, OrderId, OrderRequest, OrderState, OrderStatus};
    use std::sync::Arc;
    use std::time::Duration;

    struct NoopClient;

    #[async_trait]
    impl ExchangeClient for NoopClient {
        async fn place_order(&self, _order: &OrderRequest) -> crossarb_core::Result<OrderStatus> {
            Ok(OrderStatus::new(OrderId::new("1"), OrderState::Started))
        }

        async fn order_status(&self, order_id: &OrderId) -> crossarb_core::Result<OrderStatus> {
            Ok(OrderStatus::new(order_id.clone(), OrderState::Started))
        }

        async fn cancel_order(&self, _order_id: &OrderId) -> crossarb_core::Result<()> {
            Ok(())
        }

        async fn balances(&self) -> crossarb_core::Result<Vec<Balance>> {
            Ok(Vec::new())
        }
    }

    fn pool_of(size: usize) -> ClientPool {
        ClientPool::new((0..size).map(|_| Box::new(NoopClient) as BoxedClient).collect())
    }

    // ==================== Lease Tests ====================

    #[tokio::test]
    async fn test_acquire_and_release() {
        let pool = pool_of(2);
        assert_eq!(pool.size(), 2);

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        assert_ne!(first.index(), second.index());
        assert_eq!(pool.available(), 0);

        let released = first.index();
        drop(first);
        assert_eq!(pool.available(), 1);

        let again = pool.acquire().await.unwrap();
        assert_eq!(again.index(), released);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let pool = Arc::new(pool_of(1));
        let lease = pool.acquire().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.map(|client| client.index()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(lease);
        let index = waiter.await.unwrap().unwrap();
        assert_eq!(index, 0);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_acquire() {
        let pool = pool_of(1);
        pool.close();
        assert!(matches!(pool.acquire().await, Err(ExecutionError::PoolClosed)));
    }

    #[tokio::test]
    async fn test_leased_client_is_usable() {
        let pool = pool_of(1);
        let client = pool.acquire().await.unwrap();
        let status = client.order_status(&OrderId::new("9")).await.unwrap();
        assert_eq!(status.id.as_str(), "9");
    }

    // ==================== Construction Tests ====================

    #[test]
    fn test_from_credentials_round_robin() {
        let credentials = ApiCredentials::parse("a,b").unwrap();
        let mut built = 0;
        let pool = ClientPool::from_credentials(&credentials, 5, |_key| {
            built += 1;
            Ok(Box::new(NoopClient) as BoxedClient)
        })
        .unwrap();
        assert_eq!(pool.size(), 5);
        assert_eq!(built, 5);
    }

    #[test]
    fn test_from_credentials_rejects_zero_size() {
        let credentials = ApiCredentials::parse("a").unwrap();
        let result = ClientPool::from_credentials(&credentials, 0, |_key| {
            Ok(Box::new(NoopClient) as BoxedClient)
        });
        assert!(result.is_err());
    }
}
