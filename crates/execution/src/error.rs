use crossarb_core::ExchangeError;
use thiserror::Error;

/// Errors raised while executing against pooled exchange clients.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The exchange call itself failed.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// The client pool was closed during shutdown.
    #[error("client pool is closed")]
    PoolClosed,
}

impl ExecutionError {
    /// Returns true if retrying the same call later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Exchange(err) => err.is_transient(),
            Self::PoolClosed => false,
        }
    }
}

/// Result type alias for execution operations.
pub type Result<T> = std::result::Result<T, ExecutionError>;
