use crossarb_core::{ArbOpportunity, ArbStatus, Pair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an accepted opportunity's lifecycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleOutcome {
    /// Both legs filled; profit is buy plus sell net proceeds.
    Completed { realized_profit: Decimal },
    /// A resting order was cancelled on request or timeout with nothing held.
    Canceled,
    /// Placement failed past the error budget or the exchange ended an order early.
    Aborted { reason: String },
}

impl LifecycleOutcome {
    /// Creates an aborted outcome.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl fmt::Display for LifecycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { realized_profit } => write!(f, "completed ({realized_profit})"),
            Self::Canceled => f.write_str("canceled"),
            Self::Aborted { reason } => write!(f, "aborted: {reason}"),
        }
    }
}

/// Notifications published by traders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TraderEvent {
    /// An opportunity was accepted and its lifecycle started.
    OpportunityAccepted {
        pair: Pair,
        opportunity: ArbOpportunity,
    },

    /// An opportunity was found while another was active and discarded.
    OpportunityDropped {
        pair: Pair,
        opportunity: ArbOpportunity,
    },

    /// A lifecycle ended.
    LifecycleFinished {
        pair: Pair,
        final_status: ArbStatus,
        outcome: LifecycleOutcome,
    },
}

impl TraderEvent {
    /// Pair the event concerns.
    #[must_use]
    pub fn pair(&self) -> &Pair {
        match self {
            Self::OpportunityAccepted { pair, .. }
            | Self::OpportunityDropped { pair, .. }
            | Self::LifecycleFinished { pair, .. } => pair,
        }
    }
}
