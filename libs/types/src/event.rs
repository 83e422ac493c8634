//! Lifecycle events published to subscribers and the audit log
//!
//! Every status transition produces one event; completion and failure get
//! dedicated envelopes because they carry extra payload. Events are owned
//! momentarily by the scheduler, handed to the notifier and persistence
//! gateway, and not retained in memory afterwards.

use crate::ids::{AccountId, OrderId};
use crate::order::{ExecutionDetail, OrderStatus};
use serde::{Deserialize, Serialize};

/// A single status transition record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub previous: OrderStatus,
    pub current: OrderStatus,
    /// Human-readable description of the transition
    pub message: String,
    /// Progress indicator (0-100)
    pub progress: u8,
    /// Unix nanos when the transition happened
    pub timestamp: i64,
}

impl StatusEvent {
    /// Build a transition event; progress comes from the target status.
    pub fn transition(
        order_id: OrderId,
        account_id: AccountId,
        previous: OrderStatus,
        current: OrderStatus,
        message: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            order_id,
            account_id,
            previous,
            current,
            message: message.into(),
            progress: current.progress(),
            timestamp,
        }
    }
}

/// Wire envelope for everything a subscriber can receive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    /// Intermediate status transition
    Status(StatusEvent),
    /// Terminal success, carrying the realized fill
    Completed {
        order_id: OrderId,
        account_id: AccountId,
        detail: ExecutionDetail,
        timestamp: i64,
    },
    /// Terminal failure with a human-readable reason
    Failed {
        order_id: OrderId,
        account_id: AccountId,
        reason: String,
        timestamp: i64,
    },
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::Status(e) => e.order_id,
            OrderEvent::Completed { order_id, .. } => *order_id,
            OrderEvent::Failed { order_id, .. } => *order_id,
        }
    }

    pub fn account_id(&self) -> AccountId {
        match self {
            OrderEvent::Status(e) => e.account_id,
            OrderEvent::Completed { account_id, .. } => *account_id,
            OrderEvent::Failed { account_id, .. } => *account_id,
        }
    }

    /// The status a subscriber observes from this event
    pub fn observed_status(&self) -> OrderStatus {
        match self {
            OrderEvent::Status(e) => e.current,
            OrderEvent::Completed { .. } => OrderStatus::Completed,
            OrderEvent::Failed { .. } => OrderStatus::Failed,
        }
    }

    /// Whether this event ends the order's lifecycle
    pub fn is_terminal(&self) -> bool {
        self.observed_status().is_terminal()
    }
}
