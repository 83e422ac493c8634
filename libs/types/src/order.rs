//! Order lifecycle types
//!
//! The order status machine is strictly forward: every transition moves to a
//! later stage, terminal states accept no further transitions, and mutation
//! goes through [`Order::advance`] (or the terminal helpers) so the
//! invariants hold everywhere an order is touched.

use crate::errors::OrderError;
use crate::ids::{AccountId, MarketId, OrderId, VenueId};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (pay quote asset, receive base asset)
    BUY,
    /// Sell order (pay base asset, receive quote asset)
    SELL,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::BUY => write!(f, "BUY"),
            Side::SELL => write!(f, "SELL"),
        }
    }
}

/// Order status
///
/// Stage IDs are strictly increasing along the processing path; `Cancelled`
/// sits past the terminal stages so the forward-only rule covers it too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Stage 0: accepted at intake, waiting for a worker
    Submitted,
    /// Stage 1: claimed by a worker
    Processing,
    /// Stage 2: venue quotes being compared
    Routing,
    /// Stage 3: fill in progress at the chosen venue
    Executing,
    /// Stage 4: filled (terminal)
    Completed,
    /// Stage 5: retries exhausted (terminal)
    Failed,
    /// Stage 6: cancelled before execution began (terminal)
    Cancelled,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    /// Numeric stage ID; transitions must strictly increase this value
    pub fn stage_id(&self) -> u8 {
        match self {
            OrderStatus::Submitted => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Routing => 2,
            OrderStatus::Executing => 3,
            OrderStatus::Completed => 4,
            OrderStatus::Failed => 5,
            OrderStatus::Cancelled => 6,
        }
    }

    /// Progress indicator (0-100) shown to subscribers at this stage
    pub fn progress(&self) -> u8 {
        match self {
            OrderStatus::Submitted => 0,
            OrderStatus::Processing => 20,
            OrderStatus::Routing => 40,
            OrderStatus::Executing => 70,
            OrderStatus::Completed => 100,
            OrderStatus::Failed => 0,
            OrderStatus::Cancelled => 0,
        }
    }

    /// Whether a transition from `self` to `next` is legal
    ///
    /// Rules: never backward or self, never out of a terminal state,
    /// `Completed` only from `Executing`, `Cancelled` only from
    /// `Submitted`/`Processing`, `Failed` from any active stage.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() || next.stage_id() <= self.stage_id() {
            return false;
        }
        match next {
            OrderStatus::Processing => matches!(self, OrderStatus::Submitted),
            OrderStatus::Routing => matches!(self, OrderStatus::Processing),
            OrderStatus::Executing => matches!(self, OrderStatus::Routing),
            OrderStatus::Completed => matches!(self, OrderStatus::Executing),
            OrderStatus::Failed => true,
            OrderStatus::Cancelled => {
                matches!(self, OrderStatus::Submitted | OrderStatus::Processing)
            }
            OrderStatus::Submitted => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Routing => "ROUTING",
            OrderStatus::Executing => "EXECUTING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// Fill detail recorded when an order completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDetail {
    /// Venue that filled the order
    pub venue: VenueId,
    /// Price actually realized (quoted price adjusted for slippage)
    pub realized_price: Price,
    /// Quantity actually filled (may be marginally below requested)
    pub realized_quantity: Quantity,
    /// Opaque venue settlement reference
    pub settlement_ref: String,
    /// Unix nanos when the fill settled
    pub executed_at: i64,
}

/// The unit of work flowing through the pipeline
///
/// Quantity is validated once at intake and never mutated. Execution detail
/// is populated exactly once, on completion; error detail only on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub symbol: MarketId,
    pub side: Side,
    pub quantity: Quantity,
    pub status: OrderStatus,
    pub created_at: i64, // Unix nanos
    pub updated_at: i64, // Unix nanos
    pub version: u64,    // Bumped on every mutation
    pub execution: Option<ExecutionDetail>,
    pub error: Option<String>,
}

impl Order {
    /// Create a new submitted order
    pub fn new(
        account_id: AccountId,
        symbol: MarketId,
        side: Side,
        quantity: Quantity,
        timestamp: i64,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            account_id,
            symbol,
            side,
            quantity,
            status: OrderStatus::Submitted,
            created_at: timestamp,
            updated_at: timestamp,
            version: 0,
            execution: None,
            error: None,
        }
    }

    /// Whether the order has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Advance to the next stage, enforcing the forward-only rule
    pub fn advance(&mut self, next: OrderStatus, timestamp: i64) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = timestamp;
        self.version += 1;
        Ok(())
    }

    /// Terminal success: record the fill and move to `Completed`
    pub fn complete(&mut self, detail: ExecutionDetail, timestamp: i64) -> Result<(), OrderError> {
        self.advance(OrderStatus::Completed, timestamp)?;
        self.execution = Some(detail);
        Ok(())
    }

    /// Terminal failure: record the reason and move to `Failed`
    pub fn fail(&mut self, reason: impl Into<String>, timestamp: i64) -> Result<(), OrderError> {
        self.advance(OrderStatus::Failed, timestamp)?;
        self.error = Some(reason.into());
        Ok(())
    }

    /// Explicit external cancellation, legal only before execution begins
    pub fn cancel(&mut self, timestamp: i64) -> Result<(), OrderError> {
        self.advance(OrderStatus::Cancelled, timestamp)
    }
}
