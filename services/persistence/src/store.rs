//! Order store boundary
//!
//! The pipeline owns the mutable order record while processing; this store
//! owns the durable copy. `record_transition` writes the updated snapshot
//! and the audit entry together, so an external reader never observes a
//! status without its audit trail.

use crate::journal::{AuditJournal, AuditRecord, JournalError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Mutex;
use thiserror::Error;
use types::event::StatusEvent;
use types::ids::{AccountId, OrderId};
use types::order::Order;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("order not found: {order_id}")]
    NotFound { order_id: OrderId },

    #[error("order already exists: {order_id}")]
    Duplicate { order_id: OrderId },

    #[error("audit journal error: {0}")]
    Journal(#[from] JournalError),
}

/// Durable order records and audit log.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Record a freshly accepted order. Fails on duplicate identifiers.
    async fn create_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Fetch a single order by identifier.
    async fn fetch_order(&self, order_id: OrderId) -> Result<Order, StoreError>;

    /// An account's orders, most recent first, truncated to `limit`.
    async fn list_account_orders(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError>;

    /// Persist an updated order snapshot together with the transition's
    /// audit entry.
    async fn record_transition(&self, order: &Order, event: &StatusEvent)
        -> Result<(), StoreError>;

    /// Persist the final fill detail of a completed order.
    async fn record_execution(&self, order: &Order) -> Result<(), StoreError>;

    /// Mark an order as interrupted by shutdown, leaving its status
    /// untouched so a fresh scheduler can re-enqueue it.
    async fn record_interruption(&self, order_id: OrderId, reason: &str) -> Result<(), StoreError>;
}

/// In-memory store, optionally backed by the audit journal.
///
/// Stands in for the real durable store in tests and the simulated
/// deployment; the trait is the integration point for anything else.
pub struct MemoryStore {
    orders: DashMap<OrderId, Order>,
    by_account: DashMap<AccountId, Vec<OrderId>>,
    journal: Option<Mutex<AuditJournal>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            by_account: DashMap::new(),
            journal: None,
        }
    }

    /// Attach an audit journal; every mutation is appended to it.
    pub fn with_journal(journal: AuditJournal) -> Self {
        Self {
            orders: DashMap::new(),
            by_account: DashMap::new(),
            journal: Some(Mutex::new(journal)),
        }
    }

    /// Number of orders currently stored.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn journal_append(&self, record: &AuditRecord, timestamp: i64) -> Result<(), StoreError> {
        if let Some(journal) = &self.journal {
            let mut journal = journal.lock().unwrap_or_else(|e| e.into_inner());
            journal.append(record, timestamp)?;
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, order: &Order) -> Result<(), StoreError> {
        if self.orders.contains_key(&order.order_id) {
            return Err(StoreError::Duplicate {
                order_id: order.order_id,
            });
        }
        self.orders.insert(order.order_id, order.clone());
        self.by_account
            .entry(order.account_id)
            .or_default()
            .push(order.order_id);
        self.journal_append(
            &AuditRecord::OrderCreated {
                order: order.clone(),
            },
            order.created_at,
        )
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Order, StoreError> {
        self.orders
            .get(&order_id)
            .map(|o| o.clone())
            .ok_or(StoreError::NotFound { order_id })
    }

    async fn list_account_orders(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError> {
        let ids = self
            .by_account
            .get(&account_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();

        // Insertion order is chronological (ids are appended at creation),
        // so most-recent-first is a reverse walk.
        let mut orders: Vec<Order> = ids
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| self.orders.get(id).map(|o| o.clone()))
            .collect();
        orders.truncate(limit);
        Ok(orders)
    }

    async fn record_transition(
        &self,
        order: &Order,
        event: &StatusEvent,
    ) -> Result<(), StoreError> {
        if !self.orders.contains_key(&order.order_id) {
            return Err(StoreError::NotFound {
                order_id: order.order_id,
            });
        }
        self.orders.insert(order.order_id, order.clone());
        self.journal_append(
            &AuditRecord::StatusChanged {
                event: event.clone(),
            },
            event.timestamp,
        )
    }

    async fn record_execution(&self, order: &Order) -> Result<(), StoreError> {
        let detail = match &order.execution {
            Some(detail) => detail.clone(),
            None => {
                return Err(StoreError::NotFound {
                    order_id: order.order_id,
                })
            }
        };
        self.orders.insert(order.order_id, order.clone());
        self.journal_append(
            &AuditRecord::ExecutionRecorded {
                order_id: order.order_id,
                detail: detail.clone(),
            },
            detail.executed_at,
        )
    }

    async fn record_interruption(&self, order_id: OrderId, reason: &str) -> Result<(), StoreError> {
        if !self.orders.contains_key(&order_id) {
            return Err(StoreError::NotFound { order_id });
        }
        self.journal_append(
            &AuditRecord::Interrupted {
                order_id,
                reason: reason.to_string(),
            },
            types::time::now_nanos(),
        )
    }
}
