//! Persistence gateway for the order routing pipeline
//!
//! Owns the durable copy of every order record plus the append-only audit
//! log of lifecycle events. The pipeline talks to this crate exclusively
//! through the [`store::OrderStore`] trait.

pub mod journal;
pub mod store;

pub use journal::{AuditJournal, AuditRecord, JournalError};
pub use store::{MemoryStore, OrderStore, StoreError};
