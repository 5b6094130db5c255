//! Core logic.
//!
//! This module contains:
//! - Store: SQLite persistence
//! - Ledger: per-user quota bookkeeping
//! - Selection: quota-bounded selection guard
//! - Lifecycle: stored-video state machine
//! - Service: request/response surface for the CLI

pub mod ledger;
pub mod lifecycle;
pub mod selection;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use ledger::{LedgerError, QuotaLedger, Resource};
pub use lifecycle::{
    BatchDispatch, BulkDeleteOutcome, DeleteOutcome, LifecycleError, ProcessOutcome, RetryOutcome,
    VideoLifecycle,
};
pub use selection::{can_add, check_budget, select_all, QuotaExceeded, SelectAllReport, Selection};
pub use service::{
    ChannelUploads, PlaylistPage, RetryReport, Service, ServiceError, TranscribeSummary,
};
pub use store::{Store, StoreError};
