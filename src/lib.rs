//! vidscribe - Quota-gated video catalog browser and transcription tracker
//!
//! Browses a YouTube channel or playlist page by page, lets a user pick
//! videos within a monthly video-hour quota, and tracks each picked video
//! through transcription and embedding.
//!
//! # Architecture
//!
//! - Catalog pages are fetched with forward-only continuation tokens and
//!   cached per session, so paging back never refetches
//! - Quota lives in SQLite; credits and debits are single conditional
//!   statements, so concurrent requests never lose an update
//! - Stored videos move through a small state machine with
//!   compare-and-set writes; failures are retryable per step
//!
//! # Modules
//!
//! - `adapters`: External system integrations (YouTube Data API, worker)
//! - `core`: Store, quota ledger, selection guard, lifecycle, service
//! - `domain`: Data structures (Video, Quota, CatalogItem)
//! - `library`: Catalog paginator
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Browse the first three pages of a channel
//! vidscribe browse @veritasium --pages 3
//!
//! # Transcribe everything on page 2 that fits the quota
//! vidscribe transcribe --user me@example.com --channel @veritasium --page 2 --all
//!
//! # Retry a failed video
//! vidscribe retry <video-id> --user me@example.com
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{CatalogError, CatalogSource, TranscriptionPipeline};
pub use core::{QuotaLedger, Service, ServiceError, Store, VideoLifecycle};
pub use domain::{CatalogItem, Quota, Video, VideoStatus};
pub use library::{CatalogPaginator, CatalogRef};
