//! Domain types for vidscribe.
//!
//! This module contains the core data structures:
//! - Duration: catalog duration normalization and hour rounding
//! - Catalog: external catalog entries
//! - Quota: per-user resource ledger entry
//! - Video: stored videos, transcript chunks and the lifecycle status

pub mod catalog;
pub mod duration;
pub mod quota;
pub mod video;

// Re-export commonly used types
pub use catalog::{CatalogItem, PlaylistEntry};
pub use duration::{duration_to_minutes, hours_for_minutes};
pub use quota::{Quota, QuotaDefaults, QuotaUpdate};
pub use video::{
    NewVideo, RetryAction, Transcript, TranscriptChunk, TranscriptSegment, Video, VideoOrigin,
    VideoStatus,
};
