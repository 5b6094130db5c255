//! Adapter interfaces for external systems.
//!
//! Two collaborators sit outside the crate:
//! - the video catalog (YouTube Data API), read page by page
//! - the transcription/embedding worker, which turns a video into text
//!   and vectors

pub mod worker;
pub mod youtube;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{PlaylistEntry, Transcript};

// Re-export the concrete adapters
pub use worker::WorkerClient;
pub use youtube::YouTubeClient;

/// Maximum number of video ids per duration lookup
pub const DURATION_BATCH_LIMIT: usize = 50;

/// Largest page the catalog will return in one listing call
pub const MAX_PAGE_SIZE: u32 = 50;

/// Errors raised by the catalog collaborator or by paging over it
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog resource not found: {0}")]
    NotFound(String),

    #[error("Catalog rate limit reached: {0}")]
    RateLimited(String),

    #[error("No continuation token known for page {page}")]
    MissingToken { page: u32 },

    #[error("Page numbers start at 1, got {0}")]
    InvalidPage(u32),

    #[error("No catalog loaded; fetch the uploads metadata first")]
    NotBootstrapped,

    #[error("Duration lookup for {count} ids exceeds the limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    #[error("Catalog API error: {0}")]
    Api(String),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Playlist-level metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistDetails {
    pub title: Option<String>,
    pub item_count: u64,
}

/// One listing call's worth of playlist entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistItemsPage {
    pub entries: Vec<PlaylistEntry>,

    /// Opaque cursor for the following page, absent on the last page
    pub next_token: Option<String>,
}

/// Token-paginated, rate-limited video catalog
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Resolve a channel handle (`@name`) to its uploads playlist id
    async fn uploads_playlist_id(&self, channel_handle: &str) -> Result<String, CatalogError>;

    /// Title and total item count of a playlist
    async fn playlist_details(&self, playlist_id: &str) -> Result<PlaylistDetails, CatalogError>;

    /// List up to `max_results` entries starting at `page_token`
    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<PlaylistItemsPage, CatalogError>;

    /// ISO-8601 durations keyed by video id, at most
    /// [`DURATION_BATCH_LIMIT`] ids per call
    async fn video_durations(
        &self,
        video_ids: &[String],
    ) -> Result<HashMap<String, String>, CatalogError>;
}

/// Transcription and embedding worker
#[async_trait]
pub trait TranscriptionPipeline: Send + Sync {
    /// Human-readable pipeline name
    fn name(&self) -> &str;

    /// Produce a transcript for a catalog video
    async fn transcribe(&self, youtube_id: &str) -> Result<Transcript>;

    /// Embed an already stored transcript
    async fn embed(&self, video_id: &str, content: &str) -> Result<()>;
}
