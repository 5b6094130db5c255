//! Stored videos and their ingestion lifecycle.
//!
//! A video is created `PENDING` when a transcription request is accepted and
//! moves through the states below. Every status write goes through
//! [`VideoStatus::can_transition_to`].
//!
//! ```text
//! PENDING ──► COMPLETED ──► EMBEDDING_ERROR
//!    │            ▲   ▲            │
//!    ▼            │   └────────────┘ (embed retry)
//! TRANSCRIBE_ERROR ─► PENDING (transcribe retry)
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::duration::hours_for_minutes;

/// Processing state of a stored video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    /// Accepted, transcription running or queued
    Pending,

    /// Transcription failed; retry re-runs transcription and embedding
    TranscribeError,

    /// Transcript stored but embedding failed; retry re-runs embedding only
    EmbeddingError,

    /// Transcribed and embedded
    Completed,
}

impl VideoStatus {
    pub const ALL: [VideoStatus; 4] = [
        VideoStatus::Pending,
        VideoStatus::TranscribeError,
        VideoStatus::EmbeddingError,
        VideoStatus::Completed,
    ];

    /// Persisted representation
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "PENDING",
            VideoStatus::TranscribeError => "TRANSCRIBE_ERROR",
            VideoStatus::EmbeddingError => "EMBEDDING_ERROR",
            VideoStatus::Completed => "COMPLETED",
        }
    }

    /// States reachable from this one in a single write
    pub fn allowed_transitions(self) -> &'static [VideoStatus] {
        match self {
            VideoStatus::Pending => &[VideoStatus::Completed, VideoStatus::TranscribeError],
            VideoStatus::TranscribeError => &[
                VideoStatus::Pending,
                VideoStatus::Completed,
                VideoStatus::TranscribeError,
            ],
            VideoStatus::Completed => &[VideoStatus::EmbeddingError],
            VideoStatus::EmbeddingError => &[VideoStatus::Completed, VideoStatus::EmbeddingError],
        }
    }

    pub fn can_transition_to(self, next: VideoStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Which step a retry has to re-run, if the state is retryable at all
    pub fn retry_action(self) -> Option<RetryAction> {
        match self {
            VideoStatus::TranscribeError => Some(RetryAction::Transcribe),
            VideoStatus::EmbeddingError => Some(RetryAction::Embed),
            VideoStatus::Pending | VideoStatus::Completed => None,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, VideoStatus::TranscribeError | VideoStatus::EmbeddingError)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown video status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for VideoStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VideoStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Pipeline step re-dispatched by a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryAction {
    /// Full transcription followed by embedding
    Transcribe,

    /// Embedding of the already stored transcript
    Embed,
}

impl fmt::Display for RetryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryAction::Transcribe => f.write_str("transcribe"),
            RetryAction::Embed => f.write_str("embed"),
        }
    }
}

/// Where a stored video was selected from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOrigin {
    pub channel_handle: Option<String>,
    pub playlist_id: Option<String>,
    pub playlist_title: Option<String>,
}

impl VideoOrigin {
    pub fn channel(handle: impl Into<String>, uploads_playlist_id: impl Into<String>) -> Self {
        Self {
            channel_handle: Some(handle.into()),
            playlist_id: Some(uploads_playlist_id.into()),
            playlist_title: None,
        }
    }

    pub fn playlist(playlist_id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            channel_handle: None,
            playlist_id: Some(playlist_id.into()),
            playlist_title: title,
        }
    }
}

/// A video owned by a user, tracked through ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    /// Internal identifier (UUID v4)
    pub id: String,

    /// External catalog identifier, unique across the store
    pub youtube_id: String,

    /// Owner
    pub user_email: String,

    pub title: String,

    /// Transcript text (empty until transcription succeeds)
    pub content: String,

    pub channel_handle: Option<String>,
    pub playlist_id: Option<String>,
    pub playlist_title: Option<String>,
    pub thumbnail_url: Option<String>,

    /// Billable length in whole minutes
    pub duration_in_minutes: u32,

    pub status: VideoStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub fn is_owned_by(&self, user_email: &str) -> bool {
        self.user_email == user_email
    }

    /// Video-hours returned to the owner when this video is deleted
    pub fn refund_hours(&self) -> u32 {
        match self.status {
            VideoStatus::Completed => hours_for_minutes(self.duration_in_minutes),
            _ => 0,
        }
    }
}

/// Fields needed to insert a new video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVideo {
    pub youtube_id: String,
    pub user_email: String,
    pub title: String,
    pub origin: VideoOrigin,
    pub thumbnail_url: Option<String>,
    pub duration_in_minutes: u32,
}

/// One timestamped piece of a stored transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptChunk {
    pub id: i64,
    pub video_id: String,
    pub timestamp_in_seconds: u32,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Transcript segment as returned by the pipeline, before storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub timestamp_in_seconds: u32,
    pub text: String,
}

/// Output of a transcription run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}
