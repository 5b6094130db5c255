//! Stored-video lifecycle: create, process, retry, delete.
//!
//! Status moves are compare-and-set writes validated against
//! [`VideoStatus::allowed_transitions`]. A write that finds the row in an
//! unexpected state fails with [`LifecycleError::Conflict`] and changes
//! nothing.
//!
//! ```text
//! PENDING ──transcribe ok──▶ COMPLETED ──embed fails──▶ EMBEDDING_ERROR
//!    │                          ▲  ▲                         │
//!    └─transcribe fails─▶ TRANSCRIBE_ERROR                   └─retry embed─┘
//!                             └─retry (claims PENDING)─┘
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::ledger::{LedgerError, QuotaLedger};
use super::selection::{check_budget, QuotaExceeded};
use super::store::{self, Store, StoreError};
use crate::adapters::TranscriptionPipeline;
use crate::domain::{
    CatalogItem, NewVideo, RetryAction, Transcript, TranscriptChunk, Video, VideoOrigin,
    VideoStatus,
};

/// Errors raised by lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Video {video_id} does not belong to {user}")]
    NotOwned { video_id: String, user: String },

    #[error("Video {0} is already stored by another user")]
    AlreadyExists(String),

    #[error("Invalid status transition: {from} → {to}")]
    InvalidTransition { from: VideoStatus, to: VideoStatus },

    #[error("Video {video_id} is {status}; only failed videos can be retried")]
    NotRetryable { video_id: String, status: VideoStatus },

    #[error("Video {0} changed status concurrently")]
    Conflict(String),

    #[error(transparent)]
    QuotaExceeded(#[from] QuotaExceeded),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Where a processing run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Completed,
    TranscribeFailed(String),
    EmbeddingFailed(String),
}

impl ProcessOutcome {
    /// Status the video was left in
    pub fn status(&self) -> VideoStatus {
        match self {
            ProcessOutcome::Completed => VideoStatus::Completed,
            ProcessOutcome::TranscribeFailed(_) => VideoStatus::TranscribeError,
            ProcessOutcome::EmbeddingFailed(_) => VideoStatus::EmbeddingError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Completed)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ProcessOutcome::Completed => None,
            ProcessOutcome::TranscribeFailed(e) | ProcessOutcome::EmbeddingFailed(e) => Some(e),
        }
    }
}

/// Result of a retry dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
    pub video_id: String,
    pub action: RetryAction,
    pub outcome: ProcessOutcome,
}

/// Records created by one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDispatch {
    pub videos: Vec<Video>,
    /// Items dropped because they were repeated or already stored
    pub skipped: usize,
    /// Video-hours debited for `videos`
    pub hours: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// Video-hours credited back to the owner
    pub quota_restored: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteOutcome {
    pub deleted_count: usize,
    pub quota_restored: u32,
}

/// Owns stored videos and drives them through the pipeline
#[derive(Clone)]
pub struct VideoLifecycle {
    store: Store,
    ledger: QuotaLedger,
    pipeline: Arc<dyn TranscriptionPipeline>,
}

impl VideoLifecycle {
    pub fn new(store: Store, ledger: QuotaLedger, pipeline: Arc<dyn TranscriptionPipeline>) -> Self {
        Self {
            store,
            ledger,
            pipeline,
        }
    }

    /// Store a `PENDING` record for `item`. Creating a video the user
    /// already owns returns the existing record. Consumes no quota.
    #[instrument(skip(self, item, origin), fields(youtube_id = %item.video_id))]
    pub fn create(
        &self,
        item: &CatalogItem,
        user_email: &str,
        origin: &VideoOrigin,
    ) -> Result<Video, LifecycleError> {
        self.store
            .transaction(|tx| create_within(tx, item, user_email, origin))
    }

    /// Create records for every item not stored yet and debit their hours,
    /// all in one transaction. Repeated ids and videos already stored by
    /// anyone are skipped; a short budget creates nothing.
    #[instrument(skip(self, items, origin), fields(count = items.len()))]
    pub fn create_batch(
        &self,
        items: &[CatalogItem],
        user_email: &str,
        origin: &VideoOrigin,
    ) -> Result<BatchDispatch, LifecycleError> {
        self.store.transaction(|tx| {
            let mut seen = HashSet::new();
            let mut fresh = Vec::new();
            for item in items {
                if !seen.insert(item.video_id.as_str()) {
                    continue;
                }
                match store::select_video_by_youtube_id(tx, &item.video_id)? {
                    Some(existing) if !existing.is_owned_by(user_email) => {
                        warn!(youtube_id = %item.video_id, "Video stored by another user, skipping");
                    }
                    Some(_) => {}
                    None => fresh.push(item),
                }
            }

            let total_minutes = fresh
                .iter()
                .fold(0u32, |acc, item| acc.saturating_add(item.duration_in_minutes));
            let quota = self.ledger.get_within(tx, user_email)?;
            let hours = check_budget(total_minutes, quota.video_hours_left)?;
            self.ledger.debit_within(tx, user_email, hours)?;

            let videos = fresh
                .into_iter()
                .map(|item| create_within(tx, item, user_email, origin))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(BatchDispatch {
                skipped: items.len() - videos.len(),
                videos,
                hours,
            })
        })
    }

    /// A video owned by `user_email`
    pub fn get(&self, video_id: &str, user_email: &str) -> Result<Video, LifecycleError> {
        let video = self
            .store
            .read(|conn| store::select_video(conn, video_id))?
            .ok_or_else(|| LifecycleError::NotFound(video_id.to_string()))?;
        ensure_owned(&video, user_email)?;
        Ok(video)
    }

    /// The user's record for a catalog video, if any
    pub fn find_by_youtube_id(&self, youtube_id: &str) -> Result<Option<Video>, LifecycleError> {
        Ok(self
            .store
            .read(|conn| store::select_video_by_youtube_id(conn, youtube_id))?)
    }

    /// All videos of a user, newest first
    pub fn list(&self, user_email: &str) -> Result<Vec<Video>, LifecycleError> {
        Ok(self
            .store
            .read(|conn| store::select_videos_for_user(conn, user_email))?)
    }

    /// Transcript chunks of an owned video, in playback order
    pub fn chunks(&self, video_id: &str, user_email: &str) -> Result<Vec<TranscriptChunk>, LifecycleError> {
        self.get(video_id, user_email)?;
        Ok(self.store.read(|conn| store::select_chunks(conn, video_id))?)
    }

    /// Transcribe then embed a `PENDING` video
    #[instrument(skip(self, video), fields(video_id = %video.id, youtube_id = %video.youtube_id))]
    pub async fn process(&self, video: &Video) -> Result<ProcessOutcome, LifecycleError> {
        if video.status != VideoStatus::Pending {
            return Err(LifecycleError::InvalidTransition {
                from: video.status,
                to: VideoStatus::Completed,
            });
        }

        let transcript = match self.pipeline.transcribe(&video.youtube_id).await {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!(error = %e, "Transcription failed");
                self.transition(&video.id, VideoStatus::Pending, VideoStatus::TranscribeError)?;
                return Ok(ProcessOutcome::TranscribeFailed(format!("{:#}", e)));
            }
        };

        self.save_transcript(&video.id, &transcript)?;
        self.embed_from(&video.id, &transcript.text, VideoStatus::Completed)
            .await
    }

    /// Re-dispatch the failed step of an errored video
    #[instrument(skip(self))]
    pub async fn retry(&self, video_id: &str, user_email: &str) -> Result<RetryOutcome, LifecycleError> {
        let video = self.get(video_id, user_email)?;
        self.retry_from(video).await
    }

    /// Retry from a previously read snapshot of the row
    async fn retry_from(&self, video: Video) -> Result<RetryOutcome, LifecycleError> {
        let action = video
            .status
            .retry_action()
            .ok_or_else(|| LifecycleError::NotRetryable {
                video_id: video.id.clone(),
                status: video.status,
            })?;

        info!(%action, video_id = %video.id, "Retrying video");
        let video_id = video.id.clone();
        let outcome = match action {
            RetryAction::Transcribe => {
                // Claim the row so a parallel retry cannot run twice
                self.transition(&video.id, VideoStatus::TranscribeError, VideoStatus::Pending)?;
                let claimed = Video {
                    status: VideoStatus::Pending,
                    ..video
                };
                self.process(&claimed).await?
            }
            RetryAction::Embed => {
                self.embed_from(&video.id, &video.content, VideoStatus::EmbeddingError)
                    .await?
            }
        };

        Ok(RetryOutcome {
            video_id,
            action,
            outcome,
        })
    }

    /// Delete one owned video, refunding its hours when it was completed
    pub fn delete(&self, video_id: &str, user_email: &str) -> Result<DeleteOutcome, LifecycleError> {
        let outcome = self.bulk_delete(&[video_id.to_string()], user_email)?;
        Ok(DeleteOutcome {
            quota_restored: outcome.quota_restored,
        })
    }

    /// Delete several videos in one transaction. Every id must exist and
    /// belong to the user; otherwise nothing is deleted or refunded.
    #[instrument(skip(self, video_ids), fields(count = video_ids.len()))]
    pub fn bulk_delete(
        &self,
        video_ids: &[String],
        user_email: &str,
    ) -> Result<BulkDeleteOutcome, LifecycleError> {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = video_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        if unique.is_empty() {
            return Ok(BulkDeleteOutcome::default());
        }

        let outcome = self.store.transaction(|tx| {
            let mut videos = Vec::with_capacity(unique.len());
            for id in &unique {
                let video = store::select_video(tx, id)?
                    .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;
                ensure_owned(&video, user_email)?;
                videos.push(video);
            }

            let quota_restored: u32 = videos.iter().map(Video::refund_hours).sum();
            for video in &videos {
                store::delete_video(tx, &video.id)?;
            }
            self.ledger.credit_within(tx, user_email, quota_restored)?;

            Ok::<_, LifecycleError>(BulkDeleteOutcome {
                deleted_count: videos.len(),
                quota_restored,
            })
        })?;

        info!(
            deleted = outcome.deleted_count,
            restored = outcome.quota_restored,
            "Deleted videos"
        );
        Ok(outcome)
    }

    fn transition(&self, video_id: &str, from: VideoStatus, to: VideoStatus) -> Result<(), LifecycleError> {
        if !from.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition { from, to });
        }

        let moved = self
            .store
            .transaction(|tx| store::update_status_if(tx, video_id, from, to, Utc::now()))?;
        if !moved {
            return Err(LifecycleError::Conflict(video_id.to_string()));
        }
        Ok(())
    }

    fn save_transcript(&self, video_id: &str, transcript: &Transcript) -> Result<(), LifecycleError> {
        self.store.transaction(|tx| {
            let now = Utc::now();
            // Status first: a row deleted mid-flight must not get orphan chunks
            if !store::update_status_if(tx, video_id, VideoStatus::Pending, VideoStatus::Completed, now)? {
                return Err(LifecycleError::Conflict(video_id.to_string()));
            }
            store::store_transcript(tx, video_id, &transcript.text, &transcript.segments, now)?;
            Ok(())
        })
    }

    async fn embed_from(
        &self,
        video_id: &str,
        content: &str,
        from: VideoStatus,
    ) -> Result<ProcessOutcome, LifecycleError> {
        match self.pipeline.embed(video_id, content).await {
            Ok(()) => {
                if from != VideoStatus::Completed {
                    self.transition(video_id, from, VideoStatus::Completed)?;
                }
                info!(video_id, "Video completed");
                Ok(ProcessOutcome::Completed)
            }
            Err(e) => {
                warn!(video_id, error = %e, "Embedding failed");
                self.transition(video_id, from, VideoStatus::EmbeddingError)?;
                Ok(ProcessOutcome::EmbeddingFailed(format!("{:#}", e)))
            }
        }
    }
}

fn ensure_owned(video: &Video, user_email: &str) -> Result<(), LifecycleError> {
    if !video.is_owned_by(user_email) {
        return Err(LifecycleError::NotOwned {
            video_id: video.id.clone(),
            user: user_email.to_string(),
        });
    }
    Ok(())
}

fn create_within(
    conn: &Connection,
    item: &CatalogItem,
    user_email: &str,
    origin: &VideoOrigin,
) -> Result<Video, LifecycleError> {
    if let Some(existing) = store::select_video_by_youtube_id(conn, &item.video_id)? {
        if existing.is_owned_by(user_email) {
            return Ok(existing);
        }
        return Err(LifecycleError::AlreadyExists(item.video_id.clone()));
    }

    let new_video = NewVideo {
        youtube_id: item.video_id.clone(),
        user_email: user_email.to_string(),
        title: item.title.clone(),
        origin: origin.clone(),
        thumbnail_url: item.thumbnail_url.clone(),
        duration_in_minutes: item.duration_in_minutes,
    };
    let id = Uuid::new_v4().to_string();
    Ok(store::insert_video(conn, &id, &new_video, Utc::now())?)
}
