//! Request/response surface used by the CLI.
//!
//! Every method is one self-contained contract: catalog calls are stateless
//! (the caller carries tokens), quota and lifecycle calls go through the
//! ledger and the lifecycle controller.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::ledger::{LedgerError, QuotaLedger};
use super::lifecycle::{BatchDispatch, BulkDeleteOutcome, DeleteOutcome, LifecycleError, ProcessOutcome, VideoLifecycle};
use super::selection::QuotaExceeded;
use super::store::Store;
use crate::adapters::{CatalogError, CatalogSource, TranscriptionPipeline, MAX_PAGE_SIZE};
use crate::domain::{CatalogItem, Quota, QuotaDefaults, RetryAction, Video, VideoOrigin};
use crate::library::fetch_page;

/// Errors surfaced to callers of [`Service`]
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    QuotaExceeded(#[from] QuotaExceeded),

    #[error(transparent)]
    Ledger(LedgerError),

    #[error(transparent)]
    Lifecycle(LifecycleError),

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Exceeded {
                requested,
                available,
                ..
            } => ServiceError::QuotaExceeded(QuotaExceeded {
                required_hours: requested,
                available_hours: available,
            }),
            other => ServiceError::Ledger(other),
        }
    }
}

impl From<LifecycleError> for ServiceError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Ledger(ledger) => ledger.into(),
            LifecycleError::QuotaExceeded(exceeded) => ServiceError::QuotaExceeded(exceeded),
            other => ServiceError::Lifecycle(other),
        }
    }
}

/// First page of a channel's uploads
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelUploads {
    pub uploads_playlist_id: String,
    pub playlist_title: Option<String>,
    pub first_page_videos: Vec<CatalogItem>,
    pub next_token: Option<String>,
    pub total_video_count: u64,
}

/// A page fetched with a caller-held token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistPage {
    pub videos: Vec<CatalogItem>,
    pub next_token: Option<String>,
    pub for_page: u32,
}

/// Counts for one transcription request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeSummary {
    /// Videos dispatched to the pipeline
    pub total_attempts: usize,
    pub completed: usize,
    /// Videos left in an error state
    pub failed: usize,
    /// Items dropped before dispatch (already stored or duplicated)
    pub skipped: usize,
    pub hours_debited: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryReport {
    pub success: bool,
    pub action: RetryAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Boundary surface over catalog, ledger and lifecycle
pub struct Service {
    source: Arc<dyn CatalogSource>,
    ledger: QuotaLedger,
    lifecycle: VideoLifecycle,
    page_size: u32,
}

impl Service {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        pipeline: Arc<dyn TranscriptionPipeline>,
        store: Store,
        quota_defaults: QuotaDefaults,
        page_size: u32,
    ) -> Self {
        let ledger = QuotaLedger::new(store.clone(), quota_defaults);
        let lifecycle = VideoLifecycle::new(store, ledger.clone(), pipeline);

        Self {
            source,
            ledger,
            lifecycle,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub fn lifecycle(&self) -> &VideoLifecycle {
        &self.lifecycle
    }

    /// Resolve a channel's uploads playlist and fetch its first page
    #[instrument(skip(self))]
    pub async fn get_uploads_metadata_for_channel(
        &self,
        channel_handle: &str,
    ) -> Result<ChannelUploads, ServiceError> {
        let playlist_id = self.source.uploads_playlist_id(channel_handle).await?;
        self.get_playlist_metadata(&playlist_id).await
    }

    /// Details and first page of any playlist
    #[instrument(skip(self))]
    pub async fn get_playlist_metadata(&self, playlist_id: &str) -> Result<ChannelUploads, ServiceError> {
        let details = self.source.playlist_details(playlist_id).await?;
        let first = fetch_page(self.source.as_ref(), playlist_id, None, self.page_size).await?;

        Ok(ChannelUploads {
            uploads_playlist_id: playlist_id.to_string(),
            playlist_title: details.title,
            first_page_videos: first.items,
            next_token: first.next_token,
            total_video_count: details.item_count,
        })
    }

    /// Fetch the page addressed by `next_token`, labelled `page_number`
    #[instrument(skip(self, next_token))]
    pub async fn get_next_videos_for_playlist(
        &self,
        playlist_id: &str,
        next_token: &str,
        page_number: u32,
    ) -> Result<PlaylistPage, ServiceError> {
        let fetched = fetch_page(
            self.source.as_ref(),
            playlist_id,
            Some(next_token),
            self.page_size,
        )
        .await?;

        Ok(PlaylistPage {
            videos: fetched.items,
            next_token: fetched.next_token,
            for_page: page_number,
        })
    }

    pub fn get_quota(&self, user_email: &str) -> Result<Quota, ServiceError> {
        Ok(self.ledger.get(user_email)?)
    }

    /// Create and process the selected videos.
    ///
    /// The budget is checked and debited before any record exists; an
    /// over-budget request creates nothing. Videos then run `batch_size` at
    /// a time, concurrently within a batch.
    #[instrument(skip(self, selected, origin), fields(selected = selected.len()))]
    pub async fn transcribe_videos(
        &self,
        selected: &[CatalogItem],
        user_email: &str,
        batch_size: usize,
        origin: &VideoOrigin,
    ) -> Result<TranscribeSummary, ServiceError> {
        if batch_size == 0 {
            return Err(ServiceError::InvalidBatchSize);
        }

        let BatchDispatch {
            videos,
            skipped,
            hours,
        } = self.lifecycle.create_batch(selected, user_email, origin)?;
        info!(
            count = videos.len(),
            hours,
            skipped,
            "Dispatching videos for transcription"
        );

        let mut summary = TranscribeSummary {
            skipped,
            hours_debited: hours,
            ..TranscribeSummary::default()
        };

        for batch in videos.chunks(batch_size) {
            let results = join_all(batch.iter().map(|video| self.lifecycle.process(video))).await;

            for (video, result) in batch.iter().zip(results) {
                summary.total_attempts += 1;
                match result {
                    Ok(ProcessOutcome::Completed) => summary.completed += 1,
                    Ok(outcome) => {
                        warn!(video_id = %video.id, status = %outcome.status(), "Video failed");
                        summary.failed += 1;
                    }
                    Err(e) => {
                        warn!(video_id = %video.id, error = %e, "Video processing aborted");
                        summary.failed += 1;
                    }
                }
            }
        }

        info!(
            completed = summary.completed,
            failed = summary.failed,
            "Transcription request finished"
        );
        Ok(summary)
    }

    /// Re-dispatch the failed step of a video
    #[instrument(skip(self))]
    pub async fn retry_video(&self, video_id: &str, user_email: &str) -> Result<RetryReport, ServiceError> {
        let retry = self.lifecycle.retry(video_id, user_email).await?;

        Ok(RetryReport {
            success: retry.outcome.is_success(),
            action: retry.action,
            error: retry.outcome.error().map(str::to_string),
        })
    }

    pub fn list_videos(&self, user_email: &str) -> Result<Vec<Video>, ServiceError> {
        Ok(self.lifecycle.list(user_email)?)
    }

    #[instrument(skip(self))]
    pub fn delete_stored_video(&self, video_id: &str, user_email: &str) -> Result<DeleteOutcome, ServiceError> {
        Ok(self.lifecycle.delete(video_id, user_email)?)
    }

    #[instrument(skip(self))]
    pub fn bulk_delete_stored_videos(
        &self,
        video_ids: &[String],
        user_email: &str,
    ) -> Result<BulkDeleteOutcome, ServiceError> {
        Ok(self.lifecycle.bulk_delete(video_ids, user_email)?)
    }
}
