//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vidscribe::adapters::{CatalogError, CatalogSource, PlaylistDetails, PlaylistItemsPage, TranscriptionPipeline};
use vidscribe::core::{Service, Store};
use vidscribe::domain::{CatalogItem, PlaylistEntry, QuotaDefaults, Transcript, TranscriptSegment};

/// In-memory playlist whose tokens encode the next offset
pub struct PagedCatalog {
    pub minutes: Vec<u32>,
    pub listings: AtomicUsize,
    pub duration_lookups: AtomicUsize,
}

impl PagedCatalog {
    /// `count` videos, each `minutes` long
    pub fn uniform(count: usize, minutes: u32) -> Self {
        Self::with_minutes(vec![minutes; count])
    }

    pub fn with_minutes(minutes: Vec<u32>) -> Self {
        Self {
            minutes,
            listings: AtomicUsize::new(0),
            duration_lookups: AtomicUsize::new(0),
        }
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn video_id(index: usize) -> String {
        format!("vid{:04}", index)
    }
}

#[async_trait]
impl CatalogSource for PagedCatalog {
    fn name(&self) -> &str {
        "paged"
    }

    async fn uploads_playlist_id(&self, handle: &str) -> Result<String, CatalogError> {
        Ok(format!("UU{}", handle.trim_start_matches('@')))
    }

    async fn playlist_details(&self, _playlist_id: &str) -> Result<PlaylistDetails, CatalogError> {
        Ok(PlaylistDetails {
            title: Some("Uploads".to_string()),
            item_count: self.minutes.len() as u64,
        })
    }

    async fn list_playlist_items(
        &self,
        _playlist_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<PlaylistItemsPage, CatalogError> {
        self.listings.fetch_add(1, Ordering::SeqCst);

        let offset = match page_token {
            None => 0,
            Some(token) => token
                .strip_prefix("offset:")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| CatalogError::Api(format!("bad token {}", token)))?,
        };
        let end = (offset + max_results as usize).min(self.minutes.len());

        let entries = (offset..end)
            .map(|i| PlaylistEntry {
                video_id: Self::video_id(i),
                title: format!("Video {}", i),
                description: String::new(),
                thumbnail_url: None,
            })
            .collect();

        Ok(PlaylistItemsPage {
            entries,
            next_token: (end < self.minutes.len()).then(|| format!("offset:{}", end)),
        })
    }

    async fn video_durations(
        &self,
        video_ids: &[String],
    ) -> Result<HashMap<String, String>, CatalogError> {
        self.duration_lookups.fetch_add(1, Ordering::SeqCst);

        Ok(video_ids
            .iter()
            .filter_map(|id| {
                let index: usize = id.strip_prefix("vid")?.parse().ok()?;
                let minutes = *self.minutes.get(index)?;
                Some((id.clone(), format!("PT{}M", minutes)))
            })
            .collect())
    }
}

/// Pipeline that fails for chosen ids and counts calls
#[derive(Default)]
pub struct ScriptedPipeline {
    pub failing_transcripts: Mutex<HashSet<String>>,
    pub failing_embeds: Mutex<HashSet<String>>,
    pub transcribe_calls: AtomicUsize,
    pub embed_calls: AtomicUsize,
}

impl ScriptedPipeline {
    pub fn fail_transcript(&self, youtube_id: &str) {
        self.failing_transcripts.lock().unwrap().insert(youtube_id.to_string());
    }

    pub fn heal_transcript(&self, youtube_id: &str) {
        self.failing_transcripts.lock().unwrap().remove(youtube_id);
    }

    pub fn fail_embed(&self, video_id: &str) {
        self.failing_embeds.lock().unwrap().insert(video_id.to_string());
    }

    pub fn heal_embed(&self, video_id: &str) {
        self.failing_embeds.lock().unwrap().remove(video_id);
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcribe_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionPipeline for ScriptedPipeline {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn transcribe(&self, youtube_id: &str) -> anyhow::Result<Transcript> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_transcripts.lock().unwrap().contains(youtube_id) {
            anyhow::bail!("no captions for {}", youtube_id);
        }

        Ok(Transcript {
            text: format!("first words second words of {}", youtube_id),
            segments: vec![
                TranscriptSegment {
                    timestamp_in_seconds: 0,
                    text: "first words".to_string(),
                },
                TranscriptSegment {
                    timestamp_in_seconds: 30,
                    text: format!("second words of {}", youtube_id),
                },
            ],
        })
    }

    async fn embed(&self, video_id: &str, _content: &str) -> anyhow::Result<()> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_embeds.lock().unwrap().contains(video_id) {
            anyhow::bail!("embedding service unavailable");
        }
        Ok(())
    }
}

pub struct Harness {
    pub service: Service,
    pub catalog: Arc<PagedCatalog>,
    pub pipeline: Arc<ScriptedPipeline>,
}

/// Service over an in-memory store with default quotas
pub fn harness(catalog: PagedCatalog, page_size: u32) -> Harness {
    let catalog = Arc::new(catalog);
    let pipeline = Arc::new(ScriptedPipeline::default());
    let service = Service::new(
        catalog.clone(),
        pipeline.clone(),
        Store::open_in_memory().unwrap(),
        QuotaDefaults::default(),
        page_size,
    );

    Harness {
        service,
        catalog,
        pipeline,
    }
}

pub fn item(video_id: &str, minutes: u32) -> CatalogItem {
    CatalogItem {
        video_id: video_id.to_string(),
        title: format!("Video {}", video_id),
        description: String::new(),
        thumbnail_url: None,
        duration_in_minutes: minutes,
    }
}
