//! HTTP adapter for the transcription/embedding worker.
//!
//! The worker exposes two JSON endpoints:
//! - `POST {base}/transcribe` `{"youtubeId"}` → `{"text", "segments"}`
//! - `POST {base}/embed` `{"videoId", "content"}` → any 2xx

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::TranscriptionPipeline;
use crate::domain::Transcript;

/// Worker HTTP client
pub struct WorkerClient {
    /// Worker root URL
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeRequest<'a> {
    youtube_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    video_id: &'a str,
    content: &'a str,
}

impl WorkerClient {
    /// Create a worker client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build worker HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build endpoint URL
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = self.endpoint(path);
        debug!(%url, "Calling worker");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach worker endpoint '{}'", path))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Worker '{}' failed with {}: {}", path, status, body.trim());
        }

        Ok(response)
    }
}

#[async_trait]
impl TranscriptionPipeline for WorkerClient {
    fn name(&self) -> &str {
        "worker"
    }

    async fn transcribe(&self, youtube_id: &str) -> Result<Transcript> {
        let response = self
            .post("transcribe", &TranscribeRequest { youtube_id })
            .await?;

        let transcript: Transcript = response
            .json()
            .await
            .context("Failed to parse worker transcript")?;

        if transcript.text.trim().is_empty() {
            anyhow::bail!("Worker returned an empty transcript for {}", youtube_id);
        }

        Ok(transcript)
    }

    async fn embed(&self, video_id: &str, content: &str) -> Result<()> {
        self.post("embed", &EmbedRequest { video_id, content })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let client = WorkerClient::new("http://worker:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint("embed"), "http://worker:9000/embed");
        assert_eq!(client.name(), "worker");
    }

    #[test]
    fn test_request_bodies_are_camel_case() {
        let body = serde_json::to_value(EmbedRequest {
            video_id: "v1",
            content: "text",
        })
        .unwrap();
        assert_eq!(body["videoId"], "v1");

        let body = serde_json::to_value(TranscribeRequest { youtube_id: "yt" }).unwrap();
        assert_eq!(body["youtubeId"], "yt");
    }

    #[test]
    fn test_transcript_parsing_defaults_segments() {
        let transcript: Transcript = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(transcript.text, "hello");
        assert!(transcript.segments.is_empty());

        let transcript: Transcript = serde_json::from_str(
            r#"{"text":"a b","segments":[{"timestampInSeconds":0,"text":"a"},{"timestampInSeconds":4,"text":"b"}]}"#,
        )
        .unwrap();
        assert_eq!(transcript.segments[1].timestamp_in_seconds, 4);
    }
}
