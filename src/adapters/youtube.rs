//! YouTube Data API v3 catalog adapter.
//!
//! Uses four read-only endpoints:
//! - `channels?forHandle=` for the uploads playlist of a channel
//! - `playlists` for title and item count
//! - `playlistItems` for token-paginated listings
//! - `videos` for batched `contentDetails.duration` lookups

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{
    CatalogError, CatalogSource, PlaylistDetails, PlaylistItemsPage, DURATION_BATCH_LIMIT,
    MAX_PAGE_SIZE,
};
use crate::domain::PlaylistEntry;

/// Default API root
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// YouTube Data API client
pub struct YouTubeClient {
    /// API key sent with every request
    api_key: String,
    /// API root, overridable for mocks
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

/// Generic list envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResource {
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistResource {
    snippet: Option<TitleSnippet>,
    content_details: Option<PlaylistContentDetails>,
}

#[derive(Debug, Deserialize)]
struct TitleSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistContentDetails {
    #[serde(default)]
    item_count: u64,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemResource {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    thumbnails: Option<Thumbnails>,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    id: String,
    content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    #[serde(default)]
    duration: String,
}

/// Error envelope returned on non-2xx responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorReason {
    #[serde(default)]
    reason: String,
}

impl Thumbnails {
    fn best_url(self) -> Option<String> {
        self.medium
            .or(self.high)
            .or(self.default)
            .map(|t| t.url)
    }
}

impl From<PlaylistItemResource> for PlaylistEntry {
    fn from(resource: PlaylistItemResource) -> Self {
        let snippet = resource.snippet;
        Self {
            video_id: snippet.resource_id.video_id,
            title: snippet.title,
            description: snippet.description,
            thumbnail_url: snippet.thumbnails.and_then(Thumbnails::best_url),
        }
    }
}

/// Map a failed response to a catalog error
fn classify_error(status: u16, body: &str) -> CatalogError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .map(|b| b.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status));
    let rate_limited = parsed.as_ref().is_some_and(|b| {
        b.error.errors.iter().any(|e| {
            matches!(
                e.reason.as_str(),
                "quotaExceeded" | "rateLimitExceeded" | "userRateLimitExceeded"
            )
        })
    });

    match status {
        404 => CatalogError::NotFound(message),
        429 => CatalogError::RateLimited(message),
        403 if rate_limited => CatalogError::RateLimited(message),
        _ => CatalogError::Api(message),
    }
}

impl YouTubeClient {
    /// Create a client against a custom API root
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build catalog HTTP client")?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build API URL
    fn api_url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let url = self.api_url(resource);
        debug!(resource, "Calling catalog endpoint");

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to call catalog endpoint '{}'", resource))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }

        let parsed = response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse catalog response from '{}'", resource))?;

        Ok(parsed)
    }
}

#[async_trait]
impl CatalogSource for YouTubeClient {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn uploads_playlist_id(&self, channel_handle: &str) -> Result<String, CatalogError> {
        let handle = if channel_handle.starts_with('@') {
            channel_handle.to_string()
        } else {
            format!("@{}", channel_handle)
        };

        let response: ListResponse<ChannelResource> = self
            .get(
                "channels",
                &[("part", "contentDetails"), ("forHandle", handle.as_str())],
            )
            .await?;

        response
            .items
            .into_iter()
            .next()
            .map(|c| c.content_details.related_playlists.uploads)
            .ok_or_else(|| CatalogError::NotFound(format!("channel {}", handle)))
    }

    async fn playlist_details(&self, playlist_id: &str) -> Result<PlaylistDetails, CatalogError> {
        let response: ListResponse<PlaylistResource> = self
            .get(
                "playlists",
                &[("part", "snippet,contentDetails"), ("id", playlist_id)],
            )
            .await?;

        let playlist = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::NotFound(format!("playlist {}", playlist_id)))?;

        Ok(PlaylistDetails {
            title: playlist.snippet.map(|s| s.title),
            item_count: playlist.content_details.map(|d| d.item_count).unwrap_or(0),
        })
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<PlaylistItemsPage, CatalogError> {
        let max_results = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response: ListResponse<PlaylistItemResource> =
            self.get("playlistItems", &query).await?;

        Ok(PlaylistItemsPage {
            entries: response.items.into_iter().map(PlaylistEntry::from).collect(),
            next_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn video_durations(
        &self,
        video_ids: &[String],
    ) -> Result<HashMap<String, String>, CatalogError> {
        if video_ids.is_empty() {
            return Ok(HashMap::new());
        }
        if video_ids.len() > DURATION_BATCH_LIMIT {
            return Err(CatalogError::BatchTooLarge {
                count: video_ids.len(),
                limit: DURATION_BATCH_LIMIT,
            });
        }

        let ids = video_ids.join(",");
        let response: ListResponse<VideoResource> = self
            .get("videos", &[("part", "contentDetails"), ("id", ids.as_str())])
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|v| v.content_details.map(|d| (v.id, d.duration)))
            .collect())
    }
}
