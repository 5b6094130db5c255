//! External catalog entries, prior to selection.

use serde::{Deserialize, Serialize};

/// Raw playlist entry as listed by the catalog, without duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub thumbnail_url: Option<String>,
}

/// A catalog video with its billable duration resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub thumbnail_url: Option<String>,

    /// Whole minutes, rounded up (0 when the catalog reported nothing usable)
    pub duration_in_minutes: u32,
}

impl CatalogItem {
    pub fn from_entry(entry: PlaylistEntry, duration_in_minutes: u32) -> Self {
        Self {
            video_id: entry.video_id,
            title: entry.title,
            description: entry.description,
            thumbnail_url: entry.thumbnail_url,
            duration_in_minutes,
        }
    }

    /// Canonical watch URL
    pub fn url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_entry_keeps_fields() {
        let entry = PlaylistEntry {
            video_id: "abc123".to_string(),
            title: "Intro".to_string(),
            description: "desc".to_string(),
            thumbnail_url: Some("https://i.ytimg.com/vi/abc123/mqdefault.jpg".to_string()),
        };

        let item = CatalogItem::from_entry(entry, 5);
        assert_eq!(item.video_id, "abc123");
        assert_eq!(item.duration_in_minutes, 5);
        assert_eq!(item.url(), "https://www.youtube.com/watch?v=abc123");
    }
}
