//! Session-scoped, page-indexed view over a token-paginated catalog.
//!
//! The catalog only hands out forward cursors: the token for page N+1 is
//! learned from page N's response (page 1 needs none). Every fetched page and
//! every learned token is kept in a [`PageArena`] for the life of the session,
//! so walking backwards never touches the network.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::adapters::{CatalogError, CatalogSource, DURATION_BATCH_LIMIT, MAX_PAGE_SIZE};
use crate::domain::{duration_to_minutes, CatalogItem, PlaylistEntry};

/// Items per page when nothing else is configured
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// What to browse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogRef {
    /// A channel handle; browsing covers its uploads playlist
    Channel(String),

    /// A playlist id
    Playlist(String),
}

impl CatalogRef {
    /// `@handle` is a channel, anything else a playlist id
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with('@') {
            CatalogRef::Channel(value.to_string())
        } else {
            CatalogRef::Playlist(value.to_string())
        }
    }
}

/// Result of the bootstrap call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadsMetadata {
    pub uploads_playlist_id: String,
    pub playlist_title: Option<String>,
    pub first_page_items: Vec<CatalogItem>,
    pub next_token: Option<String>,
    pub total_count: u64,
}

/// One page of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    pub page_number: u32,
    pub items: Vec<CatalogItem>,
    pub next_token: Option<String>,
}

/// Items and continuation of a single listing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub items: Vec<CatalogItem>,
    pub next_token: Option<String>,
}

/// Page-number keyed storage for items and tokens. Never evicts.
#[derive(Debug, Default)]
pub struct PageArena {
    pages: BTreeMap<u32, Vec<CatalogItem>>,
    tokens: BTreeMap<u32, String>,
}

impl PageArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self, page_number: u32) -> Option<&[CatalogItem]> {
        self.pages.get(&page_number).map(Vec::as_slice)
    }

    /// Token that fetches `page_number`
    pub fn token(&self, page_number: u32) -> Option<&str> {
        self.tokens.get(&page_number).map(String::as_str)
    }

    pub fn set_token(&mut self, page_number: u32, token: impl Into<String>) {
        self.tokens.insert(page_number, token.into());
    }

    /// Store a page and file its continuation under the following page
    pub fn store(&mut self, page_number: u32, items: Vec<CatalogItem>, next_token: Option<String>) {
        self.pages.insert(page_number, items);
        if let (Some(token), Some(next)) = (next_token, page_number.checked_add(1)) {
            self.tokens.insert(next, token);
        }
    }

    pub fn contains(&self, page_number: u32) -> bool {
        self.pages.contains_key(&page_number)
    }

    /// Number of cached pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
        self.tokens.clear();
    }
}

/// Resolve durations for playlist entries, at most
/// [`DURATION_BATCH_LIMIT`] ids per lookup
pub async fn attach_durations(
    source: &dyn CatalogSource,
    entries: Vec<PlaylistEntry>,
) -> Result<Vec<CatalogItem>, CatalogError> {
    let ids: Vec<String> = entries.iter().map(|e| e.video_id.clone()).collect();

    let mut durations: HashMap<String, String> = HashMap::with_capacity(ids.len());
    for batch in ids.chunks(DURATION_BATCH_LIMIT) {
        durations.extend(source.video_durations(batch).await?);
    }

    Ok(entries
        .into_iter()
        .map(|entry| {
            let minutes = durations
                .get(&entry.video_id)
                .map(|d| duration_to_minutes(d))
                .unwrap_or(0);
            CatalogItem::from_entry(entry, minutes)
        })
        .collect())
}

/// Fetch one page from the catalog with durations merged in. Caches nothing.
pub async fn fetch_page(
    source: &dyn CatalogSource,
    playlist_id: &str,
    token: Option<&str>,
    page_size: u32,
) -> Result<FetchedPage, CatalogError> {
    let listing = source
        .list_playlist_items(playlist_id, token, page_size)
        .await?;
    let items = attach_durations(source, listing.entries).await?;

    Ok(FetchedPage {
        items,
        next_token: listing.next_token,
    })
}

/// Cached browser over one playlist at a time
pub struct CatalogPaginator {
    source: Arc<dyn CatalogSource>,
    page_size: u32,
    playlist_id: Option<String>,
    total_count: u64,
    arena: PageArena,
}

impl CatalogPaginator {
    /// Create a paginator; `page_size` is clamped to the catalog maximum
    pub fn new(source: Arc<dyn CatalogSource>, page_size: u32) -> Self {
        Self {
            source,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            playlist_id: None,
            total_count: 0,
            arena: PageArena::new(),
        }
    }

    /// Bootstrap a browsing session: seeds page 1 and the token for page 2
    #[instrument(skip(self))]
    pub async fn get_uploads_metadata(
        &mut self,
        catalog_ref: &CatalogRef,
    ) -> Result<UploadsMetadata, CatalogError> {
        let playlist_id = match catalog_ref {
            CatalogRef::Channel(handle) => self.source.uploads_playlist_id(handle).await?,
            CatalogRef::Playlist(id) => id.clone(),
        };

        let details = self.source.playlist_details(&playlist_id).await?;
        let first = fetch_page(self.source.as_ref(), &playlist_id, None, self.page_size).await?;

        // Only replace session state once every call succeeded
        self.arena.clear();
        self.arena
            .store(1, first.items.clone(), first.next_token.clone());
        self.playlist_id = Some(playlist_id.clone());
        self.total_count = details.item_count;

        info!(
            playlist_id = %playlist_id,
            total = details.item_count,
            pages = self.total_pages(),
            "Catalog session started"
        );

        Ok(UploadsMetadata {
            uploads_playlist_id: playlist_id,
            playlist_title: details.title,
            first_page_items: first.items,
            next_token: first.next_token,
            total_count: details.item_count,
        })
    }

    /// Return a page, from cache when possible
    ///
    /// `known_token` overrides the cached token for an uncached page.
    pub async fn get_page(
        &mut self,
        page_number: u32,
        known_token: Option<&str>,
    ) -> Result<CatalogPage, CatalogError> {
        let next_page = match page_number.checked_add(1) {
            Some(next) if page_number > 0 => next,
            _ => return Err(CatalogError::InvalidPage(page_number)),
        };
        let playlist_id = self
            .playlist_id
            .clone()
            .ok_or(CatalogError::NotBootstrapped)?;

        if let Some(items) = self.arena.items(page_number) {
            debug!(page = page_number, "Serving catalog page from cache");
            return Ok(CatalogPage {
                page_number,
                items: items.to_vec(),
                next_token: self.arena.token(next_page).map(str::to_string),
            });
        }

        let token = known_token
            .map(str::to_string)
            .or_else(|| self.arena.token(page_number).map(str::to_string));
        if token.is_none() && page_number > 1 {
            return Err(CatalogError::MissingToken { page: page_number });
        }

        debug!(page = page_number, "Fetching catalog page");
        let fetched = fetch_page(
            self.source.as_ref(),
            &playlist_id,
            token.as_deref(),
            self.page_size,
        )
        .await?;

        if let Some(token) = token {
            self.arena.set_token(page_number, token);
        }
        self.arena
            .store(page_number, fetched.items.clone(), fetched.next_token.clone());

        Ok(CatalogPage {
            page_number,
            items: fetched.items,
            next_token: fetched.next_token,
        })
    }

    /// `ceil(total_count / page_size)`
    pub fn total_pages(&self) -> u32 {
        let pages = self.total_count.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn can_go_forward(&self, current_page: u32) -> bool {
        let Some(next) = current_page.checked_add(1) else {
            return false;
        };
        self.arena.token(next).is_some()
            || self.arena.contains(next)
            || current_page < self.total_pages()
    }

    pub fn can_go_back(&self, current_page: u32) -> bool {
        current_page > 1
    }

    pub fn is_cached(&self, page_number: u32) -> bool {
        self.arena.contains(page_number)
    }

    pub fn cached_pages(&self) -> usize {
        self.arena.len()
    }

    pub fn playlist_id(&self) -> Option<&str> {
        self.playlist_id.as_deref()
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}
