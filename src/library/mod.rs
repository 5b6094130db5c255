//! Browsing the external video catalog.
//!
//! The catalog is read page by page through a [`CatalogSource`]. Pages and
//! continuation tokens are cached per browsing session so that back/forward
//! navigation never re-fetches.
//!
//! ```text
//! get_uploads_metadata ──► page 1 + token(2)
//! get_page(2, token(2)) ──► page 2 + token(3)
//! get_page(1)           ──► cache
//! ```
//!
//! [`CatalogSource`]: crate::adapters::CatalogSource

pub mod paginator;

pub use paginator::{
    attach_durations, fetch_page, CatalogPage, CatalogPaginator, CatalogRef, FetchedPage,
    PageArena, UploadsMetadata, DEFAULT_PAGE_SIZE,
};
