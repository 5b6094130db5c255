//! Pagination Integration Tests
//!
//! Forward-only token paging, the per-session page cache, and the stateless
//! page calls on the service.

mod common;

use std::sync::Arc;

use common::{harness, PagedCatalog};
use vidscribe::adapters::CatalogError;
use vidscribe::library::{CatalogPaginator, CatalogRef};

#[tokio::test]
async fn test_pages_are_contiguous_windows() {
    let source = Arc::new(PagedCatalog::uniform(30, 5));
    let mut paginator = CatalogPaginator::new(source.clone(), 7);

    let meta = paginator
        .get_uploads_metadata(&CatalogRef::Channel("@chan".to_string()))
        .await
        .unwrap();
    assert_eq!(meta.uploads_playlist_id, "UUchan");
    assert_eq!(meta.total_count, 30);
    assert_eq!(paginator.total_pages(), 5);

    for page_number in 1..=5u32 {
        let page = paginator.get_page(page_number, None).await.unwrap();
        let start = (page_number as usize - 1) * 7;
        let expected: Vec<String> = (start..(start + 7).min(30))
            .map(PagedCatalog::video_id)
            .collect();
        let actual: Vec<String> = page.items.iter().map(|i| i.video_id.clone()).collect();

        assert_eq!(actual, expected, "page {}", page_number);
        assert!(page.items.iter().all(|i| i.duration_in_minutes == 5));
    }

    assert!(!paginator.can_go_forward(5));
    assert!(paginator.can_go_back(5));
}

#[tokio::test]
async fn test_backward_navigation_hits_cache() {
    let source = Arc::new(PagedCatalog::uniform(45, 3));
    let mut paginator = CatalogPaginator::new(source.clone(), 20);

    paginator
        .get_uploads_metadata(&CatalogRef::Playlist("PL1".to_string()))
        .await
        .unwrap();
    let forward_three = paginator.get_page(3, None).await;
    // page 3's token is unknown until page 2 has been fetched
    assert!(matches!(forward_three, Err(CatalogError::MissingToken { page: 3 })));

    let second = paginator.get_page(2, None).await.unwrap();
    let third = paginator.get_page(3, None).await.unwrap();
    assert_eq!(third.items.len(), 5);
    assert!(third.next_token.is_none());
    let fetched = source.listings();

    let first_again = paginator.get_page(1, None).await.unwrap();
    let second_again = paginator.get_page(2, None).await.unwrap();

    assert_eq!(source.listings(), fetched);
    assert_eq!(second_again, second);
    assert_eq!(first_again.items[0].video_id, PagedCatalog::video_id(0));
    assert_eq!(paginator.cached_pages(), 3);
}

#[tokio::test]
async fn test_new_session_resets_cache() {
    let source = Arc::new(PagedCatalog::uniform(25, 1));
    let mut paginator = CatalogPaginator::new(source.clone(), 10);

    paginator
        .get_uploads_metadata(&CatalogRef::Playlist("PL1".to_string()))
        .await
        .unwrap();
    paginator.get_page(2, None).await.unwrap();
    assert_eq!(paginator.cached_pages(), 2);

    paginator
        .get_uploads_metadata(&CatalogRef::Playlist("PL2".to_string()))
        .await
        .unwrap();
    assert_eq!(paginator.cached_pages(), 1);
    assert_eq!(paginator.playlist_id(), Some("PL2"));
}

#[tokio::test]
async fn test_service_pages_with_caller_token() {
    let h = harness(PagedCatalog::uniform(12, 61), 5);

    let uploads = h
        .service
        .get_uploads_metadata_for_channel("@chan")
        .await
        .unwrap();
    assert_eq!(uploads.total_video_count, 12);
    assert_eq!(uploads.first_page_videos.len(), 5);
    assert!(uploads
        .first_page_videos
        .iter()
        .all(|v| v.duration_in_minutes == 61));

    let token = uploads.next_token.unwrap();
    let page = h
        .service
        .get_next_videos_for_playlist(&uploads.uploads_playlist_id, &token, 2)
        .await
        .unwrap();
    assert_eq!(page.for_page, 2);
    assert_eq!(page.videos[0].video_id, PagedCatalog::video_id(5));

    let last = h
        .service
        .get_next_videos_for_playlist(
            &uploads.uploads_playlist_id,
            page.next_token.as_deref().unwrap(),
            3,
        )
        .await
        .unwrap();
    assert_eq!(last.videos.len(), 2);
    assert!(last.next_token.is_none());
}

#[tokio::test]
async fn test_large_pages_split_duration_lookups() {
    let source = Arc::new(PagedCatalog::uniform(120, 2));
    let mut paginator = CatalogPaginator::new(source.clone(), 500);

    let meta = paginator
        .get_uploads_metadata(&CatalogRef::Playlist("PL1".to_string()))
        .await
        .unwrap();

    // page size clamps to the catalog maximum of 50 ids per call
    assert_eq!(paginator.page_size(), 50);
    assert_eq!(meta.first_page_items.len(), 50);
    assert_eq!(
        source
            .duration_lookups
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}
