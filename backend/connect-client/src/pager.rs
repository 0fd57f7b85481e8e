//! Infinite-scroll paging over a stream of feed pages
//!
//! Pages are zero-based and fetched strictly in order. A page is requested
//! only when the previous one came back full (`next_page` is set), no other
//! request is in flight, and no failed load is waiting to be retried.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::dto::{FeedPageDto, FeedPostDto};
use crate::error::{ClientError, Result};

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<FeedPageDto>;
}

/// Claim on one page fetch, valid until the pager is reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub page: u32,
    generation: u64,
}

pub struct FeedPager<S> {
    source: S,
    /// Bumped on reset; tickets from earlier generations are stale
    generation: u64,
    posts: Vec<FeedPostDto>,
    next_page: Option<u32>,
    in_flight: Option<u32>,
    failed_page: Option<u32>,
    error: Option<ClientError>,
}

impl<S: PageSource> FeedPager<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            generation: 0,
            posts: Vec::new(),
            next_page: Some(0),
            in_flight: None,
            failed_page: None,
            error: None,
        }
    }

    pub fn posts(&self) -> &[FeedPostDto] {
        &self.posts
    }

    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    /// Claim the next page to fetch, if a fetch is allowed right now
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        if self.in_flight.is_some() || self.error.is_some() {
            return None;
        }
        let page = self.next_page?;
        self.in_flight = Some(page);
        Some(LoadTicket {
            page,
            generation: self.generation,
        })
    }

    /// Apply the outcome of the fetch claimed by `ticket`. Results from
    /// before a reset are dropped.
    pub fn complete_load(&mut self, ticket: LoadTicket, result: Result<FeedPageDto>) {
        let page = ticket.page;
        if ticket.generation != self.generation || self.in_flight != Some(page) {
            debug!(page, "Dropping stale page result");
            return;
        }
        self.in_flight = None;

        match result {
            Ok(loaded) => {
                self.posts.extend(loaded.posts);
                self.next_page = loaded.next_page;
                self.failed_page = None;
            }
            Err(e) => {
                warn!(page, error = %e, "Failed to load page");
                self.failed_page = Some(page);
                self.error = Some(e);
            }
        }
    }

    /// Fetch the next page; returns how many posts it added
    pub async fn load_more(&mut self) -> usize {
        let Some(ticket) = self.begin_load() else {
            return 0;
        };
        let before = self.posts.len();
        let result = self.source.fetch_page(ticket.page).await;
        self.complete_load(ticket, result);
        self.posts.len() - before
    }

    /// Clear a failed load and fetch the same page again
    pub async fn retry(&mut self) -> usize {
        if self.error.take().is_none() {
            return 0;
        }
        if let Some(page) = self.failed_page.take() {
            self.next_page = Some(page);
        }
        self.load_more().await
    }

    /// Drop everything loaded and start again from page 0
    pub fn reset(&mut self) {
        self.generation += 1;
        self.posts.clear();
        self.next_page = Some(0);
        self.in_flight = None;
        self.failed_page = None;
        self.error = None;
    }

    /// Reset and load the first page
    pub async fn refresh(&mut self) -> usize {
        self.reset();
        self.load_more().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::PostDto;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    const PAGE_SIZE: usize = 10;

    fn post(caption: String) -> FeedPostDto {
        FeedPostDto {
            post: PostDto {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                image_url: "https://cdn/p.jpg".to_string(),
                caption,
                created_at: Utc::now(),
            },
            profile: None,
            likes_count: 0,
            comments_count: 0,
            is_liked: false,
        }
    }

    /// Serves `total` posts in pages of ten and can be told to fail once
    #[derive(Clone, Default)]
    struct FakeSource {
        total: usize,
        calls: Arc<AtomicUsize>,
        fail_next: Arc<AtomicBool>,
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn fetch_page(&self, page: u32) -> Result<FeedPageDto> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: 500,
                    code: Some("store".to_string()),
                    message: "Database error".to_string(),
                });
            }

            let start = page as usize * PAGE_SIZE;
            let end = (start + PAGE_SIZE).min(self.total);
            let posts: Vec<_> = (start..end).map(|i| post(format!("post {}", i))).collect();
            let next_page = (posts.len() == PAGE_SIZE).then_some(page + 1);
            Ok(FeedPageDto { posts, next_page })
        }
    }

    #[tokio::test]
    async fn test_pages_until_short_page() {
        let source = FakeSource {
            total: 25,
            ..Default::default()
        };
        let mut pager = FeedPager::new(source.clone());

        assert_eq!(pager.load_more().await, 10);
        assert_eq!(pager.load_more().await, 10);
        assert_eq!(pager.load_more().await, 5);
        assert!(!pager.has_more());

        assert_eq!(pager.load_more().await, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(pager.posts()[24].post.caption, "post 24");
    }

    #[tokio::test]
    async fn test_exact_multiple_ends_with_empty_page() {
        let source = FakeSource {
            total: 10,
            ..Default::default()
        };
        let mut pager = FeedPager::new(source.clone());

        assert_eq!(pager.load_more().await, 10);
        assert!(pager.has_more());
        assert_eq!(pager.load_more().await, 0);
        assert!(!pager.has_more());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_second_request_while_in_flight() {
        let mut pager = FeedPager::new(FakeSource::default());

        assert_eq!(pager.begin_load().map(|t| t.page), Some(0));
        assert!(pager.is_loading());
        assert_eq!(pager.begin_load(), None);
    }

    #[test]
    fn test_stale_result_after_reset_is_dropped() {
        let mut pager = FeedPager::new(FakeSource::default());

        let ticket = pager.begin_load().unwrap();
        pager.reset();
        pager.complete_load(
            ticket,
            Ok(FeedPageDto {
                posts: vec![post("old".to_string())],
                next_page: None,
            }),
        );

        assert!(pager.posts().is_empty());
        assert!(pager.has_more());
    }

    #[test]
    fn test_old_page_zero_is_dropped_after_reset_and_new_load() {
        let mut pager = FeedPager::new(FakeSource::default());

        let old = pager.begin_load().unwrap();
        pager.reset();
        let current = pager.begin_load().unwrap();
        assert_eq!(old.page, current.page);

        pager.complete_load(
            old,
            Ok(FeedPageDto {
                posts: vec![post("old".to_string())],
                next_page: Some(1),
            }),
        );
        assert!(pager.posts().is_empty());
        assert!(pager.is_loading());

        pager.complete_load(
            current,
            Ok(FeedPageDto {
                posts: vec![post("new".to_string())],
                next_page: None,
            }),
        );
        assert_eq!(pager.posts()[0].post.caption, "new");
        assert!(!pager.has_more());
    }

    #[tokio::test]
    async fn test_failed_page_blocks_until_retry() {
        let source = FakeSource {
            total: 15,
            ..Default::default()
        };
        let mut pager = FeedPager::new(source.clone());
        pager.load_more().await;

        source.fail_next.store(true, Ordering::SeqCst);
        assert_eq!(pager.load_more().await, 0);
        assert_eq!(pager.error().and_then(|e| e.status()), Some(500));

        // Blocked until retried
        assert_eq!(pager.load_more().await, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        assert_eq!(pager.retry().await, 5);
        assert!(pager.error().is_none());
        assert_eq!(pager.posts().len(), 15);
    }

    #[tokio::test]
    async fn test_refresh_starts_over() {
        let source = FakeSource {
            total: 12,
            ..Default::default()
        };
        let mut pager = FeedPager::new(source);
        pager.load_more().await;
        pager.load_more().await;

        assert_eq!(pager.refresh().await, 10);
        assert_eq!(pager.posts().len(), 10);
        assert!(pager.has_more());
    }
}
