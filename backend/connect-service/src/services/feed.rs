/// Feed and explore assembly
///
/// A page is one ordered, sliced post selection followed by per-post
/// augmentation: like count, comment count, whether the viewer liked it, and
/// the author's profile summary. The four lookups of one post are awaited
/// together and all posts of a page are augmented concurrently, so a page of
/// `n` posts costs one selection plus up to `4n` store round trips.
///
/// Any failed lookup fails the whole page.
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::cache::{self, CacheTag, Lookup, QueryKey, SharedCache};
use crate::db::{SocialStore, StoreResult};
use crate::error::Result;
use crate::metrics::feed::{
    FEED_ASSEMBLY_DURATION_SECONDS, FEED_AUGMENT_LOOKUPS, FEED_PAGES_TOTAL,
};
use crate::models::{FeedPage, FeedPost, Post, RowRange};

/// Posts per page
pub const PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Feed,
    Explore,
    UserPosts,
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::Feed => "feed",
            Mode::Explore => "explore",
            Mode::UserPosts => "user_posts",
        }
    }

    fn with_profile(&self) -> bool {
        !matches!(self, Mode::UserPosts)
    }
}

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn SocialStore>,
    cache: SharedCache,
}

impl FeedService {
    pub fn new(store: Arc<dyn SocialStore>, cache: SharedCache) -> Self {
        Self { store, cache }
    }

    /// Page `page` of posts by the viewer and everyone the viewer follows.
    ///
    /// Without a viewer the page is empty and the store is not touched.
    pub async fn feed_page(&self, viewer: Option<Uuid>, page: u32) -> Result<FeedPage> {
        let Some(viewer_id) = viewer else {
            return Ok(FeedPage::empty());
        };

        let key = QueryKey::FeedPage {
            viewer: viewer_id,
            page,
        };
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let started = Instant::now();
        let result = async {
            let mut authors = self.store.following_ids(viewer_id).await?;
            authors.push(viewer_id);

            let posts = self
                .store
                .select_posts(Some(&authors), RowRange::page(page, PAGE_SIZE))
                .await?;
            self.assemble(posts, viewer, page, Mode::Feed).await
        }
        .await;

        let page_result = finish(Mode::Feed, started, result)?;
        let mut tags = vec![CacheTag::Feeds, CacheTag::Feed(viewer_id)];
        tags.extend(post_tags(&page_result.posts));
        cache::store(&self.cache, token, key, tags, &page_result);

        Ok(page_result)
    }

    /// Page `page` of all posts; the viewer only affects `is_liked`.
    pub async fn explore_page(&self, viewer: Option<Uuid>, page: u32) -> Result<FeedPage> {
        let key = QueryKey::ExplorePage { viewer, page };
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let started = Instant::now();
        let result = async {
            let posts = self
                .store
                .select_posts(None, RowRange::page(page, PAGE_SIZE))
                .await?;
            self.assemble(posts, viewer, page, Mode::Explore).await
        }
        .await;

        let page_result = finish(Mode::Explore, started, result)?;
        let mut tags = vec![CacheTag::Explore];
        tags.extend(post_tags(&page_result.posts));
        cache::store(&self.cache, token, key, tags, &page_result);

        Ok(page_result)
    }

    /// Every post of `user_id`, newest first, without author profiles
    pub async fn user_posts(&self, user_id: Uuid, viewer: Option<Uuid>) -> Result<Vec<FeedPost>> {
        let key = QueryKey::UserPosts { user_id, viewer };
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let started = Instant::now();
        let result = async {
            let posts = self.store.posts_by_user(user_id).await?;
            self.augment_all(posts, viewer, Mode::UserPosts).await
        }
        .await;

        let posts = finish(Mode::UserPosts, started, result)?;
        let mut tags = vec![CacheTag::UserPosts(user_id)];
        tags.extend(posts.iter().map(|p| CacheTag::Post(p.post.id)));
        cache::store(&self.cache, token, key, tags, &posts);

        Ok(posts)
    }

    /// Augment a single post, author profile included
    pub async fn augment_post(&self, post: Post, viewer: Option<Uuid>) -> Result<FeedPost> {
        Ok(self.augment(post, viewer, true).await?)
    }

    async fn assemble(
        &self,
        posts: Vec<Post>,
        viewer: Option<Uuid>,
        page: u32,
        mode: Mode,
    ) -> StoreResult<FeedPage> {
        let full_page = posts.len() == PAGE_SIZE as usize;
        let posts = self.augment_all(posts, viewer, mode).await?;

        Ok(FeedPage {
            posts,
            next_page: full_page.then_some(page + 1),
        })
    }

    async fn augment_all(
        &self,
        posts: Vec<Post>,
        viewer: Option<Uuid>,
        mode: Mode,
    ) -> StoreResult<Vec<FeedPost>> {
        let per_post = 2 + usize::from(viewer.is_some()) + usize::from(mode.with_profile());
        FEED_AUGMENT_LOOKUPS
            .with_label_values(&[mode.as_str()])
            .observe((posts.len() * per_post) as f64);

        try_join_all(
            posts
                .into_iter()
                .map(|post| self.augment(post, viewer, mode.with_profile())),
        )
        .await
    }

    async fn augment(
        &self,
        post: Post,
        viewer: Option<Uuid>,
        with_profile: bool,
    ) -> StoreResult<FeedPost> {
        let post_id = post.id;
        let author = post.user_id;

        let liked = async {
            match viewer {
                Some(viewer_id) => self.store.has_liked(viewer_id, post_id).await,
                None => Ok(false),
            }
        };
        let profile = async {
            if with_profile {
                self.store.profile_summary(author).await
            } else {
                Ok(None)
            }
        };

        let (likes_count, comments_count, is_liked, profile) = tokio::try_join!(
            self.store.count_likes(post_id),
            self.store.count_comments(post_id),
            liked,
            profile,
        )?;

        Ok(FeedPost {
            post,
            profile,
            likes_count,
            comments_count,
            is_liked,
        })
    }
}

fn finish<T>(mode: Mode, started: Instant, result: StoreResult<T>) -> Result<T> {
    FEED_ASSEMBLY_DURATION_SECONDS
        .with_label_values(&[mode.as_str()])
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(value) => {
            FEED_PAGES_TOTAL.with_label_values(&[mode.as_str(), "ok"]).inc();
            Ok(value)
        }
        Err(e) => {
            tracing::error!(mode = mode.as_str(), error = %e, "page assembly failed");
            FEED_PAGES_TOTAL.with_label_values(&[mode.as_str(), "error"]).inc();
            Err(e.into())
        }
    }
}

/// `Post` and author `Profile` tags for every post on a page
pub(crate) fn post_tags(posts: &[FeedPost]) -> impl Iterator<Item = CacheTag> + '_ {
    posts
        .iter()
        .flat_map(|p| [CacheTag::Post(p.post.id), CacheTag::Profile(p.post.user_id)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::new_shared_cache;
    use crate::db::MemorySocialStore;
    use crate::models::{NewProfile, ProfileChanges};
    use crate::services::AppServices;
    use media_storage::MemoryObjectStore;
    use std::time::Duration;

    fn service(store: &MemorySocialStore) -> FeedService {
        FeedService::new(Arc::new(store.clone()), new_shared_cache(Duration::ZERO))
    }

    fn cached_services(store: &MemorySocialStore) -> AppServices {
        AppServices::new(
            Arc::new(store.clone()),
            Arc::new(MemoryObjectStore::default()),
            new_shared_cache(Duration::from_secs(60)),
        )
    }

    async fn profile(store: &MemorySocialStore, user_id: Uuid, username: &str) {
        store
            .insert_profile(&NewProfile {
                user_id,
                username: username.to_string(),
                name: username.to_uppercase(),
                bio: String::new(),
                avatar_url: String::new(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_feed_without_viewer_is_empty_and_free() {
        let store = MemorySocialStore::new();
        let feed = service(&store);

        let page = feed.feed_page(None, 0).await.unwrap();
        assert!(page.posts.is_empty());
        assert_eq!(page.next_page, None);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_feed_includes_self_and_followees_in_order() {
        let store = MemorySocialStore::new();
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for (id, name) in [(a, "a"), (b, "b"), (c, "c"), (d, "d")] {
            profile(&store, id, name).await;
        }
        store.insert_follow(a, b).await.unwrap();
        store.insert_follow(a, c).await.unwrap();

        let pb = store.insert_post(b, "b.jpg", "t1").await.unwrap();
        let pc = store.insert_post(c, "c.jpg", "t2").await.unwrap();
        store.insert_post(d, "d.jpg", "stranger").await.unwrap();
        let pa = store.insert_post(a, "a.jpg", "t3").await.unwrap();

        let page = service(&store).feed_page(Some(a), 0).await.unwrap();
        let ids: Vec<Uuid> = page.posts.iter().map(|p| p.post.id).collect();
        assert_eq!(ids, vec![pa.id, pc.id, pb.id]);
        assert_eq!(page.next_page, None);
        assert_eq!(page.posts[0].profile.as_ref().unwrap().username, "a");
    }

    #[tokio::test]
    async fn test_full_page_points_to_next_page() {
        let store = MemorySocialStore::new();
        let author = Uuid::new_v4();
        for i in 0..PAGE_SIZE {
            store.insert_post(author, "p.jpg", &i.to_string()).await.unwrap();
        }

        let feed = service(&store);
        let first = feed.explore_page(None, 0).await.unwrap();
        assert_eq!(first.posts.len(), PAGE_SIZE as usize);
        assert_eq!(first.next_page, Some(1));

        let second = feed.explore_page(None, 1).await.unwrap();
        assert!(second.posts.is_empty());
        assert_eq!(second.next_page, None);
    }

    #[tokio::test]
    async fn test_explore_without_viewer_skips_like_lookup() {
        let store = MemorySocialStore::new();
        let author = Uuid::new_v4();
        store.insert_post(author, "p.jpg", "x").await.unwrap();
        store.fail_on("has_liked");

        let page = service(&store).explore_page(None, 0).await.unwrap();
        assert!(!page.posts[0].is_liked);
        assert!(page.posts[0].profile.is_none());
    }

    #[tokio::test]
    async fn test_single_failed_lookup_fails_page() {
        let store = MemorySocialStore::new();
        let viewer = Uuid::new_v4();
        store.insert_post(viewer, "p.jpg", "x").await.unwrap();
        store.fail_on("count_comments");

        assert!(service(&store).feed_page(Some(viewer), 0).await.is_err());
    }

    #[tokio::test]
    async fn test_user_posts_have_no_profile() {
        let store = MemorySocialStore::new();
        let user = Uuid::new_v4();
        profile(&store, user, "grid").await;
        store.insert_post(user, "1.jpg", "one").await.unwrap();
        store.insert_post(user, "2.jpg", "two").await.unwrap();

        let posts = service(&store).user_posts(user, None).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].post.caption, "two");
        assert!(posts.iter().all(|p| p.profile.is_none()));
    }

    #[tokio::test]
    async fn test_cached_pages_refresh_after_mutations() {
        let store = MemorySocialStore::new();
        let app = cached_services(&store);
        let (viewer, author) = (Uuid::new_v4(), Uuid::new_v4());
        profile(&store, viewer, "viewer").await;
        profile(&store, author, "author").await;
        let post = store.insert_post(author, "p.jpg", "x").await.unwrap();

        app.feed.explore_page(Some(viewer), 0).await.unwrap();
        let calls = store.calls();
        app.feed.explore_page(Some(viewer), 0).await.unwrap();
        assert_eq!(store.calls(), calls);

        app.likes.like(Some(viewer), post.id).await.unwrap();
        let page = app.feed.explore_page(Some(viewer), 0).await.unwrap();
        assert_eq!(page.posts[0].likes_count, 1);
        assert!(page.posts[0].is_liked);

        app.comments.add(Some(viewer), post.id, "nice").await.unwrap();
        let page = app.feed.explore_page(Some(viewer), 0).await.unwrap();
        assert_eq!(page.posts[0].comments_count, 1);

        assert!(app.feed.feed_page(Some(viewer), 0).await.unwrap().posts.is_empty());
        app.follows.follow(Some(viewer), author).await.unwrap();
        let page = app.feed.feed_page(Some(viewer), 0).await.unwrap();
        assert_eq!(page.posts.len(), 1);

        app.profiles
            .update(
                Some(author),
                ProfileChanges {
                    username: Some("renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let page = app.feed.feed_page(Some(viewer), 0).await.unwrap();
        assert_eq!(page.posts[0].profile.as_ref().unwrap().username, "renamed");
    }

    #[tokio::test]
    async fn test_like_during_page_assembly_is_not_hidden_by_cache() {
        let store = MemorySocialStore::new();
        let app = cached_services(&store);
        let (author, fan) = (Uuid::new_v4(), Uuid::new_v4());
        profile(&store, author, "author").await;
        let post = store.insert_post(author, "p.jpg", "x").await.unwrap();
        store.delay_on("count_likes", Duration::from_millis(100));

        let feed = app.feed.clone();
        let reader = tokio::spawn(async move { feed.explore_page(None, 0).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        app.likes.like(Some(fan), post.id).await.unwrap();

        // The overlapping read still returns what it saw
        let overlapping = reader.await.unwrap().unwrap();
        assert_eq!(overlapping.posts[0].likes_count, 0);

        let page = app.feed.explore_page(None, 0).await.unwrap();
        assert_eq!(page.posts[0].likes_count, 1);
    }
}
