/// Business logic layer for connect-service
///
/// - Feed service: feed, explore and profile-grid assembly
/// - Post, like and comment services: post lifecycle and engagement
/// - Follow service: follow graph and counts
/// - Profile service: profile lookup, onboarding, edits and search
/// - Media service: image validation and upload
///
/// Every service reads through the shared query cache and invalidates it
/// after a successful mutation.
use media_storage::ObjectStore;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::SharedCache;
use crate::db::SocialStore;
use crate::error::{AppError, Result};

pub mod comments;
pub mod feed;
pub mod follows;
pub mod likes;
pub mod media;
pub mod posts;
pub mod profiles;

pub use comments::CommentService;
pub use feed::{FeedService, PAGE_SIZE};
pub use follows::FollowService;
pub use likes::LikeService;
pub use media::{ImageUpload, MediaService, MAX_POST_IMAGE_BYTES};
pub use posts::{PostDraft, PostService};
pub use profiles::{ProfileService, PROFILE_SEARCH_LIMIT};

/// All services, wired to one store, one object store and one cache
#[derive(Clone)]
pub struct AppServices {
    pub feed: FeedService,
    pub posts: PostService,
    pub likes: LikeService,
    pub comments: CommentService,
    pub follows: FollowService,
    pub profiles: ProfileService,
    pub media: MediaService,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn SocialStore>,
        storage: Arc<dyn ObjectStore>,
        cache: SharedCache,
    ) -> Self {
        let feed = FeedService::new(store.clone(), cache.clone());
        let profiles = ProfileService::new(store.clone(), cache.clone());
        let media = MediaService::new(storage, profiles.clone());

        Self {
            posts: PostService::new(store.clone(), cache.clone(), feed.clone(), media.clone()),
            likes: LikeService::new(store.clone(), cache.clone()),
            comments: CommentService::new(store.clone(), cache.clone()),
            follows: FollowService::new(store, cache),
            feed,
            profiles,
            media,
        }
    }
}

/// The authenticated user, or `Unauthorized("Not authenticated")`
pub(crate) fn require_viewer(viewer: Option<Uuid>) -> Result<Uuid> {
    viewer.ok_or_else(AppError::not_authenticated)
}
