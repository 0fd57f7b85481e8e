/// Post service - handles post creation, retrieval, and deletion
use media_storage::Bucket;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{self, CacheTag, Invalidation, Lookup, QueryKey, SharedCache};
use crate::db::SocialStore;
use crate::error::{AppError, Result};
use crate::models::{FeedPost, Post, MAX_CAPTION_CHARS};
use crate::services::feed::FeedService;
use crate::services::media::{ImageUpload, MediaService};
use crate::services::require_viewer;

/// A post as composed by the user, before upload
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub caption: String,
    pub image: Option<ImageUpload>,
}

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn SocialStore>,
    cache: SharedCache,
    feed: FeedService,
    media: MediaService,
}

impl PostService {
    pub fn new(
        store: Arc<dyn SocialStore>,
        cache: SharedCache,
        feed: FeedService,
        media: MediaService,
    ) -> Self {
        Self {
            store,
            cache,
            feed,
            media,
        }
    }

    /// Create a post for an already uploaded image
    pub async fn create(
        &self,
        viewer: Option<Uuid>,
        image_url: &str,
        caption: &str,
    ) -> Result<Post> {
        let user_id = require_viewer(viewer)?;
        validate_caption(caption)?;

        let post = self.store.insert_post(user_id, image_url, caption).await?;

        tracing::info!(post_id = %post.id, user_id = %user_id, "post created");
        cache::invalidate(&self.cache, Invalidation::PostCreated { owner_id: user_id });
        Ok(post)
    }

    /// Upload the draft's image, then create the post pointing at it.
    ///
    /// A draft without an image fails before any store or storage call.
    pub async fn publish(&self, viewer: Option<Uuid>, draft: PostDraft) -> Result<Post> {
        let Some(image) = draft.image else {
            return Err(AppError::Validation("Please select an image".to_string()));
        };
        let user_id = require_viewer(viewer)?;
        validate_caption(&draft.caption)?;

        let image_url = self.media.upload_image(user_id, Bucket::Posts, image).await?;
        self.create(Some(user_id), &image_url, &draft.caption).await
    }

    /// One post, augmented for the viewer
    pub async fn get(&self, post_id: Uuid, viewer: Option<Uuid>) -> Result<FeedPost> {
        let key = QueryKey::Post { post_id, viewer };
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let post = self
            .store
            .post_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
        let owner = post.user_id;
        let augmented = self.feed.augment_post(post, viewer).await?;

        cache::store(
            &self.cache,
            token,
            key,
            [CacheTag::Post(post_id), CacheTag::Profile(owner)],
            &augmented,
        );
        Ok(augmented)
    }

    /// Delete one of the viewer's own posts; likes and comments go with it
    pub async fn delete(&self, viewer: Option<Uuid>, post_id: Uuid) -> Result<()> {
        let user_id = require_viewer(viewer)?;

        if !self.store.delete_post(post_id, user_id).await? {
            return match self.store.post_by_id(post_id).await? {
                Some(_) => Err(AppError::Forbidden(
                    "Only the author can delete a post".to_string(),
                )),
                None => Err(AppError::NotFound("Post not found".to_string())),
            };
        }

        tracing::info!(post_id = %post_id, user_id = %user_id, "post deleted");
        cache::invalidate(
            &self.cache,
            Invalidation::PostDeleted {
                owner_id: user_id,
                post_id,
            },
        );
        Ok(())
    }
}

fn validate_caption(caption: &str) -> Result<()> {
    if caption.chars().count() as u64 > MAX_CAPTION_CHARS {
        return Err(AppError::Validation(format!(
            "Caption must be at most {} characters",
            MAX_CAPTION_CHARS
        )));
    }
    Ok(())
}
