/// Like and unlike posts
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{self, Invalidation, SharedCache};
use crate::db::{constraints, SocialStore, StoreError};
use crate::error::{AppError, Result};
use crate::models::Like;
use crate::services::require_viewer;

#[derive(Clone)]
pub struct LikeService {
    store: Arc<dyn SocialStore>,
    cache: SharedCache,
}

impl LikeService {
    pub fn new(store: Arc<dyn SocialStore>, cache: SharedCache) -> Self {
        Self { store, cache }
    }

    pub async fn like(&self, viewer: Option<Uuid>, post_id: Uuid) -> Result<Like> {
        let user_id = require_viewer(viewer)?;

        let like = self
            .store
            .insert_like(user_id, post_id)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { ref constraint }
                    if constraint == constraints::LIKES_USER_POST =>
                {
                    AppError::Conflict("Post already liked".to_string())
                }
                StoreError::ForeignKeyViolation { .. } => {
                    AppError::NotFound("Post not found".to_string())
                }
                other => other.into(),
            })?;

        tracing::debug!(post_id = %post_id, user_id = %user_id, "post liked");
        cache::invalidate(&self.cache, Invalidation::Like { post_id });
        Ok(like)
    }

    /// Remove the viewer's like; unliking a post that is not liked is a no-op
    pub async fn unlike(&self, viewer: Option<Uuid>, post_id: Uuid) -> Result<()> {
        let user_id = require_viewer(viewer)?;

        if self.store.delete_like(user_id, post_id).await? {
            tracing::debug!(post_id = %post_id, user_id = %user_id, "post unliked");
            cache::invalidate(&self.cache, Invalidation::Like { post_id });
        }
        Ok(())
    }
}
