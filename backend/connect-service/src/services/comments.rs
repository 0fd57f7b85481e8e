/// Comments on posts
use futures::future::try_join_all;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{self, CacheTag, Invalidation, Lookup, QueryKey, SharedCache};
use crate::db::{SocialStore, StoreError};
use crate::error::{AppError, Result};
use crate::models::{Comment, CommentWithProfile};
use crate::services::require_viewer;

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn SocialStore>,
    cache: SharedCache,
}

impl CommentService {
    pub fn new(store: Arc<dyn SocialStore>, cache: SharedCache) -> Self {
        Self { store, cache }
    }

    /// Comments of a post, oldest first, each with its author's profile
    pub async fn list(&self, post_id: Uuid) -> Result<Vec<CommentWithProfile>> {
        let key = QueryKey::Comments(post_id);
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let comments = self.store.comments_for_post(post_id).await?;
        let with_profiles = try_join_all(comments.into_iter().map(|comment| async move {
            let profile = self.store.profile_summary(comment.user_id).await?;
            Ok::<_, StoreError>(CommentWithProfile { comment, profile })
        }))
        .await?;

        let mut tags = vec![CacheTag::Comments(post_id)];
        tags.extend(
            with_profiles
                .iter()
                .map(|c| CacheTag::Profile(c.comment.user_id)),
        );
        cache::store(&self.cache, token, key, tags, &with_profiles);

        Ok(with_profiles)
    }

    pub async fn add(&self, viewer: Option<Uuid>, post_id: Uuid, text: &str) -> Result<Comment> {
        let user_id = require_viewer(viewer)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Comment cannot be empty".to_string()));
        }

        let comment = self
            .store
            .insert_comment(user_id, post_id, text)
            .await
            .map_err(|e| match e {
                StoreError::ForeignKeyViolation { .. } => {
                    AppError::NotFound("Post not found".to_string())
                }
                other => other.into(),
            })?;

        tracing::debug!(comment_id = %comment.id, post_id = %post_id, "comment added");
        cache::invalidate(&self.cache, Invalidation::Comment { post_id });
        Ok(comment)
    }

    /// Delete one of the viewer's own comments
    pub async fn delete(&self, viewer: Option<Uuid>, comment_id: Uuid) -> Result<()> {
        let user_id = require_viewer(viewer)?;

        let deleted = self
            .store
            .delete_comment(comment_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        cache::invalidate(
            &self.cache,
            Invalidation::Comment {
                post_id: deleted.post_id,
            },
        );
        Ok(())
    }
}
