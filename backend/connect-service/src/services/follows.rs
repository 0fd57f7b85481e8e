/// Follow graph: follow, unfollow, status, counts and lists
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{self, CacheTag, Invalidation, Lookup, QueryKey, SharedCache};
use crate::db::{constraints, SocialStore};
use crate::error::{AppError, Result};
use crate::models::{Follow, FollowCounts, ProfileCard};
use crate::services::require_viewer;

#[derive(Clone)]
pub struct FollowService {
    store: Arc<dyn SocialStore>,
    cache: SharedCache,
}

impl FollowService {
    pub fn new(store: Arc<dyn SocialStore>, cache: SharedCache) -> Self {
        Self { store, cache }
    }

    pub async fn follow(&self, viewer: Option<Uuid>, target: Uuid) -> Result<Follow> {
        let follower = require_viewer(viewer)?;
        if follower == target {
            return Err(AppError::Validation("Cannot follow yourself".to_string()));
        }

        let follow = self
            .store
            .insert_follow(follower, target)
            .await
            .map_err(|e| {
                if e.is_unique_violation(constraints::FOLLOWS_PAIR) {
                    AppError::Conflict("Already following".to_string())
                } else {
                    e.into()
                }
            })?;

        tracing::info!(follower = %follower, following = %target, "user followed");
        cache::invalidate(
            &self.cache,
            Invalidation::Follow {
                viewer: follower,
                target,
            },
        );
        Ok(follow)
    }

    /// Unfollowing someone not followed is a no-op
    pub async fn unfollow(&self, viewer: Option<Uuid>, target: Uuid) -> Result<()> {
        let follower = require_viewer(viewer)?;

        if self.store.delete_follow(follower, target).await? {
            tracing::info!(follower = %follower, following = %target, "user unfollowed");
            cache::invalidate(
                &self.cache,
                Invalidation::Follow {
                    viewer: follower,
                    target,
                },
            );
        }
        Ok(())
    }

    /// Whether the viewer follows `target`; always false for anonymous or self
    pub async fn status(&self, viewer: Option<Uuid>, target: Uuid) -> Result<bool> {
        let Some(viewer) = viewer.filter(|v| *v != target) else {
            return Ok(false);
        };

        let key = QueryKey::FollowStatus { viewer, target };
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let following = self.store.is_following(viewer, target).await?;
        cache::store(
            &self.cache,
            token,
            key,
            [CacheTag::FollowGraph(viewer), CacheTag::FollowGraph(target)],
            &following,
        );
        Ok(following)
    }

    pub async fn counts(&self, user_id: Uuid) -> Result<FollowCounts> {
        let key = QueryKey::FollowCounts(user_id);
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let (followers, following) = tokio::try_join!(
            self.store.count_followers(user_id),
            self.store.count_following(user_id),
        )?;
        let counts = FollowCounts {
            followers,
            following,
        };

        cache::store(&self.cache, token, key, [CacheTag::FollowGraph(user_id)], &counts);
        Ok(counts)
    }

    /// Profiles of the users following `user_id`
    pub async fn followers(&self, user_id: Uuid) -> Result<Vec<ProfileCard>> {
        let key = QueryKey::Followers(user_id);
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let cards = self.store.followers(user_id).await?;
        cache::store(&self.cache, token, key, list_tags(user_id, &cards), &cards);
        Ok(cards)
    }

    /// Profiles of the users `user_id` follows
    pub async fn following(&self, user_id: Uuid) -> Result<Vec<ProfileCard>> {
        let key = QueryKey::Following(user_id);
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let cards = self.store.following(user_id).await?;
        cache::store(&self.cache, token, key, list_tags(user_id, &cards), &cards);
        Ok(cards)
    }
}

fn list_tags(user_id: Uuid, cards: &[ProfileCard]) -> Vec<CacheTag> {
    let mut tags = vec![CacheTag::FollowGraph(user_id)];
    tags.extend(cards.iter().map(|c| CacheTag::Profile(c.user_id)));
    tags
}
