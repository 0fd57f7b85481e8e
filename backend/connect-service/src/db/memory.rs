use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{constraints, SocialStore, StoreError, StoreResult};
use crate::models::{
    Comment, Follow, Like, NewProfile, Post, Profile, ProfileCard, ProfileChanges,
    ProfileSummary, RowRange,
};

#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    posts: Vec<Post>,
    likes: Vec<Like>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Strictly increasing insert timestamps, so creation order is total
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn card(&self, user_id: Uuid) -> Option<ProfileCard> {
        self.profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .map(ProfileCard::from)
    }
}

/// In-process store with the same constraints as the SQL schema
///
/// Unique keys, the no-self-follow check, post foreign keys and the
/// post → likes/comments cascade all behave like the hosted backend. Every call
/// counts as one round trip; selected operations can be made to fail.
#[derive(Clone, Default)]
pub struct MemorySocialStore {
    tables: Arc<RwLock<Tables>>,
    calls: Arc<AtomicUsize>,
    failing: Arc<Mutex<HashSet<&'static str>>>,
    delays: Arc<Mutex<HashMap<&'static str, std::time::Duration>>>,
}

impl MemorySocialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent call of `operation` fail with a backend error
    pub fn fail_on(&self, operation: &'static str) {
        self.failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(operation);
    }

    /// Hold back the result of a post-augmentation lookup (`count_likes`,
    /// `count_comments`, `has_liked`, `profile_summary`) after it was read
    pub fn delay_on(&self, operation: &'static str, delay: std::time::Duration) {
        self.delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(operation, delay);
    }

    pub fn clear_failures(&self) {
        self.failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Insert a post with an explicit creation time
    pub async fn insert_post_at(
        &self,
        user_id: Uuid,
        image_url: &str,
        caption: &str,
        created_at: DateTime<Utc>,
    ) -> Post {
        let post = Post {
            id: Uuid::new_v4(),
            user_id,
            image_url: image_url.to_string(),
            caption: caption.to_string(),
            created_at,
        };
        self.tables.write().await.posts.push(post.clone());
        post
    }

    pub async fn comment_count_total(&self) -> usize {
        self.tables.read().await.comments.len()
    }

    pub async fn like_count_total(&self) -> usize {
        self.tables.read().await.likes.len()
    }

    fn enter(&self, operation: &'static str) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if failing.contains(operation) {
            return Err(StoreError::Backend(format!("{} unavailable", operation)));
        }
        Ok(())
    }

    async fn hold<T>(&self, operation: &'static str, value: T) -> StoreResult<T> {
        let delay = self
            .delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(operation)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(value)
    }
}

fn newest_first(a: &Post, b: &Post) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

fn unique_violation(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl SocialStore for MemorySocialStore {
    async fn profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        self.enter("profile_by_user")?;
        let tables = self.tables.read().await;
        Ok(tables.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn profile_by_username(&self, username: &str) -> StoreResult<Option<Profile>> {
        self.enter("profile_by_username")?;
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .iter()
            .find(|p| p.username == username)
            .cloned())
    }

    async fn profile_summary(&self, user_id: Uuid) -> StoreResult<Option<ProfileSummary>> {
        self.enter("profile_summary")?;
        let summary = {
            let tables = self.tables.read().await;
            tables
                .profiles
                .iter()
                .find(|p| p.user_id == user_id)
                .map(ProfileSummary::from)
        };
        self.hold("profile_summary", summary).await
    }

    async fn insert_profile(&self, profile: &NewProfile) -> StoreResult<Profile> {
        self.enter("insert_profile")?;
        let mut tables = self.tables.write().await;

        if tables.profiles.iter().any(|p| p.user_id == profile.user_id) {
            return Err(unique_violation(constraints::PROFILES_USER_ID));
        }
        if tables.profiles.iter().any(|p| p.username == profile.username) {
            return Err(unique_violation(constraints::PROFILES_USERNAME));
        }

        let now = tables.next_timestamp();
        let created = Profile {
            id: Uuid::new_v4(),
            user_id: profile.user_id,
            username: profile.username.clone(),
            name: profile.name.clone(),
            bio: profile.bio.clone(),
            avatar_url: profile.avatar_url.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.profiles.push(created.clone());
        Ok(created)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
    ) -> StoreResult<Option<Profile>> {
        self.enter("update_profile")?;
        let mut tables = self.tables.write().await;

        if let Some(username) = &changes.username {
            let taken = tables
                .profiles
                .iter()
                .any(|p| &p.username == username && p.user_id != user_id);
            if taken {
                return Err(unique_violation(constraints::PROFILES_USERNAME));
            }
        }

        let now = tables.next_timestamp();
        let Some(profile) = tables.profiles.iter_mut().find(|p| p.user_id == user_id) else {
            return Ok(None);
        };

        if let Some(username) = &changes.username {
            profile.username = username.clone();
        }
        if let Some(name) = &changes.name {
            profile.name = name.clone();
        }
        if let Some(bio) = &changes.bio {
            profile.bio = bio.clone();
        }
        if let Some(avatar_url) = &changes.avatar_url {
            profile.avatar_url = avatar_url.clone();
        }
        profile.updated_at = now;

        Ok(Some(profile.clone()))
    }

    async fn search_profiles(&self, term: &str, limit: i64) -> StoreResult<Vec<Profile>> {
        self.enter("search_profiles")?;
        let needle = term.to_lowercase();
        let tables = self.tables.read().await;

        Ok(tables
            .profiles
            .iter()
            .filter(|p| {
                p.username.to_lowercase().contains(&needle)
                    || p.name.to_lowercase().contains(&needle)
            })
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn insert_post(
        &self,
        user_id: Uuid,
        image_url: &str,
        caption: &str,
    ) -> StoreResult<Post> {
        self.enter("insert_post")?;
        let mut tables = self.tables.write().await;

        let post = Post {
            id: Uuid::new_v4(),
            user_id,
            image_url: image_url.to_string(),
            caption: caption.to_string(),
            created_at: tables.next_timestamp(),
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn post_by_id(&self, post_id: Uuid) -> StoreResult<Option<Post>> {
        self.enter("post_by_id")?;
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().find(|p| p.id == post_id).cloned())
    }

    async fn select_posts(
        &self,
        authors: Option<&[Uuid]>,
        range: RowRange,
    ) -> StoreResult<Vec<Post>> {
        self.enter("select_posts")?;
        let tables = self.tables.read().await;

        let mut posts: Vec<Post> = tables
            .posts
            .iter()
            .filter(|p| authors.map_or(true, |ids| ids.contains(&p.user_id)))
            .cloned()
            .collect();
        posts.sort_by(newest_first);

        Ok(posts
            .into_iter()
            .skip(range.from.max(0) as usize)
            .take(range.limit() as usize)
            .collect())
    }

    async fn posts_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Post>> {
        self.enter("posts_by_user")?;
        let tables = self.tables.read().await;

        let mut posts: Vec<Post> = tables
            .posts
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        posts.sort_by(newest_first);
        Ok(posts)
    }

    async fn delete_post(&self, post_id: Uuid, owner_id: Uuid) -> StoreResult<bool> {
        self.enter("delete_post")?;
        let mut tables = self.tables.write().await;

        let before = tables.posts.len();
        tables
            .posts
            .retain(|p| !(p.id == post_id && p.user_id == owner_id));
        if tables.posts.len() == before {
            return Ok(false);
        }

        tables.likes.retain(|l| l.post_id != post_id);
        tables.comments.retain(|c| c.post_id != post_id);
        Ok(true)
    }

    async fn insert_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<Like> {
        self.enter("insert_like")?;
        let mut tables = self.tables.write().await;

        if !tables.posts.iter().any(|p| p.id == post_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: constraints::LIKES_POST_FK.to_string(),
            });
        }
        if tables
            .likes
            .iter()
            .any(|l| l.user_id == user_id && l.post_id == post_id)
        {
            return Err(unique_violation(constraints::LIKES_USER_POST));
        }

        let like = Like {
            id: Uuid::new_v4(),
            user_id,
            post_id,
            created_at: tables.next_timestamp(),
        };
        tables.likes.push(like.clone());
        Ok(like)
    }

    async fn delete_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<bool> {
        self.enter("delete_like")?;
        let mut tables = self.tables.write().await;

        let before = tables.likes.len();
        tables
            .likes
            .retain(|l| !(l.user_id == user_id && l.post_id == post_id));
        Ok(tables.likes.len() < before)
    }

    async fn count_likes(&self, post_id: Uuid) -> StoreResult<i64> {
        self.enter("count_likes")?;
        let count = {
            let tables = self.tables.read().await;
            tables.likes.iter().filter(|l| l.post_id == post_id).count() as i64
        };
        self.hold("count_likes", count).await
    }

    async fn has_liked(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<bool> {
        self.enter("has_liked")?;
        let liked = {
            let tables = self.tables.read().await;
            tables
                .likes
                .iter()
                .any(|l| l.user_id == user_id && l.post_id == post_id)
        };
        self.hold("has_liked", liked).await
    }

    async fn insert_comment(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        text: &str,
    ) -> StoreResult<Comment> {
        self.enter("insert_comment")?;
        let mut tables = self.tables.write().await;

        if !tables.posts.iter().any(|p| p.id == post_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: constraints::COMMENTS_POST_FK.to_string(),
            });
        }

        let comment = Comment {
            id: Uuid::new_v4(),
            user_id,
            post_id,
            text: text.to_string(),
            created_at: tables.next_timestamp(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn delete_comment(
        &self,
        comment_id: Uuid,
        owner_id: Uuid,
    ) -> StoreResult<Option<Comment>> {
        self.enter("delete_comment")?;
        let mut tables = self.tables.write().await;

        let position = tables
            .comments
            .iter()
            .position(|c| c.id == comment_id && c.user_id == owner_id);
        Ok(position.map(|idx| tables.comments.remove(idx)))
    }

    async fn comments_for_post(&self, post_id: Uuid) -> StoreResult<Vec<Comment>> {
        self.enter("comments_for_post")?;
        let tables = self.tables.read().await;

        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn count_comments(&self, post_id: Uuid) -> StoreResult<i64> {
        self.enter("count_comments")?;
        let count = {
            let tables = self.tables.read().await;
            tables.comments.iter().filter(|c| c.post_id == post_id).count() as i64
        };
        self.hold("count_comments", count).await
    }

    async fn insert_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Follow> {
        self.enter("insert_follow")?;
        let mut tables = self.tables.write().await;

        if follower_id == following_id {
            return Err(StoreError::CheckViolation {
                constraint: constraints::FOLLOWS_NO_SELF.to_string(),
            });
        }
        if tables
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id)
        {
            return Err(unique_violation(constraints::FOLLOWS_PAIR));
        }

        let follow = Follow {
            id: Uuid::new_v4(),
            follower_id,
            following_id,
            created_at: tables.next_timestamp(),
        };
        tables.follows.push(follow.clone());
        Ok(follow)
    }

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool> {
        self.enter("delete_follow")?;
        let mut tables = self.tables.write().await;

        let before = tables.follows.len();
        tables
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.following_id == following_id));
        Ok(tables.follows.len() < before)
    }

    async fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool> {
        self.enter("is_following")?;
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id))
    }

    async fn following_ids(&self, follower_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.enter("following_ids")?;
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|f| f.follower_id == follower_id)
            .map(|f| f.following_id)
            .collect())
    }

    async fn count_followers(&self, user_id: Uuid) -> StoreResult<i64> {
        self.enter("count_followers")?;
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|f| f.following_id == user_id)
            .count() as i64)
    }

    async fn count_following(&self, user_id: Uuid) -> StoreResult<i64> {
        self.enter("count_following")?;
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id)
            .count() as i64)
    }

    async fn followers(&self, user_id: Uuid) -> StoreResult<Vec<ProfileCard>> {
        self.enter("followers")?;
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .rev()
            .filter(|f| f.following_id == user_id)
            .filter_map(|f| tables.card(f.follower_id))
            .collect())
    }

    async fn following(&self, user_id: Uuid) -> StoreResult<Vec<ProfileCard>> {
        self.enter("following")?;
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .rev()
            .filter(|f| f.follower_id == user_id)
            .filter_map(|f| tables.card(f.following_id))
            .collect())
    }
}
