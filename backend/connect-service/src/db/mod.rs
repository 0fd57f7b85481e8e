/// Typed client for the hosted backend's five tables
///
/// `SocialStore` exposes one method per table operation the application uses
/// (select with filter/order/range, count, insert, update, delete). Every call
/// is one round trip; nothing here batches or joins across tables except the
/// follower/following profile lists, which the backend resolves through its
/// foreign keys.
///
/// Mutations are owner-scoped: deletes match both the row id and the caller,
/// profile updates match the caller's user id.
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Comment, Follow, Like, NewProfile, Post, Profile, ProfileCard, ProfileChanges,
    ProfileSummary, RowRange,
};

pub mod memory;
pub mod postgres;

pub use memory::MemorySocialStore;
pub use postgres::PgSocialStore;

/// Constraint names shared by the SQL schema and the in-memory store
pub mod constraints {
    pub const PROFILES_USER_ID: &str = "profiles_user_id_key";
    pub const PROFILES_USERNAME: &str = "profiles_username_key";
    pub const LIKES_USER_POST: &str = "likes_user_id_post_id_key";
    pub const FOLLOWS_PAIR: &str = "follows_follower_id_following_id_key";
    pub const FOLLOWS_NO_SELF: &str = "follows_no_self_follow";
    pub const LIKES_POST_FK: &str = "likes_post_id_fkey";
    pub const COMMENTS_POST_FK: &str = "comments_post_id_fkey";
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate key value violates unique constraint \"{constraint}\"")]
    UniqueViolation { constraint: String },

    #[error("new row violates check constraint \"{constraint}\"")]
    CheckViolation { constraint: String },

    #[error("insert or update violates foreign key constraint \"{constraint}\"")]
    ForeignKeyViolation { constraint: String },

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_unique_violation(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some("23505") => return StoreError::UniqueViolation { constraint },
                Some("23514") => return StoreError::CheckViolation { constraint },
                Some("23503") => return StoreError::ForeignKeyViolation { constraint },
                _ => {}
            }
        }
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SocialStore: Send + Sync {
    // ---- profiles ----

    async fn profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;

    async fn profile_by_username(&self, username: &str) -> StoreResult<Option<Profile>>;

    async fn profile_summary(&self, user_id: Uuid) -> StoreResult<Option<ProfileSummary>>;

    async fn insert_profile(&self, profile: &NewProfile) -> StoreResult<Profile>;

    /// Returns `None` when the user has no profile row
    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
    ) -> StoreResult<Option<Profile>>;

    /// Case-insensitive substring match on username or name
    async fn search_profiles(&self, term: &str, limit: i64) -> StoreResult<Vec<Profile>>;

    // ---- posts ----

    async fn insert_post(&self, user_id: Uuid, image_url: &str, caption: &str)
        -> StoreResult<Post>;

    async fn post_by_id(&self, post_id: Uuid) -> StoreResult<Option<Post>>;

    /// Posts ordered by `created_at` descending (ties by id descending),
    /// restricted to `authors` when given, sliced to `range`.
    async fn select_posts(
        &self,
        authors: Option<&[Uuid]>,
        range: RowRange,
    ) -> StoreResult<Vec<Post>>;

    /// Every post of one user, newest first
    async fn posts_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Post>>;

    /// Deletes the post only when `owner_id` owns it
    async fn delete_post(&self, post_id: Uuid, owner_id: Uuid) -> StoreResult<bool>;

    // ---- likes ----

    async fn insert_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<Like>;

    async fn delete_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<bool>;

    async fn count_likes(&self, post_id: Uuid) -> StoreResult<i64>;

    async fn has_liked(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<bool>;

    // ---- comments ----

    async fn insert_comment(&self, user_id: Uuid, post_id: Uuid, text: &str)
        -> StoreResult<Comment>;

    /// Deletes the comment only when `owner_id` wrote it; returns the deleted row
    async fn delete_comment(&self, comment_id: Uuid, owner_id: Uuid)
        -> StoreResult<Option<Comment>>;

    /// Comments of a post, oldest first
    async fn comments_for_post(&self, post_id: Uuid) -> StoreResult<Vec<Comment>>;

    async fn count_comments(&self, post_id: Uuid) -> StoreResult<i64>;

    // ---- follows ----

    async fn insert_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Follow>;

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool>;

    async fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool>;

    async fn following_ids(&self, follower_id: Uuid) -> StoreResult<Vec<Uuid>>;

    async fn count_followers(&self, user_id: Uuid) -> StoreResult<i64>;

    async fn count_following(&self, user_id: Uuid) -> StoreResult<i64>;

    /// Profiles of users following `user_id`; users without a profile are skipped
    async fn followers(&self, user_id: Uuid) -> StoreResult<Vec<ProfileCard>>;

    /// Profiles of users `user_id` follows; users without a profile are skipped
    async fn following(&self, user_id: Uuid) -> StoreResult<Vec<ProfileCard>>;

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_message_names_constraint() {
        let err = StoreError::UniqueViolation {
            constraint: constraints::PROFILES_USERNAME.to_string(),
        };
        assert!(err.to_string().contains("duplicate"));
        assert!(err.is_unique_violation(constraints::PROFILES_USERNAME));
        assert!(!err.is_unique_violation(constraints::LIKES_USER_POST));
    }
}
