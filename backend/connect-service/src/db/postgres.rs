use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{SocialStore, StoreResult};
use crate::models::{
    Comment, Follow, Like, NewProfile, Post, Profile, ProfileCard, ProfileChanges,
    ProfileSummary, RowRange,
};

/// PostgreSQL implementation of the store client
#[derive(Clone)]
pub struct PgSocialStore {
    pool: PgPool,
}

impl PgSocialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Escape LIKE wildcards so the search term matches literally
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl SocialStore for PgSocialStore {
    async fn profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, user_id, username, name, bio, avatar_url, created_at, updated_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn profile_by_username(&self, username: &str) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, user_id, username, name, bio, avatar_url, created_at, updated_at
            FROM profiles
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn profile_summary(&self, user_id: Uuid) -> StoreResult<Option<ProfileSummary>> {
        let summary = sqlx::query_as::<_, ProfileSummary>(
            "SELECT username, name, avatar_url FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(summary)
    }

    async fn insert_profile(&self, profile: &NewProfile) -> StoreResult<Profile> {
        let created = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, username, name, bio, avatar_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, username, name, bio, avatar_url, created_at, updated_at
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.username)
        .bind(&profile.name)
        .bind(&profile.bio)
        .bind(&profile.avatar_url)
        .fetch_one(&self.pool)
        .await?;

        debug!(user_id = %created.user_id, username = %created.username, "profile created");
        Ok(created)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
    ) -> StoreResult<Option<Profile>> {
        let updated = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET username = COALESCE($2, username),
                name = COALESCE($3, name),
                bio = COALESCE($4, bio),
                avatar_url = COALESCE($5, avatar_url),
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING id, user_id, username, name, bio, avatar_url, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(changes.username.as_deref())
        .bind(changes.name.as_deref())
        .bind(changes.bio.as_deref())
        .bind(changes.avatar_url.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn search_profiles(&self, term: &str, limit: i64) -> StoreResult<Vec<Profile>> {
        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, user_id, username, name, bio, avatar_url, created_at, updated_at
            FROM profiles
            WHERE username ILIKE $1 OR name ILIKE $1
            LIMIT $2
            "#,
        )
        .bind(like_pattern(term))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    async fn insert_post(
        &self,
        user_id: Uuid,
        image_url: &str,
        caption: &str,
    ) -> StoreResult<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (user_id, image_url, caption)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, image_url, caption, created_at
            "#,
        )
        .bind(user_id)
        .bind(image_url)
        .bind(caption)
        .fetch_one(&self.pool)
        .await?;

        Ok(post)
    }

    async fn post_by_id(&self, post_id: Uuid) -> StoreResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            "SELECT id, user_id, image_url, caption, created_at FROM posts WHERE id = $1",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn select_posts(
        &self,
        authors: Option<&[Uuid]>,
        range: RowRange,
    ) -> StoreResult<Vec<Post>> {
        let posts = match authors {
            Some(authors) => {
                sqlx::query_as::<_, Post>(
                    r#"
                    SELECT id, user_id, image_url, caption, created_at
                    FROM posts
                    WHERE user_id = ANY($1)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(authors.to_vec())
                .bind(range.limit())
                .bind(range.from)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Post>(
                    r#"
                    SELECT id, user_id, image_url, caption, created_at
                    FROM posts
                    ORDER BY created_at DESC, id DESC
                    LIMIT $1 OFFSET $2
                    "#,
                )
                .bind(range.limit())
                .bind(range.from)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(posts)
    }

    async fn posts_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, user_id, image_url, caption, created_at
            FROM posts
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    async fn delete_post(&self, post_id: Uuid, owner_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<Like> {
        let like = sqlx::query_as::<_, Like>(
            r#"
            INSERT INTO likes (user_id, post_id)
            VALUES ($1, $2)
            RETURNING id, user_id, post_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(like)
    }

    async fn delete_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_likes(&self, post_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn has_liked(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_comment(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        text: &str,
    ) -> StoreResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (user_id, post_id, text)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, post_id, text, created_at
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn delete_comment(
        &self,
        comment_id: Uuid,
        owner_id: Uuid,
    ) -> StoreResult<Option<Comment>> {
        let deleted = sqlx::query_as::<_, Comment>(
            r#"
            DELETE FROM comments
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, post_id, text, created_at
            "#,
        )
        .bind(comment_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(deleted)
    }

    async fn comments_for_post(&self, post_id: Uuid) -> StoreResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, user_id, post_id, text, created_at
            FROM comments
            WHERE post_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn count_comments(&self, post_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn insert_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Follow> {
        let follow = sqlx::query_as::<_, Follow>(
            r#"
            INSERT INTO follows (follower_id, following_id)
            VALUES ($1, $2)
            RETURNING id, follower_id, following_id, created_at
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(follow)
    }

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
                .bind(follower_id)
                .bind(following_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn following_ids(&self, follower_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT following_id FROM follows WHERE follower_id = $1")
                .bind(follower_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids)
    }

    async fn count_followers(&self, user_id: Uuid) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE following_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn count_following(&self, user_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn followers(&self, user_id: Uuid) -> StoreResult<Vec<ProfileCard>> {
        let cards = sqlx::query_as::<_, ProfileCard>(
            r#"
            SELECT p.id, p.user_id, p.username, p.name, p.avatar_url
            FROM follows f
            JOIN profiles p ON p.user_id = f.follower_id
            WHERE f.following_id = $1
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    async fn following(&self, user_id: Uuid) -> StoreResult<Vec<ProfileCard>> {
        let cards = sqlx::query_as::<_, ProfileCard>(
            r#"
            SELECT p.id, p.user_id, p.username, p.name, p.avatar_url
            FROM follows f
            JOIN profiles p ON p.user_id = f.following_id
            WHERE f.follower_id = $1
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
