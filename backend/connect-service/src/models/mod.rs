/// Data models for connect-service
///
/// Row types mirror the five tables of the hosted backend (profiles, posts,
/// likes, comments, follows). The augmented read types (`FeedPost`,
/// `CommentWithProfile`, `FollowCounts`) are computed at read time and never
/// stored.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Maximum bio length in characters
pub const MAX_BIO_CHARS: u64 = 150;

/// Maximum caption length in characters
pub const MAX_CAPTION_CHARS: u64 = 2200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub name: String,
    pub bio: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a profile shown next to posts and comments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProfileSummary {
    pub username: String,
    pub name: String,
    pub avatar_url: String,
}

impl From<&Profile> for ProfileSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            username: profile.username.clone(),
            name: profile.name.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

/// Entry of a followers/following list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProfileCard {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub name: String,
    pub avatar_url: String,
}

impl From<&Profile> for ProfileCard {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            user_id: profile.user_id,
            username: profile.username.clone(),
            name: profile.name.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub user_id: Uuid,
    pub username: String,
    pub name: String,
    pub bio: String,
    pub avatar_url: String,
}

/// Partial profile update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.name.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub caption: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Inclusive row range, `[from, to]`, over an ordered selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub from: i64,
    pub to: i64,
}

impl RowRange {
    /// Range covering zero-based `page` of `page_size` rows
    pub fn page(page: u32, page_size: u32) -> Self {
        let from = i64::from(page) * i64::from(page_size);
        Self {
            from,
            to: from + i64::from(page_size) - 1,
        }
    }

    pub fn limit(&self) -> i64 {
        (self.to - self.from + 1).max(0)
    }
}

/// A post augmented with engagement signals for one viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPost {
    #[serde(flatten)]
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileSummary>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
}

/// One page of the feed or explore stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPage {
    pub posts: Vec<FeedPost>,
    pub next_page: Option<u32>,
}

impl FeedPage {
    pub fn empty() -> Self {
        Self {
            posts: Vec::new(),
            next_page: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentWithProfile {
    #[serde(flatten)]
    pub comment: Comment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileSummary>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_range_for_pages() {
        assert_eq!(RowRange::page(0, 10), RowRange { from: 0, to: 9 });
        assert_eq!(RowRange::page(3, 10), RowRange { from: 30, to: 39 });
        assert_eq!(RowRange::page(3, 10).limit(), 10);
    }

    #[test]
    fn test_feed_post_serializes_flat() {
        let post = Post {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            image_url: "https://cdn/p.jpg".to_string(),
            caption: "sunset".to_string(),
            created_at: Utc::now(),
        };
        let feed_post = FeedPost {
            post: post.clone(),
            profile: None,
            likes_count: 2,
            comments_count: 1,
            is_liked: true,
        };

        let json = serde_json::to_value(&feed_post).unwrap();
        assert_eq!(json["id"], serde_json::json!(post.id));
        assert_eq!(json["caption"], "sunset");
        assert_eq!(json["likes_count"], 2);
        assert!(json.get("profile").is_none());
    }

    #[test]
    fn test_profile_changes_is_empty() {
        assert!(ProfileChanges::default().is_empty());
        let changes = ProfileChanges {
            bio: Some("hi".to_string()),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
