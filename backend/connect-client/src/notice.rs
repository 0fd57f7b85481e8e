//! User-facing notices for the outcome of an action

use crate::dto::ImageFile;
use crate::error::ClientError;

/// Largest image accepted for a post
pub const MAX_POST_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Like,
    Unlike,
    CreatePost,
    DeletePost,
    AddComment,
    DeleteComment,
    UpdateProfile,
    Follow,
    Unfollow,
}

impl Action {
    /// Text shown when the action succeeds; some actions are silent
    pub fn success_message(&self) -> Option<&'static str> {
        match self {
            Action::CreatePost => Some("Post created successfully!"),
            Action::DeletePost => Some("Post deleted"),
            Action::DeleteComment => Some("Comment deleted"),
            Action::UpdateProfile => Some("Profile updated"),
            Action::Follow => Some("Following"),
            Action::Unfollow => Some("Unfollowed"),
            Action::Like | Action::Unlike | Action::AddComment => None,
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Action::Like | Action::Unlike => "Failed to update like",
            Action::CreatePost => "Failed to create post",
            Action::DeletePost => "Failed to delete post",
            Action::AddComment => "Failed to add comment",
            Action::DeleteComment => "Failed to delete comment",
            Action::UpdateProfile => "Failed to update profile",
            Action::Follow | Action::Unfollow => "Failed to update follow status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn for_success(action: Action) -> Option<Self> {
        action.success_message().map(Notice::success)
    }

    /// Map a failed request to the text shown for `action`.
    ///
    /// A taken username and server-side validation messages are shown as
    /// reported; anything else gets the action's generic failure text.
    pub fn from_error(action: Action, err: &ClientError) -> Self {
        match err {
            ClientError::Api { code, .. } if code.as_deref() == Some("username_taken") => {
                Notice::error("Username is already taken")
            }
            ClientError::Api { code, message, .. } if code.as_deref() == Some("validation") => {
                Notice::error(message.clone())
            }
            _ => Notice::error(action.failure_message()),
        }
    }
}

/// Checks a picked post image before anything is uploaded
pub fn check_post_image(image: Option<&ImageFile>) -> Option<Notice> {
    let Some(image) = image else {
        return Some(Notice::error("Please select an image"));
    };
    if !image.content_type.starts_with("image/") {
        return Some(Notice::error("Please select an image file"));
    }
    if image.bytes.len() > MAX_POST_IMAGE_BYTES {
        return Some(Notice::error("Image must be less than 10MB"));
    }
    None
}

/// Avatars only need to be images
pub fn check_avatar(image: &ImageFile) -> Option<Notice> {
    (!image.content_type.starts_with("image/"))
        .then(|| Notice::error("Please select an image file"))
}
