/// Image validation and upload
use chrono::Utc;
use media_storage::{object_key, Bucket, ObjectStore};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Profile, ProfileChanges};
use crate::services::profiles::{check_changes, ProfileService};
use crate::services::require_viewer;

/// Post images above this size are rejected
pub const MAX_POST_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// An image file as received from the client
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Reject non-images, and images too large for `bucket`
    pub fn validate_for(&self, bucket: Bucket) -> Result<()> {
        if !self.content_type.starts_with("image/") {
            return Err(AppError::Validation(
                "Please select an image file".to_string(),
            ));
        }
        if bucket == Bucket::Posts && self.bytes.len() > MAX_POST_IMAGE_BYTES {
            return Err(AppError::Validation(
                "Image must be less than 10MB".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MediaService {
    storage: Arc<dyn ObjectStore>,
    profiles: ProfileService,
}

impl MediaService {
    pub fn new(storage: Arc<dyn ObjectStore>, profiles: ProfileService) -> Self {
        Self { storage, profiles }
    }

    /// Upload an image under `{owner}/{unix_millis}.{ext}` and return its public URL
    pub async fn upload_image(
        &self,
        owner: Uuid,
        bucket: Bucket,
        image: ImageUpload,
    ) -> Result<String> {
        image.validate_for(bucket)?;

        let key = object_key(owner, &image.file_name, Utc::now().timestamp_millis());
        let size = image.bytes.len();

        self.storage
            .upload(bucket, &key, image.bytes, &image.content_type)
            .await
            .map_err(|e| {
                tracing::error!(%bucket, %key, error = %e, "image upload failed");
                AppError::from(e)
            })?;

        tracing::info!(%bucket, %key, size, "image uploaded");
        Ok(self.storage.public_url(bucket, &key))
    }

    /// Check the edit, upload the new avatar if any, then apply the edit
    pub async fn update_profile_with_avatar(
        &self,
        viewer: Option<Uuid>,
        changes: ProfileChanges,
        avatar: Option<ImageUpload>,
    ) -> Result<Profile> {
        let user_id = require_viewer(viewer)?;
        let mut changes = check_changes(changes)?;

        if let Some(avatar) = avatar {
            let url = self.upload_image(user_id, Bucket::Avatars, avatar).await?;
            changes.avatar_url = Some(url);
        }

        self.profiles.update(Some(user_id), changes).await
    }
}
