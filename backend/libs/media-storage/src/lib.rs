/// Object storage for user-uploaded images
///
/// Uploads land in one of two logical buckets (`posts`, `avatars`) under a key
/// namespaced by the uploader and the upload time, so concurrent uploads by the
/// same user never collide. There is no content-hash dedup.
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub mod config;
pub mod memory;
pub mod s3;

pub use config::StorageConfig;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// Logical storage bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Posts,
    Avatars,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Posts => "posts",
            Bucket::Avatars => "avatars",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object already exists: {bucket}/{key}")]
    AlreadyExists { bucket: Bucket, key: String },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Delete failed: {0}")]
    Delete(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Minimal object storage surface: upload bytes, resolve a public URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `body` under `bucket/key`. Never overwrites an existing object.
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Remove an object; missing objects are not an error.
    async fn delete(&self, bucket: Bucket, key: &str) -> StorageResult<()>;

    /// Public URL for an object. Pure; does not check existence.
    fn public_url(&self, bucket: Bucket, key: &str) -> String;

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Build `{owner}/{unix_millis}.{ext}`.
///
/// The extension is whatever follows the last `.` of the file name; a name
/// without a dot is used as the extension as-is.
pub fn object_key(owner: Uuid, file_name: &str, unix_millis: i64) -> String {
    let ext = file_name.rsplit('.').next().unwrap_or(file_name);
    format!("{}/{}.{}", owner, unix_millis, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_is_namespaced_by_owner_and_time() {
        let owner = Uuid::new_v4();
        let key = object_key(owner, "holiday.photo.JPG", 1_700_000_000_123);
        assert_eq!(key, format!("{}/1700000000123.JPG", owner));
    }

    #[test]
    fn test_object_key_without_extension() {
        let owner = Uuid::new_v4();
        let key = object_key(owner, "image", 5);
        assert_eq!(key, format!("{}/5.image", owner));
    }

    #[test]
    fn test_bucket_names() {
        assert_eq!(Bucket::Posts.to_string(), "posts");
        assert_eq!(Bucket::Avatars.as_str(), "avatars");
    }
}
