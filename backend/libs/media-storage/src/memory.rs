/// In-process object store for tests and local runs
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::StorageConfig;
use crate::{Bucket, ObjectStore, StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<(Bucket, String), StoredObject>>>,
    upload_calls: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
    config: StorageConfig,
}

impl MemoryObjectStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Number of `upload` calls, successful or not
    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// While set, every upload fails with `StorageError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn get(&self, bucket: Bucket, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .await
            .get(&(bucket, key.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store offline".to_string()));
        }

        let mut objects = self.objects.lock().await;
        let slot = (bucket, key.to_string());
        if objects.contains_key(&slot) {
            return Err(StorageError::AlreadyExists {
                bucket,
                key: key.to_string(),
            });
        }

        objects.insert(
            slot,
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StorageResult<()> {
        self.objects.lock().await.remove(&(bucket, key.to_string()));
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        self.config.public_url(bucket.as_str(), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_refuses_overwrite() {
        let store = MemoryObjectStore::default();

        store
            .upload(Bucket::Posts, "u/1.png", vec![1, 2], "image/png")
            .await
            .unwrap();
        let second = store
            .upload(Bucket::Posts, "u/1.png", vec![3], "image/png")
            .await;

        assert!(matches!(second, Err(StorageError::AlreadyExists { .. })));
        assert_eq!(store.upload_calls(), 2);
        assert_eq!(store.get(Bucket::Posts, "u/1.png").await.unwrap().body, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_same_key_in_different_buckets() {
        let store = MemoryObjectStore::default();

        store
            .upload(Bucket::Posts, "u/1.png", vec![1], "image/png")
            .await
            .unwrap();
        store
            .upload(Bucket::Avatars, "u/1.png", vec![2], "image/png")
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        store.delete(Bucket::Posts, "u/1.png").await.unwrap();
        assert!(store.get(Bucket::Posts, "u/1.png").await.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_rejects_uploads() {
        let store = MemoryObjectStore::default();
        store.set_unavailable(true);

        let result = store
            .upload(Bucket::Posts, "u/1.png", vec![1], "image/png")
            .await;

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert!(store.is_empty().await);
    }
}
