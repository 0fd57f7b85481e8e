/// S3-backed object store
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::StorageConfig;
use crate::{Bucket, ObjectStore, StorageError, StorageResult};

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Arc<Client>,
    config: StorageConfig,
}

impl S3ObjectStore {
    pub fn new(client: Arc<Client>, config: StorageConfig) -> Self {
        Self { client, config }
    }

    /// Build a client from the ambient AWS environment plus `config`
    pub async fn from_config(config: StorageConfig) -> Self {
        let shared = aws_config::from_env()
            .region(aws_sdk_s3::config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        Self::new(Arc::new(client), config)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(bucket.as_str())
            .key(key)
            .content_type(content_type)
            .cache_control(&self.config.cache_control)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                error!(%bucket, key, "S3 put_object failed: {}", e);
                StorageError::Upload(e.to_string())
            })?;

        debug!(%bucket, key, size, "uploaded object");
        Ok(())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(bucket.as_str())
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Delete(e.to_string()))?;

        Ok(())
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        self.config.public_url(bucket.as_str(), key)
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(Bucket::Posts.as_str())
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(())
    }
}
