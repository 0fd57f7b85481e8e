/// Object storage configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// AWS region (or the region string the S3-compatible endpoint expects)
    pub region: String,
    /// Custom S3-compatible endpoint, e.g. the hosted backend's storage gateway
    pub endpoint: Option<String>,
    /// Base URL for public object access; objects resolve to `{base}/{bucket}/{key}`
    pub public_base_url: String,
    /// Whether to address buckets path-style (required by most S3-compatible gateways)
    pub path_style: bool,
    /// Cache-Control header stamped on uploaded objects
    pub cache_control: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            public_base_url: "http://localhost:9000".to_string(),
            path_style: true,
            cache_control: "max-age=3600".to_string(),
        }
    }
}

impl StorageConfig {
    /// Load storage configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            region: std::env::var("STORAGE_REGION")
                .or_else(|_| std::env::var("AWS_REGION"))
                .unwrap_or(defaults.region),
            endpoint: std::env::var("STORAGE_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            public_base_url: std::env::var("STORAGE_PUBLIC_BASE_URL")
                .unwrap_or(defaults.public_base_url),
            path_style: std::env::var("STORAGE_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.path_style),
            cache_control: std::env::var("STORAGE_CACHE_CONTROL")
                .unwrap_or(defaults.cache_control),
        }
    }

    /// Public URL of an object
    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            bucket,
            key
        )
    }
}
