//! Object storage for catalog assets.
//!
//! Extracted images and collages are stored under stable keys and the database
//! only ever records those keys. URLs are resolved at read time:
//!
//! ```text
//! images/{session_id}/{sku}_{page}_main.jpg
//! collages/{session_id}/{sku}_{page}_collage.jpg
//! ```
//!
//! - `LocalStorage`: files under a directory, served by the API at `/assets/{key}`
//! - `S3Storage`: S3-compatible bucket (MinIO), presigned GET URLs

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{StorageBackend, StorageConfig};

// Re-export for convenience
pub use local::LocalStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Content type used for every extracted asset.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Trait for asset storage backends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Prepare the backend (create the bucket or root directory).
    async fn ensure_ready(&self) -> Result<()>;

    /// Store an object under `key`, replacing any previous content.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Fetch an object, `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// URL a browser can use to fetch the object for at least `expires`.
    async fn url_for(&self, key: &str, expires: Duration) -> Result<String>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Build the configured storage backend.
pub async fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalStorage::new(
            &config.local_root,
            &config.public_base_url,
        ))),
        #[cfg(feature = "s3")]
        StorageBackend::S3 => Ok(Arc::new(S3Storage::from_config(config).await?)),
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(AppError::config(
            "storage.backend = \"s3\" requires the `s3` feature",
        )),
    }
}

/// Reject keys that could escape the storage root or are ambiguous.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(AppError::validation(format!("Invalid object key '{key}'")));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(AppError::validation(format!("Invalid object key '{key}'")));
    }
    Ok(())
}

/// Swap the scheme and authority of an internal URL for the public base,
/// keeping path and query intact.
///
/// `http://minio:9000/bucket/key?X-Amz-...` with base `http://localhost:9000`
/// becomes `http://localhost:9000/bucket/key?X-Amz-...`.
pub fn rewrite_public_url(internal: &str, public_base: &str) -> Result<String> {
    let parsed = Url::parse(internal)?;
    let base = public_base.trim_end_matches('/');
    Ok(match parsed.query() {
        Some(query) => format!("{}{}?{}", base, parsed.path(), query),
        None => format!("{}{}", base, parsed.path()),
    })
}

/// Object key of a page's main image.
pub fn image_key(session_id: &str, sku: &str, page: u32) -> String {
    format!("images/{}/{}_{}_main.jpg", session_id, sku, page)
}

/// Object key of a page's collage.
pub fn collage_key(session_id: &str, sku: &str, page: u32) -> String {
    format!("collages/{}/{}_{}_collage.jpg", session_id, sku, page)
}
