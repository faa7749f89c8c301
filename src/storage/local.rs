//! Local filesystem storage implementation.
//!
//! Used for development and single-host deployments. Objects live under a
//! root directory, one file per key; the API serves them at `/assets/{key}`.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── images/
//! │   └── {session_id}/{sku}_{page}_main.jpg
//! └── collages/
//!     └── {session_id}/{sku}_{page}_collage.jpg
//! ```

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{ObjectStore, validate_key};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp = path.with_file_name(tmp_name);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn ensure_ready(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;
        log::info!("Local object store ready at {}", self.root_dir.display());
        Ok(())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        validate_key(key)?;
        self.write_bytes(key, &bytes).await?;
        log::debug!("Stored {} bytes at {}", bytes.len(), self.path(key).display());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        self.read_bytes(key).await
    }

    /// Local assets do not expire; `expires` is ignored.
    async fn url_for(&self, key: &str, _expires: Duration) -> Result<String> {
        validate_key(key)?;
        Ok(format!("{}/assets/{}", self.public_base_url, key))
    }

    fn describe(&self) -> String {
        format!("local://{}", self.root_dir.display())
    }
}
