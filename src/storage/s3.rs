// src/storage/s3.rs

//! S3-compatible storage implementation.
//!
//! Talks to AWS S3 or MinIO with path-style addressing. Browsers receive
//! presigned GET URLs whose scheme and host are rewritten to the public base
//! URL, since the endpoint the service uses (e.g. `http://minio:9000`) is often
//! not reachable from outside.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::models::StorageConfig;
use crate::storage::{ObjectStore, rewrite_public_url, validate_key};

/// S3-based asset storage.
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Create S3 storage from the `[storage.s3]` configuration.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let s3 = &config.s3;
        let credentials = Credentials::new(
            s3.access_key.clone(),
            s3.secret_key.clone(),
            None,
            None,
            "vistaview-config",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(s3.region.clone()))
            .endpoint_url(s3.endpoint.clone())
            .credentials_provider(credentials)
            .load()
            .await;

        let client_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(Self::new(
            Client::from_conf(client_config),
            s3.bucket.clone(),
            config.public_base_url.clone(),
        ))
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    /// Create the bucket if it doesn't exist.
    async fn ensure_ready(&self) -> Result<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            log::info!("Bucket {} ready", self.bucket);
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "failed to create bucket {}: {}",
                    self.bucket,
                    DisplayErrorContext(&e)
                ))
            })?;

        log::info!("Created bucket: {}", self.bucket);
        Ok(())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        validate_key(key)?;
        let len = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "put s3://{}/{} failed: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        log::debug!("Wrote {} bytes to s3://{}/{}", len, self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::storage(format!("read s3://{}/{}: {}", self.bucket, key, e)))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                // Check if it's a "not found" error
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::debug!("No object at s3://{}/{}", self.bucket, key);
                    Ok(None)
                } else {
                    Err(AppError::storage(format!(
                        "get s3://{}/{} failed: {}",
                        self.bucket,
                        key,
                        DisplayErrorContext(&service_err)
                    )))
                }
            }
        }
    }

    /// Presigned GET, rewritten onto the public base URL.
    async fn url_for(&self, key: &str, expires: Duration) -> Result<String> {
        validate_key(key)?;

        let presigning = PresigningConfig::expires_in(expires).map_err(AppError::storage)?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                AppError::storage(format!("presign {} failed: {}", key, DisplayErrorContext(&e)))
            })?;

        rewrite_public_url(request.uri(), &self.public_base_url)
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
