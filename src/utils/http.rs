// src/utils/http.rs

//! HTTP client utilities for downloading remote catalogs.

use std::time::Duration;

use url::Url;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Download a resource, failing on non-2xx responses.
pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(AppError::validation(format!("Empty response from {url}")));
    }
    Ok(bytes.to_vec())
}

/// File name to record for a downloaded catalog: the last non-empty path
/// segment, or `catalog.pdf`.
pub fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|s| s.to_string())
        .unwrap_or_else(|| "catalog.pdf".to_string())
}
