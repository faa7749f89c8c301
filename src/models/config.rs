//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Relational database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Object store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// PDF extraction and collage rules
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Pagination and URL expiry bounds for the search API
    #[serde(default)]
    pub api: ApiConfig,

    /// Outbound HTTP settings used when ingesting from a URL
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::validation("server.port must be > 0"));
        }
        if self.server.max_upload_mb == 0 {
            return Err(AppError::validation("server.max_upload_mb must be > 0"));
        }
        if self.database.url.trim().is_empty() {
            return Err(AppError::validation("database.url is empty"));
        }
        if self.database.max_connections == 0 {
            return Err(AppError::validation(
                "database.max_connections must be > 0",
            ));
        }
        if self.storage.public_base_url.trim().is_empty() {
            return Err(AppError::validation("storage.public_base_url is empty"));
        }
        url::Url::parse(&self.storage.public_base_url).map_err(|e| {
            AppError::validation(format!("storage.public_base_url is not a URL: {e}"))
        })?;
        if self.storage.backend == StorageBackend::S3 {
            if self.storage.s3.bucket.trim().is_empty() {
                return Err(AppError::validation("storage.s3.bucket is empty"));
            }
            if self.storage.s3.endpoint.trim().is_empty() {
                return Err(AppError::validation("storage.s3.endpoint is empty"));
            }
        }

        let ingest = &self.ingest;
        if ingest.tile_size == 0 || ingest.tile_padding >= ingest.tile_size {
            return Err(AppError::validation(
                "ingest.tile_size must be > 0 and larger than ingest.tile_padding",
            ));
        }
        if ingest.tiles_per_row == 0 {
            return Err(AppError::validation("ingest.tiles_per_row must be > 0"));
        }
        if ingest.max_collage_images == 0 {
            return Err(AppError::validation(
                "ingest.max_collage_images must be > 0",
            ));
        }
        if !(1..=100).contains(&ingest.jpeg_quality) {
            return Err(AppError::validation(
                "ingest.jpeg_quality must be within 1..=100",
            ));
        }

        let api = &self.api;
        if api.max_limit == 0 || api.default_limit == 0 || api.default_limit > api.max_limit {
            return Err(AppError::validation(
                "api limits must satisfy 0 < default_limit <= max_limit",
            ));
        }
        if api.min_expires_secs == 0
            || api.min_expires_secs > api.max_expires_secs
            || !(api.min_expires_secs..=api.max_expires_secs).contains(&api.default_expires_secs)
        {
            return Err(AppError::validation(
                "api expiry must satisfy 0 < min <= default <= max",
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Maximum accepted upload size in megabytes
    #[serde(default = "defaults::max_upload_mb")]
    pub max_upload_mb: usize,
}

impl ServerConfig {
    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
            max_upload_mb: defaults::max_upload_mb(),
        }
    }
}

/// Relational database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL (e.g. `sqlite://data/vistaview.sqlite`)
    #[serde(default = "defaults::database_url")]
    pub url: String,

    #[serde(default = "defaults::max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::database_url(),
            max_connections: defaults::max_connections(),
        }
    }
}

/// Which object store implementation backs asset storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Files under a local directory, served through `/assets`
    #[default]
    Local,
    /// S3-compatible object store (MinIO) with presigned URLs
    S3,
}

impl std::str::FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "s3" | "minio" => Ok(Self::S3),
            other => Err(AppError::config(format!("Unknown storage backend '{other}'"))),
        }
    }
}

/// Object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the local backend
    #[serde(default = "defaults::local_root")]
    pub local_root: PathBuf,

    /// Base URL browsers use to reach assets. For S3 this replaces the scheme
    /// and host of presigned URLs; for the local backend it prefixes `/assets/`.
    #[serde(default = "defaults::public_base_url")]
    pub public_base_url: String,

    #[serde(default)]
    pub s3: S3Config,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_root: defaults::local_root(),
            public_base_url: defaults::public_base_url(),
            s3: S3Config::default(),
        }
    }
}

/// S3-compatible endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Endpoint URL the service talks to (e.g. `http://minio:9000`)
    #[serde(default = "defaults::s3_endpoint")]
    pub endpoint: String,

    #[serde(default = "defaults::s3_access_key")]
    pub access_key: String,

    #[serde(default = "defaults::s3_secret_key")]
    pub secret_key: String,

    #[serde(default = "defaults::s3_region")]
    pub region: String,

    #[serde(default = "defaults::s3_bucket")]
    pub bucket: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: defaults::s3_endpoint(),
            access_key: defaults::s3_access_key(),
            secret_key: defaults::s3_secret_key(),
            region: defaults::s3_region(),
            bucket: defaults::s3_bucket(),
        }
    }
}

/// PDF extraction and collage rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Images narrower or shorter than this are treated as logos and skipped
    #[serde(default = "defaults::min_image_size")]
    pub min_image_size: u32,

    /// Edge length of one collage tile in pixels
    #[serde(default = "defaults::tile_size")]
    pub tile_size: u32,

    /// Margin kept free inside a tile
    #[serde(default = "defaults::tile_padding")]
    pub tile_padding: u32,

    #[serde(default = "defaults::tiles_per_row")]
    pub tiles_per_row: u32,

    #[serde(default = "defaults::max_collage_images")]
    pub max_collage_images: usize,

    #[serde(default = "defaults::jpeg_quality")]
    pub jpeg_quality: u8,

    /// Category assigned to every extracted product
    #[serde(default = "defaults::category")]
    pub default_category: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            min_image_size: defaults::min_image_size(),
            tile_size: defaults::tile_size(),
            tile_padding: defaults::tile_padding(),
            tiles_per_row: defaults::tiles_per_row(),
            max_collage_images: defaults::max_collage_images(),
            jpeg_quality: defaults::jpeg_quality(),
            default_category: defaults::category(),
        }
    }
}

/// Pagination and URL expiry bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "defaults::default_limit")]
    pub default_limit: u32,

    #[serde(default = "defaults::max_limit")]
    pub max_limit: u32,

    #[serde(default = "defaults::default_expires")]
    pub default_expires_secs: u64,

    #[serde(default = "defaults::min_expires")]
    pub min_expires_secs: u64,

    #[serde(default = "defaults::max_expires")]
    pub max_expires_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_limit: defaults::default_limit(),
            max_limit: defaults::max_limit(),
            default_expires_secs: defaults::default_expires(),
            min_expires_secs: defaults::min_expires(),
            max_expires_secs: defaults::max_expires(),
        }
    }
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            json: false,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Server defaults
    pub fn host() -> String {
        "0.0.0.0".into()
    }
    pub fn port() -> u16 {
        8000
    }
    pub fn max_upload_mb() -> usize {
        100
    }

    // Database defaults
    pub fn database_url() -> String {
        "sqlite://data/vistaview.sqlite".into()
    }
    pub fn max_connections() -> u32 {
        5
    }

    // Storage defaults
    pub fn local_root() -> PathBuf {
        PathBuf::from("data/objects")
    }
    pub fn public_base_url() -> String {
        "http://localhost:8000".into()
    }
    pub fn s3_endpoint() -> String {
        "http://localhost:9000".into()
    }
    pub fn s3_access_key() -> String {
        "minio".into()
    }
    pub fn s3_secret_key() -> String {
        "minio12345".into()
    }
    pub fn s3_region() -> String {
        "us-east-1".into()
    }
    pub fn s3_bucket() -> String {
        "vistaview-catalog".into()
    }

    // Ingest defaults
    pub fn min_image_size() -> u32 {
        200
    }
    pub fn tile_size() -> u32 {
        420
    }
    pub fn tile_padding() -> u32 {
        20
    }
    pub fn tiles_per_row() -> u32 {
        3
    }
    pub fn max_collage_images() -> usize {
        6
    }
    pub fn jpeg_quality() -> u8 {
        95
    }
    pub fn category() -> String {
        "Furniture".into()
    }

    // API defaults
    pub fn default_limit() -> u32 {
        50
    }
    pub fn max_limit() -> u32 {
        100
    }
    pub fn default_expires() -> u64 {
        3600
    }
    pub fn min_expires() -> u64 {
        60
    }
    pub fn max_expires() -> u64 {
        86400
    }

    // HTTP client defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; VistaView/0.1)".into()
    }
    pub fn timeout() -> u64 {
        60
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
