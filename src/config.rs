// src/config.rs

//! Configuration loading utilities.
//!
//! The TOML file provides the base values; a fixed set of environment
//! variables overrides them so container deployments need no config file.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, StorageBackend};

/// Load the config file (defaults when missing), apply environment
/// overrides and validate the result.
pub fn load_all(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path);
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Apply overrides from `lookup`, which maps a variable name to its value.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(url) = get("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(backend) = get("STORAGE_BACKEND") {
        config.storage.backend = backend.parse::<StorageBackend>()?;
    }
    let secure = get("MINIO_SECURE")
        .map(|value| parse_flag("MINIO_SECURE", &value))
        .transpose()?;
    if let Some(endpoint) = get("MINIO_ENDPOINT") {
        config.storage.s3.endpoint = with_scheme(&endpoint, secure);
    } else if secure.is_some() {
        config.storage.s3.endpoint = with_scheme(&config.storage.s3.endpoint, secure);
    }
    if let Some(key) = get("MINIO_ACCESS_KEY") {
        config.storage.s3.access_key = key;
    }
    if let Some(secret) = get("MINIO_SECRET_KEY") {
        config.storage.s3.secret_key = secret;
    }
    if let Some(bucket) = get("MINIO_BUCKET") {
        config.storage.s3.bucket = bucket;
    }
    if let Some(region) = get("MINIO_REGION") {
        config.storage.s3.region = region;
    }
    if let Some(base) = get("MINIO_PUBLIC_BASE_URL") {
        config.storage.public_base_url = base;
    }
    if let Some(root) = get("LOCAL_STORAGE_ROOT") {
        config.storage.local_root = root.into();
    }
    if let Some(host) = get("SERVER_HOST") {
        config.server.host = host;
    }
    if let Some(port) = get("SERVER_PORT") {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("SERVER_PORT '{port}': {e}")))?;
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.logging.level = level;
    }
    Ok(())
}

/// MinIO endpoints are often given as `host:port`. `secure` picks the
/// scheme; without it an explicit scheme is kept and a bare host gets `http`.
fn with_scheme(endpoint: &str, secure: Option<bool>) -> String {
    let (scheme, host) = endpoint.split_once("://").unwrap_or(("http", endpoint));
    let scheme = match secure {
        Some(true) => "https",
        Some(false) => "http",
        None => scheme,
    };
    format!("{scheme}://{host}")
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(AppError::config(format!("{key} '{other}' is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn apply(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| vars.get(key).cloned())?;
        Ok(config)
    }

    #[test]
    fn no_variables_keeps_defaults() {
        let config = apply(&[]).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.backend, StorageBackend::Local);
    }

    #[test]
    fn minio_variables_override_storage() {
        let config = apply(&[
            ("STORAGE_BACKEND", "minio"),
            ("MINIO_ENDPOINT", "minio:9000"),
            ("MINIO_BUCKET", "catalog"),
            ("MINIO_PUBLIC_BASE_URL", "http://localhost:9000"),
            ("SERVER_PORT", "8080"),
            ("DATABASE_URL", "sqlite::memory:"),
        ])
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.s3.endpoint, "http://minio:9000");
        assert_eq!(config.storage.s3.bucket, "catalog");
        assert_eq!(config.storage.public_base_url, "http://localhost:9000");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url, "sqlite::memory:");
    }

    #[test]
    fn minio_secure_selects_https() {
        let config = apply(&[("MINIO_ENDPOINT", "minio:9000"), ("MINIO_SECURE", "true")]).unwrap();
        assert_eq!(config.storage.s3.endpoint, "https://minio:9000");

        let config = apply(&[("MINIO_ENDPOINT", "https://minio:9000"), ("MINIO_SECURE", "False")]).unwrap();
        assert_eq!(config.storage.s3.endpoint, "http://minio:9000");

        let config = apply(&[("MINIO_ENDPOINT", "https://minio:9000")]).unwrap();
        assert_eq!(config.storage.s3.endpoint, "https://minio:9000");
    }

    #[test]
    fn minio_secure_alone_rewrites_configured_endpoint() {
        let mut config = Config::default();
        config.storage.s3.endpoint = "http://objects.internal:9000".into();
        apply_env_overrides(&mut config, |key| (key == "MINIO_SECURE").then(|| "1".to_string())).unwrap();
        assert_eq!(config.storage.s3.endpoint, "https://objects.internal:9000");
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = apply(&[("MINIO_BUCKET", "  ")]).unwrap();
        assert_eq!(config.storage.s3.bucket, "vistaview-catalog");
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(apply(&[("SERVER_PORT", "eighty")]).is_err());
        assert!(apply(&[("STORAGE_BACKEND", "ftp")]).is_err());
        assert!(apply(&[("MINIO_SECURE", "maybe")]).is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("missing.toml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9100\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
