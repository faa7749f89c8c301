// src/database/mod.rs

//! SQLite persistence for products and ingest sessions.
//!
//! Queries are plain runtime `sqlx` queries; the schema is created by
//! [`migrate`] when the pool is opened.

pub mod products;
pub mod sessions;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::Result;
use crate::models::DatabaseConfig;

pub use products::ProductRepository;
pub use sessions::SessionRepository;

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY NOT NULL,
        sku_code TEXT,
        cn_name TEXT,
        category TEXT,
        dims_l INTEGER,
        dims_w INTEGER,
        dims_h INTEGER,
        description TEXT,
        image_key TEXT,
        collage_key TEXT,
        session_id TEXT,
        source_file TEXT,
        page_number INTEGER,
        created_at TEXT NOT NULL,
        updated_at TEXT
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS ingest_sessions (
        id TEXT PRIMARY KEY NOT NULL,
        source_file TEXT,
        source_sha256 TEXT NOT NULL,
        pages_processed INTEGER NOT NULL DEFAULT 0,
        products_created INTEGER NOT NULL DEFAULT 0,
        images_extracted INTEGER NOT NULL DEFAULT 0,
        collages_created INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_products_sku_code ON products (sku_code)",
    "CREATE INDEX IF NOT EXISTS idx_products_cn_name ON products (cn_name)",
    "CREATE INDEX IF NOT EXISTS idx_products_category ON products (category)",
    "CREATE INDEX IF NOT EXISTS idx_products_session_id ON products (session_id)",
    "CREATE INDEX IF NOT EXISTS idx_products_created_at ON products (created_at)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_created_at ON ingest_sessions (created_at)",
];

/// Open the SQLite pool, creating the database file and its directory if
/// needed, and bring the schema up to date.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    log::info!("Database ready: {}", config.url);
    Ok(pool)
}

/// Create tables and indexes if they do not exist.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tempfile::TempDir;

    /// Pool on a fresh database file inside a temp dir.
    pub async fn temp_pool() -> (TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("nested/test.sqlite").display()),
            max_connections: 2,
        };
        let pool = connect(&config).await.unwrap();
        (dir, pool)
    }
}
