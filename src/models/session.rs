// src/models/session.rs

//! Ingest session bookkeeping.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// One PDF upload, as stored in the `ingest_sessions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IngestSession {
    pub id: String,
    pub source_file: Option<String>,
    /// Hex SHA-256 of the uploaded bytes
    pub source_sha256: String,
    pub pages_processed: i64,
    pub products_created: i64,
    pub images_extracted: i64,
    pub collages_created: i64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a single ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub session_id: String,
    pub pages_processed: usize,
    pub products_created: usize,
    pub images_extracted: usize,
    pub collages_created: usize,
    /// Pages skipped because extraction or upload failed
    pub pages_failed: usize,
}

/// Generate a session id of the form `YYYYmmdd_HHMMSS_xxxxxxxx`.
pub fn new_session_id() -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", stamp, &suffix[..8])
}
