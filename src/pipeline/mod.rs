//! Pipeline entry points for catalog ingestion.
//!
//! - `Ingestor::ingest`: PDF bytes to stored assets and product rows
//! - `Ingestor::ingest_path` / `ingest_url`: same, sourced from disk or HTTP

pub mod ingest;

pub use ingest::Ingestor;
