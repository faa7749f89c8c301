// src/models/mod.rs

//! Domain models for the catalog service.

mod config;
mod product;
mod session;

pub use config::{
    ApiConfig, Config, DatabaseConfig, HttpConfig, IngestConfig, LoggingConfig, S3Config,
    ServerConfig, StorageBackend, StorageConfig,
};
pub use product::{
    Dimensions, NewProduct, ProductListResponse, ProductOut, ProductQuery, ProductRecord,
};
pub use session::{IngestReport, IngestSession, new_session_id};
