// src/lib.rs

//! VistaView catalog service library.
//!
//! Ingests vendor PDF catalogs into product records with stored images and
//! serves them through a search API.

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
