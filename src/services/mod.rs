//! Service layer for the catalog application.
//!
//! This module contains the extraction logic for:
//! - PDF access (`CatalogDocument`)
//! - Page text heuristics (`parse_page_text`)
//! - Collage composition and JPEG encoding (`create_collage`)

pub mod collage;
pub mod parser;
pub mod pdf;

pub use collage::{CollageLayout, create_collage, encode_jpeg};
pub use parser::{PageMetadata, best_cn_name, fallback_sku, parse_page_text};
pub use pdf::{CatalogDocument, ColorSpace, PageImage};
