// src/models/product.rs

//! Product records and their API representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical dimensions in millimetres (length x width x height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: i64,
    pub width: i64,
    pub height: i64,
}

/// A product row as stored in the `products` table.
///
/// `image_key` and `collage_key` are object store keys, never URLs.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProductRecord {
    pub id: String,
    pub sku_code: Option<String>,
    pub cn_name: Option<String>,
    pub category: Option<String>,
    pub dims_l: Option<i64>,
    pub dims_w: Option<i64>,
    pub dims_h: Option<i64>,
    pub description: Option<String>,
    pub image_key: Option<String>,
    pub collage_key: Option<String>,
    pub session_id: Option<String>,
    pub source_file: Option<String>,
    pub page_number: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A product about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub id: String,
    pub sku_code: Option<String>,
    pub cn_name: Option<String>,
    pub category: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub description: Option<String>,
    pub image_key: Option<String>,
    pub collage_key: Option<String>,
    pub session_id: String,
    pub source_file: Option<String>,
    pub page_number: u32,
}

/// Product as returned by the API, with resolved asset URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductOut {
    pub id: String,
    pub sku_code: Option<String>,
    pub cn_name: Option<String>,
    pub category: Option<String>,
    pub dims_l: Option<i64>,
    pub dims_w: Option<i64>,
    pub dims_h: Option<i64>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub collage_url: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub page_number: Option<i64>,
}

impl ProductOut {
    /// Build the API view of a record from already-resolved URLs.
    pub fn from_record(
        record: ProductRecord,
        image_url: Option<String>,
        collage_url: Option<String>,
    ) -> Self {
        Self {
            id: record.id,
            sku_code: record.sku_code,
            cn_name: record.cn_name,
            category: record.category,
            dims_l: record.dims_l,
            dims_w: record.dims_w,
            dims_h: record.dims_h,
            description: record.description,
            image_url,
            collage_url,
            session_id: record.session_id,
            page_number: record.page_number,
        }
    }
}

/// Paginated product list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductOut>,
    pub total: i64,
    pub skip: u32,
    pub limit: u32,
}

/// Filters and pagination for a product search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    /// Case-insensitive substring matched against SKU, Chinese name and category
    pub q: Option<String>,
    pub session_id: Option<String>,
    pub skip: u32,
    pub limit: u32,
}
