// src/database/products.rs

//! Product repository.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::Result;
use crate::models::{NewProduct, ProductQuery, ProductRecord};
use crate::utils::escape_like;

const COLUMNS: &str = "id, sku_code, cn_name, category, dims_l, dims_w, dims_h, description, \
                       image_key, collage_key, session_id, source_file, page_number, \
                       created_at, updated_at";

/// `?1` is the LIKE pattern (or NULL), `?2` the session id (or NULL).
const FILTER: &str = r"
    WHERE (?1 IS NULL
           OR sku_code LIKE ?1 ESCAPE '\'
           OR cn_name LIKE ?1 ESCAPE '\'
           OR category LIKE ?1 ESCAPE '\')
      AND (?2 IS NULL OR session_id = ?2)
";

#[derive(Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert products inside the caller's transaction. All rows share one
    /// `created_at`.
    pub async fn insert_batch(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        products: &[NewProduct],
    ) -> Result<u64> {
        let now = Utc::now();
        let mut inserted = 0;

        for product in products {
            let dims = product.dimensions;
            let result = sqlx::query(
                r"
                INSERT INTO products
                (id, sku_code, cn_name, category, dims_l, dims_w, dims_h, description,
                 image_key, collage_key, session_id, source_file, page_number, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(&product.id)
            .bind(&product.sku_code)
            .bind(&product.cn_name)
            .bind(&product.category)
            .bind(dims.map(|d| d.length))
            .bind(dims.map(|d| d.width))
            .bind(dims.map(|d| d.height))
            .bind(&product.description)
            .bind(&product.image_key)
            .bind(&product.collage_key)
            .bind(&product.session_id)
            .bind(&product.source_file)
            .bind(i64::from(product.page_number))
            .bind(now)
            .execute(&mut **tx)
            .await?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    /// Filtered, paginated search. Returns the page of records and the total
    /// number of matches before pagination.
    pub async fn search(&self, query: &ProductQuery) -> Result<(Vec<ProductRecord>, i64)> {
        let pattern = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));
        let session_id = query.session_id.as_deref().filter(|s| !s.is_empty());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products {FILTER}"))
            .bind(&pattern)
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;

        let records = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {COLUMNS} FROM products {FILTER} \
             ORDER BY created_at DESC, page_number ASC LIMIT ?3 OFFSET ?4"
        ))
        .bind(&pattern)
        .bind(session_id)
        .bind(i64::from(query.limit))
        .bind(i64::from(query.skip))
        .fetch_all(&self.pool)
        .await?;

        Ok((records, total))
    }

    pub async fn get(&self, id: &str) -> Result<Option<ProductRecord>> {
        let record =
            sqlx::query_as::<_, ProductRecord>(&format!("SELECT {COLUMNS} FROM products WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Delete every product of a session together with the session row.
    /// Returns the number of products removed.
    pub async fn delete_session(&self, session_id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM products WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM ingest_sessions WHERE id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted)
    }
}
