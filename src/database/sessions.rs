// src/database/sessions.rs

//! Ingest session repository.

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::Result;
use crate::models::IngestSession;

const COLUMNS: &str = "id, source_file, source_sha256, pages_processed, products_created, \
                       images_extracted, collages_created, created_at";

#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        session: &IngestSession,
    ) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO ingest_sessions ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&session.id)
        .bind(&session.source_file)
        .bind(&session.source_sha256)
        .bind(session.pages_processed)
        .bind(session.products_created)
        .bind(session.images_extracted)
        .bind(session.collages_created)
        .bind(session.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Most recent sessions first.
    pub async fn list(&self, limit: u32) -> Result<Vec<IngestSession>> {
        let sessions = sqlx::query_as::<_, IngestSession>(&format!(
            "SELECT {COLUMNS} FROM ingest_sessions ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    pub async fn get(&self, id: &str) -> Result<Option<IngestSession>> {
        let session = sqlx::query_as::<_, IngestSession>(&format!(
            "SELECT {COLUMNS} FROM ingest_sessions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM ingest_sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::temp_pool;
    use chrono::{Duration, TimeZone, Utc};

    fn session(id: &str, minutes: i64) -> IngestSession {
        IngestSession {
            id: id.to_string(),
            source_file: Some("catalog.pdf".to_string()),
            source_sha256: "ab".repeat(32),
            pages_processed: 4,
            products_created: 3,
            images_extracted: 5,
            collages_created: 1,
            created_at: Utc.with_ymd_and_hms(2025, 12, 27, 9, 50, 4).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn insert_get_and_list_newest_first() {
        let (_dir, pool) = temp_pool().await;
        let repo = SessionRepository::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        repo.insert(&mut tx, &session("old", 0)).await.unwrap();
        repo.insert(&mut tx, &session("new", 5)).await.unwrap();
        tx.commit().await.unwrap();

        let fetched = repo.get("old").await.unwrap().unwrap();
        assert_eq!(fetched, session("old", 0));
        assert!(repo.get("missing").await.unwrap().is_none());

        let ids: Vec<String> = repo.list(10).await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["new".to_string(), "old".to_string()]);
        assert_eq!(repo.list(1).await.unwrap().len(), 1);
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
