//! SQLite-backed document and pipeline stores.
//!
//! Schema is created on connect so tests and fresh deployments work against
//! an empty database file (or `sqlite::memory:`). Existing deployments keep
//! their data; the statements are all `IF NOT EXISTS`.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::instrument;

use super::{Document, DocumentStore, PipelineStore, STATUS_ACTIVE, STATUS_DELETED, StoreError};
use async_trait::async_trait;
use chrono::Utc;

/// Document persistence over a shared `sqlx` SQLite pool.
#[derive(Clone, Debug)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Connect to `database_url` and ensure the documents table exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new().connect(database_url).await?;
        Self::with_pool(pool).await
    }

    /// Wrap an existing pool (shared with other stores) and ensure schema.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                file_type TEXT NOT NULL,
                url TEXT,
                content TEXT NOT NULL,
                content_preview TEXT NOT NULL,
                word_count INTEGER NOT NULL,
                char_count INTEGER NOT NULL,
                extraction_method TEXT NOT NULL,
                extracted_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                status TEXT NOT NULL,
                included_in_context BOOLEAN NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_session ON documents(session_id, status)",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    #[instrument(skip(self, document), fields(id = %document.id, session = %document.session_id))]
    async fn insert(&self, document: &Document) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents
            (id, session_id, user_id, filename, file_type, url,
             content, content_preview, word_count, char_count,
             extraction_method, extracted_at, created_at, updated_at,
             status, included_in_context)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(&document.session_id)
        .bind(&document.user_id)
        .bind(&document.filename)
        .bind(&document.file_type)
        .bind(&document.url)
        .bind(&document.content)
        .bind(&document.content_preview)
        .bind(document.word_count)
        .bind(document.char_count)
        .bind(&document.extraction_method)
        .bind(document.extracted_at)
        .bind(document.created_at)
        .bind(document.updated_at)
        .bind(&document.status)
        .bind(document.included_in_context)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let document = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(document)
    }

    async fn list_for_session(&self, session_id: &str) -> Result<Vec<Document>, StoreError> {
        let documents = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE session_id = ? AND status = ? \
             ORDER BY created_at DESC",
        )
        .bind(session_id)
        .bind(STATUS_ACTIVE)
        .fetch_all(&self.pool)
        .await?;
        Ok(documents)
    }

    async fn context_documents(&self, session_id: &str) -> Result<Vec<Document>, StoreError> {
        let documents = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE session_id = ? AND status = ? \
             AND included_in_context = TRUE ORDER BY created_at ASC",
        )
        .bind(session_id)
        .bind(STATUS_ACTIVE)
        .fetch_all(&self.pool)
        .await?;
        Ok(documents)
    }

    async fn set_included(&self, id: &str, included: bool) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE documents SET included_in_context = ?, updated_at = ? WHERE id = ?",
        )
        .bind(included)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_deleted(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE documents SET status = ?, updated_at = ? WHERE id = ?")
            .bind(STATUS_DELETED)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Pipeline configuration rows, stored as JSON text keyed by name.
#[derive(Clone, Debug)]
pub struct SqlitePipelineStore {
    pool: SqlitePool,
}

impl SqlitePipelineStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new().connect(database_url).await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pipelines (
                name TEXT PRIMARY KEY,
                config_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PipelineStore for SqlitePipelineStore {
    async fn fetch_config(&self, name: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let row = sqlx::query("SELECT config_json FROM pipelines WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let raw: String = row.get("config_json");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert_config(
        &self,
        name: &str,
        config: &serde_json::Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO pipelines (name, config_json, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET config_json = excluded.config_json, \
             updated_at = excluded.updated_at",
        )
        .bind(name)
        .bind(serde_json::to_string(config)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_config(&self, name: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM pipelines WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
