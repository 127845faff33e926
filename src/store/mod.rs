//! Persistence traits and models for documents and pipeline configurations.
//!
//! The rest of the crate talks to storage through the [`DocumentStore`] and
//! [`PipelineStore`] traits so the ingestion pipeline and the invalidation
//! listener stay independent of the concrete database. The shipped
//! implementation is SQLite over `sqlx` (see [`sqlite`]).

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use sqlite::{SqliteDocumentStore, SqlitePipelineStore};

/// Lifecycle status of a stored document. Deletion is logical only.
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_DELETED: &str = "deleted";

/// One ingested artifact. Content is immutable once stored; only the status
/// and inclusion flags change afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    /// Resolved title for URL documents, original filename for uploads.
    pub filename: String,
    /// `"url"` for fetched pages, the file extension for uploads.
    pub file_type: String,
    pub url: Option<String>,
    pub content: String,
    pub content_preview: String,
    pub word_count: i64,
    pub char_count: i64,
    pub extraction_method: String,
    pub extracted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: String,
    pub included_in_context: bool,
}

impl Document {
    /// Build a freshly-ingested document with derived counts and preview.
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        filename: impl Into<String>,
        file_type: impl Into<String>,
        url: Option<String>,
        content: impl Into<String>,
        extraction_method: impl Into<String>,
        preview_max_chars: usize,
    ) -> Self {
        let content = content.into();
        let word_count = content.split_whitespace().count() as i64;
        let char_count = content.chars().count() as i64;
        let preview: String = content.chars().take(preview_max_chars).collect();
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            filename: filename.into(),
            file_type: file_type.into(),
            url,
            content,
            content_preview: preview.trim().to_string(),
            word_count,
            char_count,
            extraction_method: extraction_method.into(),
            extracted_at: now,
            created_at: now,
            updated_at: now,
            status: STATUS_ACTIVE.to_string(),
            included_in_context: true,
        }
    }
}

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Document persistence as seen by the ingestion pipeline and context
/// assembly.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a new document.
    async fn insert(&self, document: &Document) -> Result<(), StoreError>;

    /// Fetch a document by id, whatever its status.
    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// All active documents for a session, newest first.
    async fn list_for_session(&self, session_id: &str) -> Result<Vec<Document>, StoreError>;

    /// Active documents flagged for context inclusion, in creation order.
    async fn context_documents(&self, session_id: &str) -> Result<Vec<Document>, StoreError>;

    /// Toggle whether a document participates in context assembly.
    async fn set_included(&self, id: &str, included: bool) -> Result<bool, StoreError>;

    /// Logically delete a document. Returns `false` when the id is unknown.
    async fn mark_deleted(&self, id: &str) -> Result<bool, StoreError>;
}

/// Pipeline configuration persistence, consumed by the invalidation
/// listener and by whichever component owns pipeline writes.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Read one named configuration; `None` when the name is unknown.
    async fn fetch_config(&self, name: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Insert or replace a named configuration.
    async fn upsert_config(&self, name: &str, config: &serde_json::Value)
    -> Result<(), StoreError>;

    /// Delete a named configuration. Returns `false` when absent.
    async fn delete_config(&self, name: &str) -> Result<bool, StoreError>;
}
