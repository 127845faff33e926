//! The staged document ingestion pipeline.
//!
//! One ingestion moves a document from raw source to stored, chunked,
//! citable record, narrating each stage over the session's broadcast
//! channel:
//!
//! ```text
//! started ─► fetching/extracting ─► extracted ─► storing ─► completed
//!     └──────────────── any stage ─────────────────► failed
//! ```
//!
//! * [`fetch`] — URL retrieval and visible-text extraction from markup.
//! * [`extract`] — file-type dispatch for uploaded bytes (txt/md, PDF, DOCX).
//! * [`pipeline`] — the [`DocumentProcessor`] orchestrating the stages.
//! * [`tasks`] — supervision for fire-and-forget URL ingestions.

pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod tasks;

use thiserror::Error;

pub use pipeline::{DocumentProcessor, IngestOutcome};
pub use tasks::IngestTasks;

use crate::store::StoreError;

/// Errors raised while ingesting one document.
///
/// On the URL path these are converted into a `failed` broadcast event and
/// swallowed; on the file path they are broadcast and then propagated.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("document contained no extractable text")]
    EmptyContent,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
