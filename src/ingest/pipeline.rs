//! Orchestration of one document's journey from raw source to stored record.

use std::sync::Arc;

use serde_json::json;
use tracing::{error, info, instrument};

use super::IngestError;
use super::extract::{extract_file_text, is_supported};
use super::fetch::{self, FetchedPage};
use super::tasks::IngestTasks;
use crate::config::DocloomConfig;
use crate::registry::{PipelineStatus, SessionRegistry};
use crate::store::{Document, DocumentStore};
use crate::urls;

/// Extraction method tags recorded on stored documents.
const METHOD_MARKUP: &str = "markup";
const METHOD_DIRECT: &str = "direct";

/// Result of a completed ingestion, mirrored in the final `complete` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestOutcome {
    pub document_id: String,
    pub title: String,
    pub word_count: usize,
    /// Source URL for URL-origin documents.
    pub url: Option<String>,
    /// File extension for file-origin documents.
    pub file_type: Option<String>,
}

/// Processes documents (URLs and uploads) with live progress narration.
///
/// Owns the HTTP client so every fetch shares the configured timeout and
/// user agent. The registry and store are shared with the rest of the
/// process through `Arc`s handed in by the composition root.
pub struct DocumentProcessor {
    store: Arc<dyn DocumentStore>,
    registry: Arc<SessionRegistry>,
    client: reqwest::Client,
    config: DocloomConfig,
}

impl DocumentProcessor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<SessionRegistry>,
        config: DocloomConfig,
    ) -> Result<Self, IngestError> {
        let client = fetch::build_client(&config)?;
        Ok(Self {
            store,
            registry,
            client,
            config,
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Scan an inbound chat message for ingestible links.
    ///
    /// Every valid, non-blocked URL gets a `url_detected` broadcast and a
    /// supervised background ingestion; the caller does not wait for any of
    /// them, and no ordering holds between URLs from the same message.
    /// Returns the number of ingestions started.
    pub async fn scan_message(
        self: &Arc<Self>,
        text: &str,
        session_id: &str,
        user_id: &str,
        tasks: &IngestTasks,
    ) -> usize {
        let mut started = 0;
        for detected in urls::extract_urls(text) {
            if !detected.is_valid || detected.is_blocked {
                continue;
            }
            self.registry
                .broadcast_url_detected(session_id, &detected.url, &detected.domain)
                .await;

            let processor = Arc::clone(self);
            let url = detected.url.clone();
            let session = session_id.to_string();
            let user = user_id.to_string();
            tasks
                .spawn(async move {
                    processor.ingest_from_url(&url, &session, &user).await;
                })
                .await;
            started += 1;
        }
        started
    }

    /// Ingest one URL, narrating progress to the session.
    ///
    /// Runs as an unattended background task: any failure is converted into
    /// a `failed` broadcast and `None`. Nothing is raised toward a caller
    /// that is not listening.
    #[instrument(skip(self), fields(session = session_id))]
    pub async fn ingest_from_url(
        &self,
        url: &str,
        session_id: &str,
        user_id: &str,
    ) -> Option<IngestOutcome> {
        match self.run_url_pipeline(url, session_id, user_id).await {
            Ok(outcome) => {
                info!(url, document = %outcome.document_id, "url ingested");
                Some(outcome)
            }
            Err(err) => {
                error!(url, error = %err, "url ingestion failed");
                self.registry
                    .broadcast_pipeline_event(
                        session_id,
                        "error",
                        PipelineStatus::Failed,
                        &format!("Failed to process URL: {err}"),
                        Some(json!({"error": err.to_string(), "url": url})),
                    )
                    .await;
                None
            }
        }
    }

    async fn run_url_pipeline(
        &self,
        url: &str,
        session_id: &str,
        user_id: &str,
    ) -> Result<IngestOutcome, IngestError> {
        self.registry
            .broadcast_pipeline_event(
                session_id,
                "fetch_content",
                PipelineStatus::Started,
                "Fetching content...",
                None,
            )
            .await;

        let FetchedPage {
            title,
            text,
            content_type,
            status,
        } = fetch::fetch_page(&self.client, url, &self.config).await?;
        if text.split_whitespace().next().is_none() {
            return Err(IngestError::EmptyContent);
        }

        self.registry
            .broadcast_pipeline_event(
                session_id,
                "fetch_content",
                PipelineStatus::Completed,
                &format!("Fetched: {title}"),
                Some(json!({"title": title})),
            )
            .await;

        self.registry
            .broadcast_pipeline_event(
                session_id,
                "extract_text",
                PipelineStatus::Started,
                "Extracting text...",
                None,
            )
            .await;
        let word_count = text.split_whitespace().count();
        self.registry
            .broadcast_pipeline_event(
                session_id,
                "extract_text",
                PipelineStatus::Completed,
                &format!("Extracted {word_count} words"),
                None,
            )
            .await;

        self.registry
            .broadcast_pipeline_event(
                session_id,
                "store_document",
                PipelineStatus::Started,
                "Storing in knowledge base...",
                None,
            )
            .await;

        let mut document = Document::new(
            session_id,
            user_id,
            &title,
            "url",
            Some(url.to_string()),
            text,
            METHOD_MARKUP,
            self.config.preview_max_chars,
        );
        if let Some(content_type) = content_type {
            document.extraction_method = format!("{METHOD_MARKUP} ({content_type}; {status})");
        }
        self.store.insert(&document).await?;

        self.registry
            .broadcast_pipeline_event(
                session_id,
                "complete",
                PipelineStatus::Completed,
                &format!("Document \"{title}\" added to session"),
                Some(json!({
                    "document_id": document.id,
                    "title": title,
                    "word_count": word_count,
                    "url": url,
                })),
            )
            .await;

        Ok(IngestOutcome {
            document_id: document.id,
            title,
            word_count,
            url: Some(url.to_string()),
            file_type: None,
        })
    }

    /// Ingest one uploaded file, narrating progress to the session.
    ///
    /// Unlike the URL path this runs on the synchronous request path:
    /// failures are broadcast and then propagated to the caller.
    #[instrument(skip(self, bytes), fields(session = session_id, size = bytes.len()))]
    pub async fn ingest_from_file(
        &self,
        bytes: &[u8],
        filename: &str,
        file_type: &str,
        session_id: &str,
        user_id: &str,
    ) -> Result<IngestOutcome, IngestError> {
        match self
            .run_file_pipeline(bytes, filename, file_type, session_id, user_id)
            .await
        {
            Ok(outcome) => {
                info!(filename, document = %outcome.document_id, "file ingested");
                Ok(outcome)
            }
            Err(err) => {
                error!(filename, error = %err, "file ingestion failed");
                self.registry
                    .broadcast_pipeline_event(
                        session_id,
                        "error",
                        PipelineStatus::Failed,
                        &format!("Failed to process file: {err}"),
                        Some(json!({"error": err.to_string(), "filename": filename})),
                    )
                    .await;
                Err(err)
            }
        }
    }

    async fn run_file_pipeline(
        &self,
        bytes: &[u8],
        filename: &str,
        file_type: &str,
        session_id: &str,
        user_id: &str,
    ) -> Result<IngestOutcome, IngestError> {
        if !is_supported(file_type) {
            return Err(IngestError::UnsupportedFileType(file_type.to_string()));
        }

        self.registry
            .broadcast_pipeline_event(
                session_id,
                "upload",
                PipelineStatus::Started,
                &format!("Uploading {filename}..."),
                None,
            )
            .await;

        self.registry
            .broadcast_pipeline_event(
                session_id,
                "extract_text",
                PipelineStatus::Started,
                &format!("Extracting text from {}...", file_type.to_uppercase()),
                None,
            )
            .await;

        let text = extract_file_text(bytes, file_type)?;
        if text.split_whitespace().next().is_none() {
            return Err(IngestError::EmptyContent);
        }
        let word_count = text.split_whitespace().count();

        self.registry
            .broadcast_pipeline_event(
                session_id,
                "extract_text",
                PipelineStatus::Completed,
                &format!("Extracted {word_count} words"),
                None,
            )
            .await;

        self.registry
            .broadcast_pipeline_event(
                session_id,
                "store_document",
                PipelineStatus::Started,
                "Storing document...",
                None,
            )
            .await;

        let document = Document::new(
            session_id,
            user_id,
            filename,
            file_type,
            None,
            text,
            METHOD_DIRECT,
            self.config.preview_max_chars,
        );
        self.store.insert(&document).await?;

        self.registry
            .broadcast_pipeline_event(
                session_id,
                "complete",
                PipelineStatus::Completed,
                &format!("Document \"{filename}\" added to session"),
                Some(json!({
                    "document_id": document.id,
                    "title": filename,
                    "word_count": word_count,
                    "file_type": file_type,
                })),
            )
            .await;

        Ok(IngestOutcome {
            document_id: document.id,
            title: filename.to_string(),
            word_count,
            url: None,
            file_type: Some(file_type.to_string()),
        })
    }
}
