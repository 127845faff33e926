//! Context assembly: render a session's documents into one citable block.
//!
//! Every document flagged for inclusion is chunked into overlapping word
//! windows and rendered with a bracketed citation id per chunk, so a
//! presentation layer can resolve LLM-cited text back to its source
//! document and word range through the returned mapping.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::chunker::{self, ChunkError};
use crate::store::{Document, DocumentStore, StoreError};

/// Resolves one citation id back to its source document and word range.
///
/// Ids take the form `doc<k>_chunk<i>` where `k` is the document's 1-based
/// ordinal in the assembled context and `i` the 0-based chunk index. They
/// are unique within one assembly pass, not across passes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    pub chunk_id: String,
    pub document_id: String,
    pub document_ordinal: usize,
    pub filename: String,
    pub file_type: String,
    pub url: Option<String>,
    pub start_word: usize,
    pub end_word: usize,
}

/// The rendered context block plus its flat citation mapping.
#[derive(Clone, Debug, Default)]
pub struct AssembledContext {
    pub text: String,
    pub citations: Vec<Citation>,
    pub document_count: usize,
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Chunking(#[from] ChunkError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Assemble the context block for a session.
///
/// Documents are taken in creation order; a session without included
/// documents yields the empty default, not an error.
#[instrument(skip(store), fields(session = session_id))]
pub async fn assemble_context(
    store: &dyn DocumentStore,
    session_id: &str,
    window: usize,
    overlap: usize,
) -> Result<AssembledContext, ContextError> {
    let documents = store.context_documents(session_id).await?;
    if documents.is_empty() {
        return Ok(AssembledContext::default());
    }
    render_context(&documents, window, overlap)
}

/// Pure rendering step, split out so it can be tested without a store.
pub fn render_context(
    documents: &[Document],
    window: usize,
    overlap: usize,
) -> Result<AssembledContext, ContextError> {
    let mut parts = vec!["=== ATTACHED DOCUMENTS ===\n".to_string()];
    let mut citations = Vec::new();

    for (ordinal, document) in documents.iter().enumerate().map(|(i, d)| (i + 1, d)) {
        let chunks = chunker::chunk(&document.content, window, overlap)?;

        parts.push(format!(
            "\n--- Document {ordinal}: {} ---",
            document.filename
        ));
        if let Some(url) = &document.url {
            parts.push(format!("Source: {url}"));
        }
        parts.push(format!("Type: {}", document.file_type.to_uppercase()));
        parts.push(String::new());

        for chunk in chunks {
            let chunk_id = format!("doc{ordinal}_chunk{}", chunk.chunk_index);
            parts.push(format!("[{chunk_id}] {}\n", chunk.text));
            citations.push(Citation {
                chunk_id,
                document_id: document.id.clone(),
                document_ordinal: ordinal,
                filename: document.filename.clone(),
                file_type: document.file_type.clone(),
                url: document.url.clone(),
                start_word: chunk.start_word,
                end_word: chunk.end_word,
            });
        }

        parts.push("=".repeat(70));
    }

    Ok(AssembledContext {
        text: parts.join("\n"),
        citations,
        document_count: documents.len(),
    })
}
