//! Deterministic splitting of document text into overlapping word windows.
//!
//! Chunking is a pure function over the whitespace-separated word sequence:
//! the same input always produces the same chunks, so it can be re-run at
//! context-assembly time instead of persisting chunks alongside documents.

use thiserror::Error;

/// A contiguous word-range slice of a document's content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Offset of the first word, 0-based.
    pub start_word: usize,
    /// Offset one past the last word; the final chunk ends at the word count.
    pub end_word: usize,
    /// Sequential 0-based index within the document.
    pub chunk_index: usize,
}

/// Errors raised by chunking parameter validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk overlap {overlap} must be smaller than window size {window}")]
    OverlapTooLarge { window: usize, overlap: usize },
}

/// Split `text` into overlapping windows of up to `window` words.
///
/// Consecutive chunks share `overlap` words. A document of `window` words or
/// fewer produces exactly one chunk covering the whole text. `overlap` must
/// be strictly smaller than `window`; anything else would make the stride
/// non-positive and is rejected as a configuration error.
pub fn chunk(text: &str, window: usize, overlap: usize) -> Result<Vec<Chunk>, ChunkError> {
    if overlap >= window {
        return Err(ChunkError::OverlapTooLarge { window, overlap });
    }

    let words: Vec<&str> = text.split_whitespace().collect();

    if words.len() <= window {
        return Ok(vec![Chunk {
            text: text.to_string(),
            start_word: 0,
            end_word: words.len(),
            chunk_index: 0,
        }]);
    }

    let stride = window - overlap;
    let mut chunks = Vec::with_capacity(words.len().div_ceil(stride));
    let mut start = 0;
    while start < words.len() {
        let end = (start + window).min(words.len());
        chunks.push(Chunk {
            text: words[start..end].join(" "),
            start_word: start,
            end_word: end,
            chunk_index: chunks.len(),
        });
        start += stride;
    }

    Ok(chunks)
}
