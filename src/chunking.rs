//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`FixedSizeChunker`], which
//! splits documents into overlapping fixed-size segments so that context
//! spanning a chunk boundary survives in at least one chunk.

use crate::config::PipelineConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations are pure transforms: they produce [`Chunk`]s covering the
/// entire input with no gaps, in document order, and have no side effects.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into fixed-size chunks by character count with a fixed overlap.
///
/// Every pair of consecutive chunks overlaps by exactly `chunk_overlap`
/// characters; only the final chunk may be shorter than `chunk_size`. A
/// document shorter than `chunk_size` produces exactly one chunk. Spans are
/// recorded as byte offsets aligned to `char` boundaries, so chunking is
/// safe on multi-byte text.
///
/// Chunk IDs are generated as `{document_id}_{index}`. Each chunk inherits
/// the parent document's metadata plus a `chunk_index` field.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from a validated [`PipelineConfig`].
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let text = &document.text;
        // Byte offset of each char boundary, plus the end of the text.
        let bounds: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let total_chars = bounds.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start_char = 0;
        let mut index = 0;

        loop {
            let end_char = (start_char + self.chunk_size).min(total_chars);
            let start = bounds[start_char];
            let end = bounds[end_char];

            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), index.to_string());

            chunks.push(Chunk {
                id: format!("{}_{index}", document.id),
                document_id: document.id.clone(),
                index,
                start,
                end,
                text: text[start..end].to_string(),
                metadata,
            });

            if end_char == total_chars {
                break;
            }
            start_char += step;
            index += 1;
        }

        chunks
    }
}
