//! Data types for documents, chunks, index entries, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The kind of source a document's raw text came from.
///
/// The core treats the document source (file reader, PDF extractor) as an
/// external collaborator that yields raw text; this tag only records where
/// the text originated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Plain text.
    #[default]
    Text,
    /// Text extracted from a PDF.
    Pdf,
}

/// A source document containing raw text and metadata.
///
/// Documents are created at ingestion and are immutable once chunked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The raw text content of the document.
    pub text: String,
    /// Where the text came from.
    pub source: SourceType,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a plain-text document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: SourceType::Text,
            metadata: HashMap::new(),
        }
    }

    /// Set the source type.
    pub fn with_source(mut self, source: SourceType) -> Self {
        self.source = source;
        self
    }
}

/// A bounded contiguous span of a document's text, the atomic unit of
/// retrieval.
///
/// Chunks are created once per document at ingestion and never mutated.
/// `start`/`end` are byte offsets into the parent document's text, always
/// aligned to `char` boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk (`{document_id}_{index}`).
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Zero-based position of this chunk within its document.
    pub index: usize,
    /// Byte offset of the start of this chunk's span.
    pub start: usize,
    /// Byte offset one past the end of this chunk's span.
    pub end: usize,
    /// The text content of the chunk.
    pub text: String,
    /// Metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
}

/// A (chunk, embedding) pair persisted in the vector index; the unit of
/// similarity search.
///
/// The embedding dimension must match the collection it is upserted into —
/// the store rejects mismatches, since distances across embedding models
/// are incomparable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The chunk this entry indexes.
    pub chunk: Chunk,
    /// The embedding vector for the chunk's text.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with its similarity score.
///
/// Scores are cosine similarity clamped to `[0, 1]`, directly usable as a
/// confidence signal (1 = identical direction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score in `[0, 1]` (higher is more relevant).
    pub score: f32,
}
