//! Query-time retrieval: validate, embed the question, search the index.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Minimum number of chunks a caller may request.
pub const MIN_TOP_K: usize = 1;
/// Maximum number of chunks a caller may request.
pub const MAX_TOP_K: usize = 10;

/// Embeds a question and searches the vector index for the most similar
/// chunks.
///
/// Both boundary crossings (embedding provider, vector store) carry the
/// configured timeout; an elapsed timeout surfaces as a provider/store
/// error at that call site. Caller cancellation is honored at the same
/// awaits.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    timeout: Duration,
}

impl Retriever {
    /// Create a retriever over the given provider and store.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        timeout: Duration,
    ) -> Self {
        Self { embedder, store, timeout }
    }

    /// Validate caller input before any stage runs.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ValidationError`] if the question is empty or
    /// whitespace-only, or if `k` is outside `[1, 10]`.
    pub fn validate(question: &str, k: usize) -> Result<()> {
        if question.trim().is_empty() {
            return Err(RagError::ValidationError(
                "question must not be empty or whitespace-only".to_string(),
            ));
        }
        if !(MIN_TOP_K..=MAX_TOP_K).contains(&k) {
            return Err(RagError::ValidationError(format!(
                "k ({k}) must be in [{MIN_TOP_K}, {MAX_TOP_K}]"
            )));
        }
        Ok(())
    }

    /// Embed the question through the embedding provider.
    pub async fn embed_query(&self, question: &str) -> Result<Vec<f32>> {
        debug!(question_len = question.len(), "embedding query");
        match tokio::time::timeout(self.timeout, self.embedder.embed(question)).await {
            Ok(result) => result,
            Err(_) => {
                error!(timeout = ?self.timeout, "query embedding timed out");
                Err(RagError::ProviderError {
                    provider: "embedding".to_string(),
                    message: format!("embedding timed out after {:?}", self.timeout),
                })
            }
        }
    }

    /// Search the index with an already-embedded query vector.
    ///
    /// Returns at most `k` results in descending similarity order; if the
    /// index holds fewer than `k` entries, returns as many as exist.
    pub async fn search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let results = match tokio::time::timeout(
            self.timeout,
            self.store.search(collection, query, k),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                error!(collection, timeout = ?self.timeout, "index search timed out");
                return Err(RagError::IndexUnavailableError {
                    backend: "vector-store".to_string(),
                    message: format!("search timed out after {:?}", self.timeout),
                });
            }
        };
        debug!(collection, result_count = results.len(), "retrieved chunks");
        Ok(results)
    }

    /// Validate, embed, and search in one call.
    ///
    /// # Errors
    ///
    /// [`RagError::ValidationError`] for bad input,
    /// [`RagError::ProviderError`] if embedding fails, or the store's error
    /// if search fails.
    pub async fn retrieve(
        &self,
        collection: &str,
        question: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        Self::validate(question, k)?;
        let query = self.embed_query(question).await?;
        self.search(collection, &query, k).await
    }
}
