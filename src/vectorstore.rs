//! Vector store trait for persisting and searching index entries.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::document::{IndexEntry, SearchResult};
use crate::error::Result;

/// A storage backend for embeddings with top-k similarity search.
///
/// Implementations manage named collections of [`IndexEntry`]s. Similarity
/// is cosine on the stored vectors, reported in `[0, 1]`. Backends may use
/// exact search or an approximate method as long as recall degradation is
/// bounded and documented.
///
/// An unreachable backing store surfaces as
/// [`RagError::IndexUnavailableError`](crate::error::RagError::IndexUnavailableError);
/// the pipeline converts that into a degraded response rather than a crash.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection for embeddings of the given dimension.
    /// No-op if an identical collection already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Upsert entries into a collection.
    ///
    /// Idempotent by chunk ID: re-upserting an existing ID replaces the
    /// prior vector and text, leaving exactly one entry.
    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Search for the `top_k` entries most similar to the given embedding.
    ///
    /// Returns results ordered by descending similarity, ties broken by
    /// original insertion order. Returns fewer than `top_k` results when the
    /// collection is smaller.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Total number of entries in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Scoped ownership of a named collection.
///
/// Couples collection creation with an explicit teardown step so shutdown
/// paths cannot forget the deletion. Deletion is async, so it cannot run in
/// `Drop`; dropping a guard that was never torn down logs a warning instead.
pub struct ScopedCollection {
    store: Arc<dyn VectorStore>,
    name: String,
    torn_down: bool,
}

impl ScopedCollection {
    /// Create the named collection and take scoped ownership of it.
    pub async fn create(
        store: Arc<dyn VectorStore>,
        name: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self> {
        let name = name.into();
        store.create_collection(&name, dimensions).await?;
        Ok(Self { store, name, torn_down: false })
    }

    /// The collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delete the collection, consuming the guard.
    pub async fn teardown(mut self) -> Result<()> {
        self.torn_down = true;
        self.store.delete_collection(&self.name).await
    }
}

impl Drop for ScopedCollection {
    fn drop(&mut self) {
        if !self.torn_down {
            warn!(collection = %self.name, "scoped collection dropped without teardown");
        }
    }
}
