//! In-memory vector store using exact cosine similarity.
//!
//! [`InMemoryVectorStore`] is the default backend for development and tests:
//! exact search (no recall loss), insertion-order-stable tie-breaking, and
//! per-collection dimension enforcement. Concurrent upsert and search are
//! safe via a `tokio::sync::RwLock`, so ingestion and query paths may run
//! against it at the same time.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "in-memory";

/// One named collection: entries keyed by chunk ID, with the original
/// insertion order retained for stable tie-breaking.
struct Collection {
    dimensions: usize,
    order: Vec<String>,
    entries: HashMap<String, IndexEntry>,
}

impl Collection {
    fn new(dimensions: usize) -> Self {
        Self { dimensions, order: Vec::new(), entries: HashMap::new() }
    }
}

/// An in-memory vector store using cosine similarity for search.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine similarity of two vectors, clamped to `[0, 1]`.
///
/// Vectors are L2-normalized before the dot product; opposite-direction
/// vectors clamp to 0 rather than going negative, so scores are directly
/// usable as a confidence signal. Returns 0.0 if either vector has zero
/// magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

fn unavailable(collection: &str) -> RagError {
    RagError::IndexUnavailableError {
        backend: BACKEND.to_string(),
        message: format!("collection '{collection}' does not exist"),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(name) {
            if existing.dimensions != dimensions {
                return Err(RagError::StoreError {
                    backend: BACKEND.to_string(),
                    message: format!(
                        "collection '{name}' already exists with dimension {} (requested {dimensions})",
                        existing.dimensions
                    ),
                });
            }
            return Ok(());
        }
        debug!(collection = name, dimensions, "created collection");
        collections.insert(name.to_string(), Collection::new(dimensions));
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| unavailable(collection))?;
        // Validate the whole batch before touching storage so a rejected
        // batch leaves no partial write behind.
        for entry in entries {
            if entry.embedding.len() != store.dimensions {
                return Err(RagError::StoreError {
                    backend: BACKEND.to_string(),
                    message: format!(
                        "embedding dimension {} does not match collection dimension {}",
                        entry.embedding.len(),
                        store.dimensions
                    ),
                });
            }
        }
        for entry in entries {
            let id = entry.chunk.id.clone();
            if store.entries.insert(id.clone(), entry.clone()).is_none() {
                store.order.push(id);
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| unavailable(collection))?;
        if embedding.len() != store.dimensions {
            return Err(RagError::StoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "query dimension {} does not match collection dimension {}",
                    embedding.len(),
                    store.dimensions
                ),
            });
        }

        // Walk in insertion order; the stable sort below then breaks score
        // ties by that order.
        let mut scored: Vec<SearchResult> = store
            .order
            .iter()
            .filter_map(|id| store.entries.get(id))
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(&entry.embedding, embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| unavailable(collection))?;
        Ok(store.entries.len())
    }
}
