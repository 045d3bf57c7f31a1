//! Embedding provider trait and lazy initialization wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::Result;

/// A provider that maps text to a fixed-dimension vector.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// The dimension reported by [`dimensions`](EmbeddingProvider::dimensions)
/// is fixed per deployment; a vector index only accepts embeddings of the
/// dimension it was created with.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ProviderError`](crate::error::RagError::ProviderError)
    /// on backend failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// The factory closure used by [`LazyEmbeddingProvider`].
pub type EmbeddingFactory =
    dyn Fn() -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync + 'static;

/// Defers construction of an [`EmbeddingProvider`] until first use.
///
/// Client construction often requires credentials; wrapping it here means a
/// missing key fails the first real call with a
/// [`ProviderError`](crate::error::RagError::ProviderError) instead of
/// failing process start. Initialization is guarded by a one-time-init
/// primitive, so concurrent first calls cannot double-construct the client;
/// a failed construction is retried on the next call.
///
/// The embedding dimension must be declared up front because it is fixed per
/// deployment and is needed (for collection creation) before the client
/// exists.
pub struct LazyEmbeddingProvider {
    dimensions: usize,
    cell: OnceCell<Arc<dyn EmbeddingProvider>>,
    factory: Box<EmbeddingFactory>,
}

impl LazyEmbeddingProvider {
    /// Create a lazy provider with the given deployment dimension and
    /// fallible constructor.
    pub fn new(
        dimensions: usize,
        factory: impl Fn() -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync + 'static,
    ) -> Self {
        Self { dimensions, cell: OnceCell::new(), factory: Box::new(factory) }
    }

    /// Get the underlying provider, constructing it on first use.
    async fn provider(&self) -> Result<&Arc<dyn EmbeddingProvider>> {
        self.cell
            .get_or_try_init(|| async {
                debug!("constructing embedding provider on first use");
                (self.factory)()
            })
            .await
    }
}

#[async_trait]
impl EmbeddingProvider for LazyEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.provider().await?.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.provider().await?.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
