//! The pipeline orchestrator: an explicit state machine sequencing
//! retrieve → grade → generate → score, plus the ingestion path.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragline::{Document, InMemoryVectorStore, PipelineConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(PipelineConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generation_provider(Arc::new(llm))
//!     .build()?;
//!
//! pipeline.create_collection("docs").await?;
//! pipeline.ingest("docs", &Document::new("d1", "The sky is blue.")).await?;
//! let result = pipeline.ask("docs", "What color is the sky?", 2).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::PipelineConfig;
use crate::confidence::ConfidenceScorer;
use crate::document::{Chunk, Document, IndexEntry};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{AnswerGenerator, GenerationProvider, REFUSAL_SENTINEL};
use crate::grading::{GradedContext, RelevanceGrader, ThresholdGrader};
use crate::retriever::Retriever;
use crate::vectorstore::VectorStore;

/// The named states of the query state machine.
///
/// Transitions are strictly sequential: `EmbeddingQuery → Retrieving →
/// Grading → Generating → Scoring → Done`, except that empty retrieval
/// skips `Grading` (grading an empty set is a no-op). `Failed` is a
/// terminal state reachable from any other; every failure is tagged with
/// the stage that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Embedding the question through the embedding provider.
    EmbeddingQuery,
    /// Searching the vector index with the query vector.
    Retrieving,
    /// Labeling retrieved chunks relevant or irrelevant.
    Grading,
    /// Generating the grounded answer.
    Generating,
    /// Deriving the confidence scalar.
    Scoring,
    /// The run completed and produced a [`PipelineResult`].
    Done,
    /// The run terminated with a stage-tagged error.
    Failed,
}

impl Stage {
    /// The stage name as it appears in error payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::EmbeddingQuery => "embedding_query",
            Stage::Retrieving => "retrieving",
            Stage::Grading => "grading",
            Stage::Generating => "generating",
            Stage::Scoring => "scoring",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_k() -> usize {
    PipelineConfig::default().top_k
}

/// A question as posed by an external transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    /// The natural-language question.
    pub question: String,
    /// Number of context chunks to retrieve.
    #[serde(default = "default_k")]
    pub k: usize,
}

/// The externally observable output of one pipeline run.
///
/// Immutable once constructed. The refusal sentinel with confidence 0 is a
/// successful result, not a failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineResult {
    /// The question that was asked.
    pub question: String,
    /// The number of chunks requested.
    pub k: usize,
    /// The generated answer, or the refusal sentinel.
    pub answer: String,
    /// The context strings actually supplied to the generator, in retrieval
    /// order.
    pub contexts: Vec<String>,
    /// Confidence in `[0, 1]`; never exceeds the best retrieval similarity.
    pub confidence: f32,
}

/// Read-only statistics about an indexed collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    /// The embedding dimension of the deployment.
    pub embedding_dimension: usize,
    /// Total chunks stored in the collection.
    pub total_chunks: usize,
}

/// The retrieval-and-grounding pipeline.
///
/// Holds the process-wide shared handles (vector store, providers) as
/// explicit injected dependencies; each `ask` call owns its own transient
/// state, so concurrent runs never share mutable request state. Construct
/// one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: PipelineConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    grader: Arc<dyn RelevanceGrader>,
    retriever: Retriever,
    generator: AnswerGenerator,
    scorer: ConfidenceScorer,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The embedding provider handle.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// The vector store handle.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Create a named collection sized for the configured embedding
    /// provider's dimension.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        self.store.create_collection(name, self.embedder.dimensions()).await
    }

    /// Delete a named collection and all its data.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        self.store.delete_collection(name).await
    }

    /// Statistics for a collection: the deployment's embedding dimension and
    /// the total number of stored chunks.
    pub async fn stats(&self, collection: &str) -> Result<IndexStats> {
        Ok(IndexStats {
            embedding_dimension: self.embedder.dimensions(),
            total_chunks: self.store.count(collection).await?,
        })
    }

    /// Ingest a single document: chunk → embed → upsert.
    ///
    /// Re-ingesting a document replaces its chunks in the index (upsert is
    /// idempotent by chunk ID). Returns the chunks that were stored.
    ///
    /// # Errors
    ///
    /// Propagates [`RagError::ProviderError`] from embedding and the store's
    /// error from upsert; either aborts the ingest of this document.
    pub async fn ingest(&self, collection: &str, document: &Document) -> Result<Vec<Chunk>> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(chunks);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = match tokio::time::timeout(
            self.config.provider_timeout(),
            self.embedder.embed_batch(&texts),
        )
        .await
        {
            Ok(result) => result.map_err(|e| {
                error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
                e
            })?,
            Err(_) => {
                error!(document.id = %document.id, "embedding timed out during ingestion");
                return Err(RagError::ProviderError {
                    provider: "embedding".to_string(),
                    message: format!(
                        "batch embedding timed out after {:?}",
                        self.config.provider_timeout()
                    ),
                });
            }
        };

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        self.store.upsert(collection, &entries).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "upsert failed during ingestion");
            e
        })?;

        info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
        Ok(chunks)
    }

    /// Ingest an ordered sequence of documents.
    ///
    /// Returns all stored chunks. Stops at the first document that fails.
    pub async fn ingest_batch(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<Vec<Chunk>> {
        let mut all_chunks = Vec::new();
        for document in documents {
            all_chunks.extend(self.ingest(collection, document).await?);
        }
        Ok(all_chunks)
    }

    /// Answer a question from the indexed corpus.
    ///
    /// Runs the state machine and packages the result. The refusal sentinel
    /// (empty or insufficient context) is returned as a *success* with
    /// confidence 0; an unreachable index degrades to an explanatory answer
    /// with empty contexts and confidence 0.
    ///
    /// # Errors
    ///
    /// [`RagError::ValidationError`] for bad input (no stage runs);
    /// [`RagError::PipelineError`] tagged with the failing stage for any
    /// stage failure. No retries happen here — retry policy belongs to the
    /// caller.
    pub async fn ask(&self, collection: &str, question: &str, k: usize) -> Result<PipelineResult> {
        Retriever::validate(question, k)?;

        match self.run(collection, question, k).await {
            Ok(result) => Ok(result),
            Err((stage, e)) => {
                error!(stage = stage.as_str(), error = %e, "pipeline failed");
                Err(RagError::PipelineError {
                    stage: stage.as_str().to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Answer a transport-level [`QueryRequest`].
    pub async fn answer(&self, collection: &str, request: &QueryRequest) -> Result<PipelineResult> {
        self.ask(collection, &request.question, request.k).await
    }

    /// Walk the stages for one validated request.
    ///
    /// Within one run the stages are strictly sequential; the only
    /// suspension points are the provider/store boundary crossings, each of
    /// which carries a timeout and honors caller cancellation.
    async fn run(
        &self,
        collection: &str,
        question: &str,
        k: usize,
    ) -> std::result::Result<PipelineResult, (Stage, RagError)> {
        // EMBEDDING_QUERY
        debug!(stage = %Stage::EmbeddingQuery, "starting pipeline run");
        let query =
            self.retriever.embed_query(question).await.map_err(|e| (Stage::EmbeddingQuery, e))?;

        // RETRIEVING
        let results = match self.retriever.search(collection, &query, k).await {
            Ok(results) => results,
            Err(RagError::IndexUnavailableError { backend, message }) => {
                // Degraded mode: the outage is reported in the answer, not
                // as a crash.
                warn!(backend = %backend, message = %message, "index unavailable; degrading");
                return Ok(PipelineResult {
                    question: question.to_string(),
                    k,
                    answer: "The document index is currently unavailable; please try again later."
                        .to_string(),
                    contexts: Vec::new(),
                    confidence: 0.0,
                });
            }
            Err(e) => return Err((Stage::Retrieving, e)),
        };

        // GRADING (skipped when retrieval yielded nothing)
        let graded = if results.is_empty() {
            debug!(stage = %Stage::Grading, "no chunks retrieved; skipping grading");
            GradedContext::empty()
        } else {
            debug!(stage = %Stage::Grading, chunk_count = results.len(), "grading chunks");
            self.grader.grade(question, &results).await
        };
        let contexts = graded.relevant_texts();

        // GENERATING
        debug!(stage = %Stage::Generating, context_count = contexts.len(), "generating answer");
        let answer = match tokio::time::timeout(
            self.config.provider_timeout(),
            self.generator.generate(question, &contexts),
        )
        .await
        {
            Ok(result) => result.map_err(|e| (Stage::Generating, e))?,
            Err(_) => {
                return Err((
                    Stage::Generating,
                    RagError::GenerationError {
                        provider: self.generator.provider_name().to_string(),
                        message: format!(
                            "generation timed out after {:?}",
                            self.config.provider_timeout()
                        ),
                    },
                ));
            }
        };

        // SCORING: the refusal sentinel always carries confidence 0, so the
        // two can never disagree.
        let confidence = if answer == REFUSAL_SENTINEL {
            0.0
        } else {
            self.scorer.score(&results, &graded)
        };

        // DONE
        info!(
            stage = %Stage::Done,
            confidence,
            context_count = contexts.len(),
            "pipeline run completed"
        );
        Ok(PipelineResult { question: question.to_string(), k, answer, contexts, confidence })
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding provider, vector store, and generation provider are
/// required. The chunker and grader default to [`FixedSizeChunker`] and
/// [`ThresholdGrader`] built from the configuration; the configuration
/// itself defaults to [`PipelineConfig::default()`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<PipelineConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    generation: Option<Arc<dyn GenerationProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
    grader: Option<Arc<dyn RelevanceGrader>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the LLM generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation = Some(provider);
        self
    }

    /// Override the default fixed-size chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Override the default threshold grader (e.g. with a
    /// [`JudgeGrader`](crate::grading::JudgeGrader)).
    pub fn grader(mut self, grader: Arc<dyn RelevanceGrader>) -> Self {
        self.grader = Some(grader);
        self
    }

    /// Build the [`RagPipeline`], validating configuration and required
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required component is missing
    /// or the configuration is inconsistent.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let generation = self
            .generation
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;

        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::from_config(&config)?),
        };
        let grader: Arc<dyn RelevanceGrader> = match self.grader {
            Some(grader) => grader,
            None => Arc::new(ThresholdGrader::new(config.relevance_cutoff)?),
        };

        let retriever =
            Retriever::new(embedder.clone(), store.clone(), config.provider_timeout());
        let generator = AnswerGenerator::new(generation, config.temperature)
            .with_grounding_check(config.grounding_check);

        Ok(RagPipeline {
            config,
            embedder,
            store,
            chunker,
            grader,
            retriever,
            generator,
            scorer: ConfidenceScorer,
        })
    }
}
