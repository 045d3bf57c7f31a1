//! End-to-end pipeline scenarios with fake providers: grounding, refusal,
//! confidence, degraded mode, and stage-tagged failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ragline::document::{IndexEntry, SearchResult};
use ragline::embedding::{EmbeddingProvider, LazyEmbeddingProvider};
use ragline::error::{RagError, Result};
use ragline::generation::{GenerationProvider, REFUSAL_SENTINEL};
use ragline::grading::JudgeGrader;
use ragline::inmemory::InMemoryVectorStore;
use ragline::pipeline::{QueryRequest, RagPipeline};
use ragline::retriever::Retriever;
use ragline::vectorstore::VectorStore;
use ragline::{Document, PipelineConfig};
use tokio::sync::Mutex;

/// Embeds known texts to fixed vectors; anything else gets the fallback.
struct StaticEmbedder {
    dim: usize,
    table: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl StaticEmbedder {
    fn new(dim: usize, pairs: Vec<(&str, Vec<f32>)>) -> Self {
        let mut fallback = vec![0.0; dim];
        fallback[0] = 1.0;
        Self {
            dim,
            table: pairs.into_iter().map(|(t, v)| (t.to_string(), v)).collect(),
            fallback,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.table.get(text).cloned().unwrap_or_else(|| self.fallback.clone()))
    }

    fn dimensions(&self) -> usize {
        self.dim
    }
}

/// Returns a canned answer and records every prompt it receives.
struct CannedGenerator {
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl CannedGenerator {
    fn new(answer: &str) -> Self {
        Self { answer: answer.to_string(), prompts: Mutex::new(Vec::new()) }
    }

    async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl GenerationProvider for CannedGenerator {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String> {
        self.prompts.lock().await.push(prompt.to_string());
        Ok(self.answer.clone())
    }
}

/// Always fails, like a provider outage.
struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        Err(RagError::ProviderError {
            provider: "failing".to_string(),
            message: "simulated outage".to_string(),
        })
    }
}

/// Judges a passage relevant iff it contains the needle.
struct NeedleJudge {
    needle: String,
}

#[async_trait]
impl GenerationProvider for NeedleJudge {
    fn name(&self) -> &str {
        "needle-judge"
    }

    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String> {
        let passage = prompt.split("Passage:").nth(1).unwrap_or("");
        Ok(if passage.contains(&self.needle) { "yes".to_string() } else { "no".to_string() })
    }
}

/// Never resolves, like a provider that hangs mid-request.
struct PendingEmbedder;

#[async_trait]
impl EmbeddingProvider for PendingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        std::future::pending().await
    }

    fn dimensions(&self) -> usize {
        2
    }
}

/// Never resolves, like a generation backend that hangs.
struct PendingGenerator;

#[async_trait]
impl GenerationProvider for PendingGenerator {
    fn name(&self) -> &str {
        "pending"
    }

    async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        std::future::pending().await
    }
}

/// A store whose searches hang forever; everything else succeeds.
struct PendingSearchStore;

#[async_trait]
impl VectorStore for PendingSearchStore {
    async fn create_collection(&self, _name: &str, _dimensions: usize) -> Result<()> {
        Ok(())
    }

    async fn delete_collection(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, _collection: &str, _entries: &[IndexEntry]) -> Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        _collection: &str,
        _embedding: &[f32],
        _top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        std::future::pending().await
    }

    async fn count(&self, _collection: &str) -> Result<usize> {
        Ok(0)
    }
}

const DOC_TEXT: &str = "The sky is blue. Grass is green.";
const PARIS_TEXT: &str = "The capital of France is Paris.";
const BANANA_TEXT: &str = "Bananas are a yellow fruit.";

fn wide_chunk_config() -> PipelineConfig {
    // chunk_size large enough that each test document stays in one chunk
    PipelineConfig::builder().chunk_size(400).chunk_overlap(50).build().unwrap()
}

fn two_doc_embedder() -> StaticEmbedder {
    // Query [1, 0]; Paris chunk scores ~0.9, banana chunk ~0.3
    StaticEmbedder::new(
        2,
        vec![
            ("What is the capital of France?", vec![1.0, 0.0]),
            (PARIS_TEXT, vec![0.9, (1.0f32 - 0.81).sqrt()]),
            (BANANA_TEXT, vec![0.3, (1.0f32 - 0.09).sqrt()]),
        ],
    )
}

fn build_pipeline(
    embedder: StaticEmbedder,
    generator: Arc<dyn GenerationProvider>,
    config: PipelineConfig,
) -> RagPipeline {
    RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .generation_provider(generator)
        .build()
        .unwrap()
}

#[tokio::test]
async fn answers_from_single_document_with_high_confidence() {
    let embedder = StaticEmbedder::new(
        2,
        vec![
            (DOC_TEXT, vec![1.0, 0.0]),
            ("What color is the sky?", vec![0.95, (1.0f32 - 0.9025).sqrt()]),
        ],
    );
    let generator = Arc::new(CannedGenerator::new("The sky is blue."));
    let pipeline = build_pipeline(embedder, generator.clone(), wide_chunk_config());

    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &Document::new("d1", DOC_TEXT)).await.unwrap();

    let result = pipeline.ask("docs", "What color is the sky?", 2).await.unwrap();

    assert!(result.answer.contains("blue"));
    assert!(result.confidence > 0.5);
    assert_eq!(result.contexts, vec![DOC_TEXT.to_string()]);
    assert_eq!(result.k, 2);
    assert_eq!(generator.prompts().await.len(), 1);
}

#[tokio::test]
async fn empty_index_returns_refusal_sentinel() {
    let generator = Arc::new(CannedGenerator::new("should never be used"));
    let pipeline = build_pipeline(
        StaticEmbedder::new(2, vec![]),
        generator.clone(),
        wide_chunk_config(),
    );
    pipeline.create_collection("docs").await.unwrap();

    let result = pipeline.ask("docs", "Anything?", 3).await.unwrap();

    assert_eq!(result.answer, REFUSAL_SENTINEL);
    assert!(result.contexts.is_empty());
    assert_eq!(result.confidence, 0.0);
    // Generation never reached the provider
    assert!(generator.prompts().await.is_empty());
}

#[tokio::test]
async fn empty_question_is_rejected_before_any_stage() {
    let generator = Arc::new(CannedGenerator::new("unused"));
    let pipeline = build_pipeline(
        StaticEmbedder::new(2, vec![]),
        generator.clone(),
        wide_chunk_config(),
    );
    pipeline.create_collection("docs").await.unwrap();

    let err = pipeline.ask("docs", "   ", 2).await.unwrap_err();
    assert!(matches!(err, RagError::ValidationError(_)));
    assert_eq!(err.error_body().stage, "validation");

    let err = pipeline.ask("docs", "ok", 11).await.unwrap_err();
    assert!(matches!(err, RagError::ValidationError(_)));

    assert!(generator.prompts().await.is_empty());
}

#[tokio::test]
async fn grading_cutoff_drops_weak_chunks_and_sets_confidence() {
    let generator = Arc::new(CannedGenerator::new("Paris is the capital of France."));
    let pipeline = build_pipeline(two_doc_embedder(), generator.clone(), wide_chunk_config());

    pipeline.create_collection("docs").await.unwrap();
    pipeline
        .ingest_batch(
            "docs",
            &[Document::new("paris", PARIS_TEXT), Document::new("banana", BANANA_TEXT)],
        )
        .await
        .unwrap();

    let result = pipeline.ask("docs", "What is the capital of France?", 2).await.unwrap();

    // Only the 0.9 chunk passes the 0.5 cutoff
    assert_eq!(result.contexts, vec![PARIS_TEXT.to_string()]);
    assert!((result.confidence - 0.9).abs() < 1e-3);

    // The generator saw the strong chunk and not the weak one
    let prompts = generator.prompts().await;
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(PARIS_TEXT));
    assert!(!prompts[0].contains(BANANA_TEXT));
}

#[tokio::test]
async fn confidence_never_exceeds_best_retrieval_score() {
    let generator = Arc::new(CannedGenerator::new("Paris is the capital of France."));
    let pipeline = build_pipeline(two_doc_embedder(), generator, wide_chunk_config());

    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &Document::new("paris", PARIS_TEXT)).await.unwrap();

    let result = pipeline.ask("docs", "What is the capital of France?", 5).await.unwrap();
    assert!(result.confidence <= 0.9 + 1e-3);
}

#[tokio::test]
async fn zero_relevant_chunks_forces_sentinel_and_zero_confidence() {
    let config = PipelineConfig::builder()
        .chunk_size(400)
        .chunk_overlap(50)
        .relevance_cutoff(0.99)
        .build()
        .unwrap();
    let generator = Arc::new(CannedGenerator::new("a fabricated answer"));
    let pipeline = build_pipeline(two_doc_embedder(), generator.clone(), config);

    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &Document::new("paris", PARIS_TEXT)).await.unwrap();

    let result = pipeline.ask("docs", "What is the capital of France?", 2).await.unwrap();

    // Grounding invariant: no relevant context means sentinel plus zero
    // confidence, and the provider is never consulted.
    assert_eq!(result.answer, REFUSAL_SENTINEL);
    assert_eq!(result.confidence, 0.0);
    assert!(result.contexts.is_empty());
    assert!(generator.prompts().await.is_empty());
}

#[tokio::test]
async fn judge_grader_filters_by_verdict() {
    let generator = Arc::new(CannedGenerator::new("Paris is the capital of France."));
    let judge = Arc::new(NeedleJudge { needle: "Paris".to_string() });
    let pipeline = RagPipeline::builder()
        .config(wide_chunk_config())
        .embedding_provider(Arc::new(two_doc_embedder()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .generation_provider(generator)
        .grader(Arc::new(JudgeGrader::new(judge)))
        .build()
        .unwrap();

    pipeline.create_collection("docs").await.unwrap();
    pipeline
        .ingest_batch(
            "docs",
            &[Document::new("paris", PARIS_TEXT), Document::new("banana", BANANA_TEXT)],
        )
        .await
        .unwrap();

    let result = pipeline.ask("docs", "What is the capital of France?", 2).await.unwrap();
    assert_eq!(result.contexts, vec![PARIS_TEXT.to_string()]);
}

#[tokio::test]
async fn judge_failure_fails_open_instead_of_aborting() {
    let generator = Arc::new(CannedGenerator::new("Paris is the capital of France."));
    let pipeline = RagPipeline::builder()
        .config(wide_chunk_config())
        .embedding_provider(Arc::new(two_doc_embedder()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .generation_provider(generator)
        .grader(Arc::new(JudgeGrader::new(Arc::new(FailingGenerator))))
        .build()
        .unwrap();

    pipeline.create_collection("docs").await.unwrap();
    pipeline
        .ingest_batch(
            "docs",
            &[Document::new("paris", PARIS_TEXT), Document::new("banana", BANANA_TEXT)],
        )
        .await
        .unwrap();

    // Both chunks kept relevant despite the judge outage; the pipeline
    // completes normally.
    let result = pipeline.ask("docs", "What is the capital of France?", 2).await.unwrap();
    assert_eq!(result.contexts.len(), 2);
    assert!((result.confidence - 0.9).abs() < 1e-3);
}

#[tokio::test]
async fn unavailable_index_degrades_instead_of_failing() {
    let generator = Arc::new(CannedGenerator::new("unused"));
    let pipeline = build_pipeline(
        StaticEmbedder::new(2, vec![]),
        generator,
        wide_chunk_config(),
    );

    // Collection never created: the store reports the index unavailable
    let result = pipeline.ask("missing", "Anything?", 2).await.unwrap();
    assert!(result.contexts.is_empty());
    assert_eq!(result.confidence, 0.0);
    assert!(result.answer.contains("unavailable"));
}

#[tokio::test]
async fn generation_failure_is_tagged_with_its_stage() {
    let pipeline = build_pipeline(
        two_doc_embedder(),
        Arc::new(FailingGenerator),
        wide_chunk_config(),
    );

    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &Document::new("paris", PARIS_TEXT)).await.unwrap();

    let err = pipeline.ask("docs", "What is the capital of France?", 2).await.unwrap_err();
    let body = err.error_body();
    assert_eq!(body.stage, "generating");
    assert!(!body.message.is_empty());
}

#[tokio::test]
async fn answer_handles_transport_request_shape() {
    let generator = Arc::new(CannedGenerator::new("Paris is the capital of France."));
    let pipeline = build_pipeline(two_doc_embedder(), generator, wide_chunk_config());

    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &Document::new("paris", PARIS_TEXT)).await.unwrap();

    let request: QueryRequest =
        serde_json::from_str(r#"{"question": "What is the capital of France?"}"#).unwrap();
    assert_eq!(request.k, 2); // default from config

    let result = pipeline.answer("docs", &request).await.unwrap();
    assert_eq!(result.question, request.question);
}

#[tokio::test]
async fn stats_reports_dimension_and_chunk_count() {
    let generator = Arc::new(CannedGenerator::new("unused"));
    let pipeline = build_pipeline(two_doc_embedder(), generator, wide_chunk_config());

    pipeline.create_collection("docs").await.unwrap();
    pipeline
        .ingest_batch(
            "docs",
            &[Document::new("paris", PARIS_TEXT), Document::new("banana", BANANA_TEXT)],
        )
        .await
        .unwrap();

    let stats = pipeline.stats("docs").await.unwrap();
    assert_eq!(stats.embedding_dimension, 2);
    assert_eq!(stats.total_chunks, 2);
}

#[tokio::test]
async fn reingesting_a_document_replaces_its_chunks() {
    let generator = Arc::new(CannedGenerator::new("unused"));
    let pipeline = build_pipeline(two_doc_embedder(), generator, wide_chunk_config());

    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &Document::new("paris", PARIS_TEXT)).await.unwrap();
    pipeline.ingest("docs", &Document::new("paris", PARIS_TEXT)).await.unwrap();

    assert_eq!(pipeline.stats("docs").await.unwrap().total_chunks, 1);
}

fn short_timeout_config() -> PipelineConfig {
    PipelineConfig::builder()
        .chunk_size(400)
        .chunk_overlap(50)
        .provider_timeout(Duration::from_millis(50))
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn hung_embedding_provider_times_out_with_its_stage() {
    let generator = Arc::new(CannedGenerator::new("unused"));
    let pipeline = RagPipeline::builder()
        .config(short_timeout_config())
        .embedding_provider(Arc::new(PendingEmbedder))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .generation_provider(generator.clone())
        .build()
        .unwrap();
    pipeline.create_collection("docs").await.unwrap();

    let err = pipeline.ask("docs", "Anything?", 2).await.unwrap_err();
    let body = err.error_body();
    assert_eq!(body.stage, "embedding_query");
    assert!(body.message.contains("timed out"));
    assert!(generator.prompts().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn retriever_maps_embed_timeout_to_provider_error() {
    let retriever = Retriever::new(
        Arc::new(PendingEmbedder),
        Arc::new(InMemoryVectorStore::new()),
        Duration::from_millis(50),
    );

    let err = retriever.embed_query("Anything?").await.unwrap_err();
    assert!(matches!(err, RagError::ProviderError { .. }));
}

#[tokio::test(start_paused = true)]
async fn hung_generation_provider_times_out_with_its_stage() {
    let pipeline = RagPipeline::builder()
        .config(short_timeout_config())
        .embedding_provider(Arc::new(two_doc_embedder()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .generation_provider(Arc::new(PendingGenerator))
        .build()
        .unwrap();

    pipeline.create_collection("docs").await.unwrap();
    pipeline.ingest("docs", &Document::new("paris", PARIS_TEXT)).await.unwrap();

    let err = pipeline.ask("docs", "What is the capital of France?", 2).await.unwrap_err();
    let body = err.error_body();
    assert_eq!(body.stage, "generating");
    assert!(body.message.contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn hung_index_search_times_out_into_degraded_response() {
    let generator = Arc::new(CannedGenerator::new("unused"));
    let pipeline = RagPipeline::builder()
        .config(short_timeout_config())
        .embedding_provider(Arc::new(StaticEmbedder::new(2, vec![])))
        .vector_store(Arc::new(PendingSearchStore))
        .generation_provider(generator.clone())
        .build()
        .unwrap();
    pipeline.create_collection("docs").await.unwrap();

    // A search that never comes back is treated as an unreachable index:
    // degraded answer rather than a crash.
    let result = pipeline.ask("docs", "Anything?", 2).await.unwrap();
    assert!(result.contexts.is_empty());
    assert_eq!(result.confidence, 0.0);
    assert!(result.answer.contains("unavailable"));
    assert!(generator.prompts().await.is_empty());
}

#[tokio::test]
async fn lazy_embedding_provider_initializes_once_and_retries_after_failure() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_in_factory = attempts.clone();

    let lazy = LazyEmbeddingProvider::new(2, move || {
        let n = attempts_in_factory.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            // First construction attempt fails, e.g. credentials missing
            Err(RagError::ProviderError {
                provider: "lazy".to_string(),
                message: "no credentials".to_string(),
            })
        } else {
            Ok(Arc::new(StaticEmbedder::new(2, vec![])) as Arc<dyn EmbeddingProvider>)
        }
    });

    // Dimensions are known before construction
    assert_eq!(lazy.dimensions(), 2);

    // First call surfaces the construction failure at the call site
    assert!(lazy.embed("hello").await.is_err());
    // Second call retries construction and succeeds
    assert!(lazy.embed("hello").await.is_ok());
    // Further calls reuse the constructed provider
    assert!(lazy.embed("again").await.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
