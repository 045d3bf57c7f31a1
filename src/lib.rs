//! # ragline
//!
//! Grounded retrieval-augmented question answering over a document corpus.
//!
//! ## Overview
//!
//! `ragline` answers natural-language questions by retrieving the most
//! semantically relevant chunks of an ingested corpus and conditioning an
//! LLM's answer on that retrieved context, returning the answer alongside
//! the supporting excerpts and a confidence estimate. When the corpus does
//! not support an answer, the pipeline declines with a fixed refusal
//! sentinel instead of fabricating one.
//!
//! The crate is the pipeline core only: chunking, vector indexing/search,
//! retrieval, relevance grading, grounded generation, confidence scoring,
//! and the orchestration state machine. HTTP serving, CLI parsing, and
//! document parsing (PDF/text extraction) belong to external collaborators;
//! embedding and LLM backends plug in through the [`EmbeddingProvider`] and
//! [`GenerationProvider`] traits (an OpenAI implementation ships behind the
//! `openai` feature).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragline::{Document, InMemoryVectorStore, PipelineConfig, RagPipeline};
//! use ragline::openai::{OpenAIChatProvider, OpenAIEmbeddingProvider};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(PipelineConfig::default())
//!     .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_env()?))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generation_provider(Arc::new(OpenAIChatProvider::from_env()?))
//!     .build()?;
//!
//! pipeline.create_collection("docs").await?;
//! pipeline.ingest("docs", &Document::new("d1", "The sky is blue.")).await?;
//!
//! let result = pipeline.ask("docs", "What color is the sky?", 2).await?;
//! println!("{} (confidence {:.2})", result.answer, result.confidence);
//! ```

pub mod chunking;
pub mod config;
pub mod confidence;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod grading;
pub mod inmemory;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod retriever;
pub mod vectorstore;

pub use chunking::{Chunker, FixedSizeChunker};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use confidence::ConfidenceScorer;
pub use document::{Chunk, Document, IndexEntry, SearchResult, SourceType};
pub use embedding::{EmbeddingProvider, LazyEmbeddingProvider};
pub use error::{ErrorBody, RagError, Result};
pub use generation::{
    AnswerGenerator, GenerationProvider, LazyGenerationProvider, REFUSAL_SENTINEL,
};
pub use grading::{GradedChunk, GradedContext, JudgeGrader, RelevanceGrader, ThresholdGrader};
pub use inmemory::InMemoryVectorStore;
pub use pipeline::{
    IndexStats, PipelineResult, QueryRequest, RagPipeline, RagPipelineBuilder, Stage,
};
pub use retriever::{MAX_TOP_K, MIN_TOP_K, Retriever};
pub use vectorstore::{ScopedCollection, VectorStore};
