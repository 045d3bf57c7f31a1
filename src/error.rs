//! Error types for the `ragline` crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur across the retrieval-and-grounding pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Bad caller input (empty question, k out of range). Rejected before
    /// any pipeline stage runs.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Bad chunking/indexing/pipeline configuration. Fatal at construction
    /// time, never per-request.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An embedding or LLM capability provider failed (timeout, auth,
    /// rate limit, malformed response).
    #[error("Provider error ({provider}): {message}")]
    ProviderError {
        /// The capability provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Answer generation failed. Terminal for the request.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index backing store is unreachable. Degrades the response
    /// rather than crashing the process.
    #[error("Index unavailable ({backend}): {message}")]
    IndexUnavailableError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector store operation failed on reachable storage (e.g. a
    /// dimension mismatch between an embedding and its collection).
    #[error("Vector store error ({backend}): {message}")]
    StoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A pipeline stage failed. Carries the stage name so transports can
    /// build a structured `{stage, message}` error payload.
    #[error("Pipeline failed at stage '{stage}': {message}")]
    PipelineError {
        /// The stage that was executing when the failure occurred.
        stage: String,
        /// A user-safe description of the failure.
        message: String,
    },
}

/// A structured, user-safe error payload for external transports.
///
/// Failures are always surfaced in this shape, never as a raw backtrace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    /// The pipeline stage that failed, or `"validation"`/`"config"` for
    /// errors raised before any stage ran.
    pub stage: String,
    /// A user-safe description of the failure.
    pub message: String,
}

impl RagError {
    /// Convert this error into the `{stage, message}` payload that external
    /// transports return to callers.
    pub fn error_body(&self) -> ErrorBody {
        match self {
            RagError::PipelineError { stage, message } => {
                ErrorBody { stage: stage.clone(), message: message.clone() }
            }
            RagError::ValidationError(message) => {
                ErrorBody { stage: "validation".to_string(), message: message.clone() }
            }
            RagError::ConfigError(message) => {
                ErrorBody { stage: "config".to_string(), message: message.clone() }
            }
            other => ErrorBody { stage: "internal".to_string(), message: other.to_string() },
        }
    }
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
