//! Relevance grading of retrieved chunks.
//!
//! Two pluggable strategies, selected by configuration:
//!
//! - [`ThresholdGrader`] — a chunk is relevant iff its similarity score
//!   meets a cutoff. Deterministic; the default, and the one used in tests.
//! - [`JudgeGrader`] — a chunk is relevant iff an LLM judge answers yes.
//!   Fails open on provider failure so a grading outage never starves the
//!   generator of all context.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;

/// A retrieved chunk with its relevance label.
#[derive(Debug, Clone)]
pub struct GradedChunk {
    /// The retrieved chunk and its similarity score.
    pub result: SearchResult,
    /// Whether the grader judged the chunk on-topic for the question.
    pub relevant: bool,
}

/// The labeled outcome of grading a retrieval result.
///
/// Retains the retrieval order (descending similarity). Downstream code must
/// branch on [`has_relevant`](GradedContext::has_relevant): zero relevant
/// chunks is an explicit "no relevant context" signal, not merely an empty
/// list.
#[derive(Debug, Clone, Default)]
pub struct GradedContext {
    entries: Vec<GradedChunk>,
}

impl GradedContext {
    /// Build a graded context from labeled chunks.
    pub fn new(entries: Vec<GradedChunk>) -> Self {
        Self { entries }
    }

    /// The empty context, used when retrieval yielded nothing and grading
    /// was skipped.
    pub fn empty() -> Self {
        Self::default()
    }

    /// All labeled chunks, in retrieval order.
    pub fn entries(&self) -> &[GradedChunk] {
        &self.entries
    }

    /// True if at least one chunk was labeled relevant.
    pub fn has_relevant(&self) -> bool {
        self.entries.iter().any(|e| e.relevant)
    }

    /// The relevant chunks, in retrieval order.
    pub fn relevant(&self) -> impl Iterator<Item = &SearchResult> {
        self.entries.iter().filter(|e| e.relevant).map(|e| &e.result)
    }

    /// The texts of the relevant chunks, in retrieval order.
    pub fn relevant_texts(&self) -> Vec<String> {
        self.relevant().map(|r| r.chunk.text.clone()).collect()
    }

    /// The similarity score of the top-ranked relevant chunk, if any.
    pub fn top_relevant_score(&self) -> Option<f32> {
        self.relevant().next().map(|r| r.score)
    }
}

/// A strategy that labels retrieved chunks relevant or irrelevant.
///
/// Grading is infallible by contract: strategies that depend on a fallible
/// collaborator must absorb its failures (fail open) rather than abort the
/// pipeline.
#[async_trait]
pub trait RelevanceGrader: Send + Sync {
    /// Label each retrieved chunk for the given question.
    async fn grade(&self, question: &str, results: &[SearchResult]) -> GradedContext;
}

/// Labels a chunk relevant iff its similarity score meets a cutoff.
///
/// Deterministic given the same inputs.
#[derive(Debug, Clone)]
pub struct ThresholdGrader {
    cutoff: f32,
}

impl ThresholdGrader {
    /// Create a grader with the given cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the cutoff is outside `[0, 1]`.
    pub fn new(cutoff: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&cutoff) {
            return Err(RagError::ConfigError(format!("cutoff ({cutoff}) must be in [0, 1]")));
        }
        Ok(Self { cutoff })
    }
}

impl Default for ThresholdGrader {
    /// The conservative default cutoff of 0.5.
    fn default() -> Self {
        Self { cutoff: 0.5 }
    }
}

#[async_trait]
impl RelevanceGrader for ThresholdGrader {
    async fn grade(&self, _question: &str, results: &[SearchResult]) -> GradedContext {
        let entries = results
            .iter()
            .map(|result| GradedChunk {
                result: result.clone(),
                relevant: result.score >= self.cutoff,
            })
            .collect();
        GradedContext::new(entries)
    }
}

/// Labels a chunk relevant iff an LLM judge answers yes.
///
/// A failed judge call labels the chunk relevant (fail open) and logs a
/// warning; it never aborts the pipeline.
pub struct JudgeGrader {
    provider: Arc<dyn GenerationProvider>,
}

impl JudgeGrader {
    /// Create a judge over the given generation provider.
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    fn judge_prompt(question: &str, passage: &str) -> String {
        format!(
            "Does the following passage contain information that helps answer \
             the question? Reply with exactly 'yes' or 'no'.\n\n\
             Question:\n{question}\n\nPassage:\n{passage}"
        )
    }
}

#[async_trait]
impl RelevanceGrader for JudgeGrader {
    async fn grade(&self, question: &str, results: &[SearchResult]) -> GradedContext {
        let mut entries = Vec::with_capacity(results.len());
        for result in results {
            let prompt = Self::judge_prompt(question, &result.chunk.text);
            // Temperature 0: grading should be as reproducible as the judge allows.
            let relevant = match self.provider.complete(&prompt, 0.0).await {
                Ok(verdict) => {
                    let yes = verdict.trim().to_lowercase().starts_with("yes");
                    debug!(chunk.id = %result.chunk.id, verdict = %verdict.trim(), "judge verdict");
                    yes
                }
                Err(e) => {
                    warn!(
                        chunk.id = %result.chunk.id,
                        error = %e,
                        "judge provider failed; failing open (chunk kept as relevant)"
                    );
                    true
                }
            };
            entries.push(GradedChunk { result: result.clone(), relevant });
        }
        GradedContext::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Chunk;

    fn result(id: &str, score: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                id: id.to_string(),
                document_id: "d".to_string(),
                index: 0,
                start: 0,
                end: 0,
                text: format!("text of {id}"),
                metadata: HashMap::new(),
            },
            score,
        }
    }

    #[tokio::test]
    async fn threshold_grader_labels_by_cutoff() {
        let grader = ThresholdGrader::new(0.5).unwrap();
        let results = vec![result("a", 0.9), result("b", 0.5), result("c", 0.3)];
        let graded = grader.grade("q", &results).await;
        let labels: Vec<bool> = graded.entries().iter().map(|e| e.relevant).collect();
        assert_eq!(labels, vec![true, true, false]);
        assert_eq!(graded.top_relevant_score(), Some(0.9));
    }

    #[tokio::test]
    async fn threshold_grader_is_deterministic() {
        let grader = ThresholdGrader::default();
        let results = vec![result("a", 0.51), result("b", 0.49)];
        let first = grader.grade("q", &results).await;
        let second = grader.grade("q", &results).await;
        let labels = |g: &GradedContext| -> Vec<bool> {
            g.entries().iter().map(|e| e.relevant).collect()
        };
        assert_eq!(labels(&first), labels(&second));
    }

    #[test]
    fn threshold_grader_rejects_bad_cutoff() {
        assert!(ThresholdGrader::new(-0.1).is_err());
        assert!(ThresholdGrader::new(1.1).is_err());
    }

    #[test]
    fn empty_context_has_no_relevant_signal() {
        let graded = GradedContext::empty();
        assert!(!graded.has_relevant());
        assert!(graded.relevant_texts().is_empty());
        assert_eq!(graded.top_relevant_score(), None);
    }
}
