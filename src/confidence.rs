//! Confidence scoring for pipeline results.

use crate::document::SearchResult;
use crate::grading::GradedContext;

/// Derives a single scalar in `[0, 1]` from retrieval similarity and the
/// grading outcome.
///
/// Policy: confidence is the similarity of the top-ranked *relevant* chunk,
/// or 0 when no chunk was labeled relevant. The value is additionally capped
/// at the maximum similarity seen in the retrieval result, so confidence can
/// never exceed what retrieval actually observed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// Score a pipeline run.
    pub fn score(&self, results: &[SearchResult], graded: &GradedContext) -> f32 {
        let Some(top_relevant) = graded.top_relevant_score() else {
            return 0.0;
        };
        let max_retrieved =
            results.iter().map(|r| r.score).fold(0.0_f32, f32::max).clamp(0.0, 1.0);
        top_relevant.clamp(0.0, 1.0).min(max_retrieved)
    }
}
