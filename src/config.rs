//! Configuration for the retrieval-and-grounding pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retriever::{MAX_TOP_K, MIN_TOP_K};

/// Configuration parameters for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Default number of chunks to retrieve when the caller does not choose.
    pub top_k: usize,
    /// Minimum similarity score for a retrieved chunk to be graded relevant
    /// by the default threshold grader.
    pub relevance_cutoff: f32,
    /// Sampling temperature for answer generation. Kept low and fixed so
    /// repeated calls with identical input are reproducible.
    pub temperature: f32,
    /// Timeout in milliseconds applied to every embedding, search, and
    /// generation boundary crossing.
    pub provider_timeout_ms: u64,
    /// Whether to run the post-hoc answer/context overlap check as a second
    /// line of defense for grounding.
    pub grounding_check: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            top_k: 2,
            relevance_cutoff: 0.5,
            temperature: 0.0,
            provider_timeout_ms: 30_000,
            grounding_check: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for constructing a [`PipelineConfig`].
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// The provider timeout as a [`Duration`].
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

/// Builder for constructing a validated [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the target chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the default number of chunks to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the relevance cutoff for the default threshold grader.
    pub fn relevance_cutoff(mut self, cutoff: f32) -> Self {
        self.config.relevance_cutoff = cutoff;
        self
    }

    /// Set the generation sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the timeout applied to provider and store boundary crossings.
    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.config.provider_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enable or disable the post-hoc grounding overlap check.
    pub fn grounding_check(mut self, enabled: bool) -> Self {
        self.config.grounding_check = enabled;
        self
    }

    /// Build the [`PipelineConfig`], validating that parameters are
    /// consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k` is outside `[1, 10]`
    /// - `relevance_cutoff` is outside `[0, 1]`
    /// - `temperature` is negative
    pub fn build(self) -> Result<PipelineConfig> {
        let config = self.config;
        if config.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if !(MIN_TOP_K..=MAX_TOP_K).contains(&config.top_k) {
            return Err(RagError::ConfigError(format!(
                "top_k ({}) must be in [{MIN_TOP_K}, {MAX_TOP_K}]",
                config.top_k
            )));
        }
        if !(0.0..=1.0).contains(&config.relevance_cutoff) {
            return Err(RagError::ConfigError(format!(
                "relevance_cutoff ({}) must be in [0, 1]",
                config.relevance_cutoff
            )));
        }
        if config.temperature < 0.0 {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must not be negative",
                config.temperature
            )));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn rejects_overlap_not_less_than_chunk_size() {
        let err = PipelineConfig::builder().chunk_size(100).chunk_overlap(100).build();
        assert!(matches!(err, Err(RagError::ConfigError(_))));
    }

    #[test]
    fn rejects_top_k_out_of_range() {
        assert!(PipelineConfig::builder().top_k(0).build().is_err());
        assert!(PipelineConfig::builder().top_k(11).build().is_err());
        assert!(PipelineConfig::builder().top_k(10).build().is_ok());
    }

    #[test]
    fn rejects_cutoff_out_of_range() {
        assert!(PipelineConfig::builder().relevance_cutoff(1.5).build().is_err());
    }
}
