//! Answer generation: the LLM capability contract and the grounded
//! [`AnswerGenerator`] built on top of it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// The fixed response text returned when no adequate context is found.
///
/// This is a *successful* answer with confidence 0, distinct from a pipeline
/// failure.
pub const REFUSAL_SENTINEL: &str = "Not found in document";

/// An LLM text-completion capability.
///
/// This is the narrow request/response contract the pipeline depends on; the
/// model implementation itself is an external collaborator.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// A short name identifying the backing provider, used in error payloads
    /// and logs.
    fn name(&self) -> &str;

    /// Complete a prompt at the given sampling temperature.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ProviderError`] on backend failure (timeout, rate
    /// limit, malformed response).
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;
}

/// The factory closure used by [`LazyGenerationProvider`].
pub type GenerationFactory =
    dyn Fn() -> Result<Arc<dyn GenerationProvider>> + Send + Sync + 'static;

/// Defers construction of a [`GenerationProvider`] until first use.
///
/// Mirrors [`LazyEmbeddingProvider`](crate::embedding::LazyEmbeddingProvider):
/// construction failure surfaces as a provider error at the first call site
/// and is retried on the next call; concurrent first calls are guarded by a
/// one-time-init primitive.
pub struct LazyGenerationProvider {
    name: String,
    cell: OnceCell<Arc<dyn GenerationProvider>>,
    factory: Box<GenerationFactory>,
}

impl LazyGenerationProvider {
    /// Create a lazy provider with the given display name and fallible
    /// constructor.
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn() -> Result<Arc<dyn GenerationProvider>> + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), cell: OnceCell::new(), factory: Box::new(factory) }
    }

    async fn provider(&self) -> Result<&Arc<dyn GenerationProvider>> {
        self.cell
            .get_or_try_init(|| async {
                debug!(provider = %self.name, "constructing generation provider on first use");
                (self.factory)()
            })
            .await
    }
}

#[async_trait]
impl GenerationProvider for LazyGenerationProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.provider().await?.complete(prompt, temperature).await
    }
}

/// Produces answers derivable only from the supplied context.
///
/// The grounding guarantee has two lines of defense: the prompt instructs
/// the model to answer from the context alone and to reply with the refusal
/// sentinel when the context is insufficient, and an optional post-hoc
/// word-overlap check replaces an answer sharing no content with the context
/// by the sentinel. Empty context short-circuits to the sentinel without a
/// provider call.
pub struct AnswerGenerator {
    provider: Arc<dyn GenerationProvider>,
    temperature: f32,
    grounding_check: bool,
}

impl AnswerGenerator {
    /// Create a generator over the given provider with a fixed temperature.
    pub fn new(provider: Arc<dyn GenerationProvider>, temperature: f32) -> Self {
        Self { provider, temperature, grounding_check: true }
    }

    /// Enable or disable the post-hoc grounding overlap check.
    pub fn with_grounding_check(mut self, enabled: bool) -> Self {
        self.grounding_check = enabled;
        self
    }

    /// The name of the backing provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Generate a grounded answer from the question and the ordered relevant
    /// context texts.
    ///
    /// Returns [`REFUSAL_SENTINEL`] without calling the provider when
    /// `context` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationError`] on provider failure. This is
    /// terminal for the request, never silently swallowed.
    pub async fn generate(&self, question: &str, context: &[String]) -> Result<String> {
        if context.is_empty() {
            debug!("no context supplied; returning refusal sentinel");
            return Ok(REFUSAL_SENTINEL.to_string());
        }

        let prompt = build_prompt(question, context);
        let answer =
            self.provider.complete(&prompt, self.temperature).await.map_err(|e| {
                RagError::GenerationError {
                    provider: self.provider.name().to_string(),
                    message: e.to_string(),
                }
            })?;

        let answer = answer.trim().to_string();
        if answer.is_empty() {
            warn!(provider = self.provider.name(), "provider returned an empty answer");
            return Ok(REFUSAL_SENTINEL.to_string());
        }

        if self.grounding_check
            && answer != REFUSAL_SENTINEL
            && !shares_content_words(&answer, context)
        {
            warn!(
                provider = self.provider.name(),
                "answer shares no content words with context; refusing"
            );
            return Ok(REFUSAL_SENTINEL.to_string());
        }

        Ok(answer)
    }
}

/// Build the grounded prompt sent to the generation provider.
fn build_prompt(question: &str, context: &[String]) -> String {
    let context_block = context.join("\n");
    format!(
        "Answer using ONLY the context below. If the context does not \
         contain the answer, reply exactly: {REFUSAL_SENTINEL}\n\n\
         Context:\n{context_block}\n\nQuestion:\n{question}"
    )
}

/// Minimum length for a word to count as content in the overlap check.
const CONTENT_WORD_LEN: usize = 4;

/// True if the answer shares at least one content word with the context.
fn shares_content_words(answer: &str, context: &[String]) -> bool {
    let context_words: std::collections::HashSet<String> = context
        .iter()
        .flat_map(|c| content_words(c))
        .collect();
    content_words(answer).any(|w| context_words.contains(&w))
}

fn content_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= CONTENT_WORD_LEN)
        .map(|w| w.to_lowercase())
}
