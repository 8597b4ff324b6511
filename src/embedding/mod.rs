//! Batch embedding client for the local embedding backend.
//!
//! Provides the [`EmbeddingBackend`] trait and the [`ollama::OllamaBackend`]
//! HTTP implementation. The backend produces fixed-dimension vectors; inputs
//! are prefixed with a task type so the same text embedded as a document and
//! as a query produces different vectors.

pub mod ollama;

pub use ollama::OllamaBackend;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Default embedding dimension (nomic-embed-text).
pub const DEFAULT_DIMENSIONS: usize = 768;

/// Task-type prefix applied to text before embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// Corpus text being indexed.
    SearchDocument,
    /// A user query at search time.
    SearchQuery,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::SearchDocument => "search_document",
            TaskType::SearchQuery => "search_query",
        }
    }

    /// The wire form: `"{task}: {text}"`.
    pub fn apply(&self, text: &str) -> String {
        format!("{}: {}", self.as_str(), text)
    }
}

/// Errors from the embedding backend.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding backend returned HTTP {status}")]
    Backend { status: u16 },

    #[error("embedding count mismatch: requested {expected}, got {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding request timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A backend that turns text into fixed-dimension vectors.
///
/// The batch call is the primary interface: one HTTP round-trip per note
/// rather than one per chunk.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts with the given task prefix.
    ///
    /// The result is index-aligned with the input and has the same length.
    /// An empty input returns an empty vec without any network call.
    /// `model` overrides the configured model for this call.
    async fn batch_embed(
        &self,
        texts: &[String],
        task: TaskType,
        model: Option<&str>,
    ) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Short-timeout liveness probe. Never errors.
    async fn health(&self) -> bool;

    /// Whether the backend's model listing contains `name`.
    async fn has_model(&self, name: &str) -> Result<bool, EmbedError>;

    /// Embed a single text.
    #[deprecated(note = "use batch_embed; kept for older call sites")]
    async fn embed_one(&self, text: &str, task: TaskType) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self
            .batch_embed(std::slice::from_ref(&text.to_string()), task, None)
            .await?;
        vectors.pop().ok_or(EmbedError::CountMismatch {
            expected: 1,
            got: 0,
        })
    }
}
