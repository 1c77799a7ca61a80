//! Embedding provider trait.
//!
//! The embedding model is an external black box: text in, vector out.
//! Concrete providers (OpenAI, Ollama, fastembed) live in the
//! `incident-recall` app crate; tests supply their own.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding providers.
///
/// Implementations may fail for any reason (unavailable, malformed
/// input). Callers in this crate never retry; each call is made exactly
/// once per operation.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
