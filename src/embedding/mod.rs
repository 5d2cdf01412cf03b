//! Text-to-vector embedding.
//!
//! Provides the [`EmbeddingProvider`] trait and an OpenAI-compatible HTTP
//! implementation. The provider is created via [`create_provider`] from
//! configuration.

pub mod openai;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::ProviderError;

/// Trait for embedding text into vectors.
///
/// Implementations produce vectors of exactly [`EmbeddingProvider::dimensions`]
/// entries. Every call is attempted once; failures are returned to the caller.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::Parse("embedding response was empty".into()))
    }

    /// Embed a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;
}

pub fn create_provider(config: &EmbeddingConfig) -> Box<dyn EmbeddingProvider> {
    Box::new(openai::OpenAiEmbeddings::new(config))
}

/// Fail with [`ProviderError::Dimension`] unless every vector has `expected` entries.
pub(crate) fn check_dimensions(
    vectors: &[Vec<f32>],
    expected: usize,
) -> Result<(), ProviderError> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(bad) => Err(ProviderError::Dimension {
            expected,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}
