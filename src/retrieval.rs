//! Similarity retrieval seam between the chat pipeline and the document store.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RetrievalConfig;
use crate::db::DbPool;
use crate::documents::{similar_passages, Passage};
use crate::error::ProviderError;

#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Passages most similar to the query, best first.
    async fn retrieve(&self, query_embedding: &[f32]) -> Result<Vec<Passage>, ProviderError>;
}

/// Retriever backed by the sqlite-vec document store.
pub struct SqliteRetriever {
    pool: Arc<DbPool>,
    top_k: usize,
    threshold: f64,
}

impl SqliteRetriever {
    pub fn new(pool: Arc<DbPool>, config: &RetrievalConfig) -> Self {
        Self {
            pool,
            top_k: config.top_k,
            threshold: config.similarity_threshold,
        }
    }
}

#[async_trait]
impl ContextRetriever for SqliteRetriever {
    async fn retrieve(&self, query_embedding: &[f32]) -> Result<Vec<Passage>, ProviderError> {
        let embedding = query_embedding.to_vec();
        let (top_k, threshold) = (self.top_k, self.threshold);

        let passages = self
            .pool
            .run(move |conn| similar_passages(conn, &embedding, top_k, threshold))
            .await?;

        tracing::debug!(passages = passages.len(), top_k, threshold, "retrieved context");
        Ok(passages)
    }
}
