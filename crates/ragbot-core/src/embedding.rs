//! Embedding provider trait

use async_trait::async_trait;

use crate::Result;

/// Trait for embedding providers that convert text to vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of the vectors produced
    fn dimensions(&self) -> usize;

    /// Model name, persisted alongside the vectors
    fn model_name(&self) -> &str;
}
