//! Embedding provider trait

use async_trait::async_trait;

use crate::Result;

/// Turns text into vectors
///
/// Implementations must be deterministic for identical input and model;
/// search result caching depends on it.
#[async_trait]
pub trait Embedder: Send + Sync + 'static {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts
    ///
    /// The default embeds sequentially. Backends with native batching should
    /// override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Model identifier for logging
    fn model_name(&self) -> &str;

    /// Vector dimensionality
    fn dimension(&self) -> usize;
}
