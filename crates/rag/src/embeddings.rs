//! Text Embeddings
//!
//! Reference embedder for tests and offline use. Production deployments plug
//! a model-backed [`Embedder`] in through the core trait.

use async_trait::async_trait;
use ragline_core::{Embedder, Result};

use crate::text;

/// Embedding configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Embedding dimension
    pub dimension: usize,
    /// Normalize embeddings
    pub normalize: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            normalize: true,
        }
    }
}

/// Feature-hashing embedder (no model required)
///
/// Each significant word increments one bucket, so texts sharing vocabulary
/// land close in cosine space. Deterministic across runs.
#[derive(Debug, Clone, Default)]
pub struct HashEmbedder {
    config: EmbeddingConfig,
}

impl HashEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config: EmbeddingConfig {
                dimension: config.dimension.max(1),
                ..config
            },
        }
    }

    /// Generate a hash-based embedding
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let dim = self.config.dimension;
        let mut embedding = vec![0.0f32; dim];

        for word in text::significant_words(text) {
            let idx = (fnv1a(word.as_bytes()) % dim as u64) as usize;
            embedding[idx] += 1.0;
        }

        if self.config.normalize {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        embedding
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn model_name(&self) -> &str {
        "feature-hash"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}
