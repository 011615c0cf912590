//! Retrieval pipeline for the ragline context engine
//!
//! Features:
//! - Document chunking (fixed, semantic, recursive, sliding, hybrid)
//! - Lightweight text analysis (keywords, entities, language, topics)
//! - Ranking (semantic, BM25, TF-IDF, learning-to-rank) and fusion (RRF, weighted)
//! - Semantic search with hybrid, multi-query, contextual and streaming variants
//! - TTL-bounded search result cache with background sweeping
//! - Token-budgeted context window assembly with compression
//! - Reference in-memory embedder and vector store

pub mod cache;
pub mod chunker;
pub mod compressor;
pub mod context;
pub mod embeddings;
pub mod ranker;
pub mod search;
pub mod text;
pub mod vector_store;

pub use cache::{CacheConfig, SearchCache};
pub use chunker::{BatchOutcome, Chunker, ChunkingOptions};
pub use compressor::TruncatingSummarizer;
pub use context::{
    ContextBuilder, ContextOptions, ContextSection, ContextWindow, TemporalOptions,
    WindowMetadata,
};
pub use embeddings::{EmbeddingConfig, HashEmbedder};
pub use ranker::{Ranker, RankerConfig};
pub use search::{SearchEngine, SearchEngineConfig, SearchOptions};
pub use vector_store::InMemoryVectorStore;

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),
}

impl From<RagError> for ragline_core::Error {
    fn from(err: RagError) -> Self {
        use ragline_core::Error;
        match err {
            RagError::InvalidInput(msg) | RagError::NotFound(msg) => Error::InvalidInput(msg),
            RagError::Cache(msg) => Error::Cache(msg),
            other => Error::RetrievalFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err: ragline_core::Error = RagError::Timeout(250).into();
        assert_eq!(err.kind(), ragline_core::ErrorKind::RetrievalFailed);
        assert!(err.to_string().contains("250ms"));

        let err: ragline_core::Error = RagError::InvalidInput("empty query".into()).into();
        assert_eq!(err, ragline_core::Error::InvalidInput("empty query".into()));
    }
}
