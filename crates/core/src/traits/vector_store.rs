//! Vector database trait

use async_trait::async_trait;

use crate::document::Chunk;
use crate::filter::Filter;
use crate::search::Candidate;
use crate::Result;

/// Similarity query
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub filter: Option<Filter>,
    pub include_metadata: bool,
}

impl VectorQuery {
    pub fn new(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            vector,
            top_k,
            filter: None,
            include_metadata: true,
        }
    }

    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }
}

/// Persists chunk vectors and answers similarity queries
///
/// Chunks passed to `upsert` must carry an embedding.
#[async_trait]
pub trait VectorStore: Send + Sync + 'static {
    /// Candidates sorted by similarity, highest first
    async fn query(&self, query: VectorQuery) -> Result<Vec<Candidate>>;

    async fn upsert(&self, chunks: Vec<Chunk>) -> Result<()>;

    async fn delete(&self, ids: &[String]) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Chunk>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
