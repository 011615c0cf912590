//! Retrieval result types

use serde::{Deserialize, Serialize};

use crate::document::Chunk;

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    #[default]
    Semantic,
    Keyword,
    Hybrid,
    MultiQuery,
    Contextual,
}

/// A ranked chunk
///
/// `score` is algorithm-specific and only comparable within one result list.
/// `rank` is 1-based and assigned after final ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
    pub rank: usize,
    #[serde(default)]
    pub source: SearchSource,
}

impl SearchResult {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self {
            chunk,
            score,
            rank: 0,
            source: SearchSource::Semantic,
        }
    }

    pub fn id(&self) -> &str {
        &self.chunk.id
    }

    pub fn content(&self) -> &str {
        &self.chunk.content
    }
}

/// Assign 1-based ranks in current order
pub fn assign_ranks(results: &mut [SearchResult]) {
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }
}

/// A raw candidate returned by a vector store
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub chunk: Chunk,
    /// Backend similarity score
    pub raw_score: f32,
}

impl From<Candidate> for SearchResult {
    fn from(candidate: Candidate) -> Self {
        SearchResult::new(candidate.chunk, candidate.raw_score)
    }
}
