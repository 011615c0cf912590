//! Closed strategy families
//!
//! Every pluggable algorithm choice is a small enum so callers and config
//! files select by name and implementations match exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How documents are split into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    Fixed,
    #[default]
    Semantic,
    Recursive,
    Sliding,
    Hybrid,
}

impl ChunkingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Semantic => "semantic",
            Self::Recursive => "recursive",
            Self::Sliding => "sliding",
            Self::Hybrid => "hybrid",
        }
    }
}

/// Scoring applied to vector store candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingAlgorithm {
    #[default]
    Semantic,
    Bm25,
    TfIdf,
    LearningToRank,
}

impl RankingAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Bm25 => "bm25",
            Self::TfIdf => "tf_idf",
            Self::LearningToRank => "learning_to_rank",
        }
    }
}

/// Ordering applied before packing a context window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceStrategy {
    #[default]
    SemanticRelevance,
    Recency,
    Diversity,
    Coverage,
    Balanced,
}

/// Compression applied before packing a context window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMethod {
    #[default]
    None,
    Summarization,
    KeywordExtraction,
    EntityFiltering,
    RedundancyRemoval,
}

/// Temporal decay curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayFunction {
    Linear,
    #[default]
    Exponential,
    Logarithmic,
}

macro_rules! display_via_serde_name {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    match serde_json::to_value(self) {
                        Ok(serde_json::Value::String(name)) => f.write_str(&name),
                        _ => write!(f, "{:?}", self),
                    }
                }
            }
        )*
    };
}

display_via_serde_name!(
    ChunkingStrategy,
    RankingAlgorithm,
    RelevanceStrategy,
    CompressionMethod,
    DecayFunction
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(ChunkingStrategy::default(), ChunkingStrategy::Semantic);
        assert_eq!(RankingAlgorithm::default(), RankingAlgorithm::Semantic);
        assert_eq!(CompressionMethod::default(), CompressionMethod::None);
    }

    #[test]
    fn test_display_matches_serde_name() {
        assert_eq!(RankingAlgorithm::TfIdf.to_string(), "tf_idf");
        assert_eq!(RelevanceStrategy::SemanticRelevance.to_string(), "semantic_relevance");
        assert_eq!(ChunkingStrategy::Sliding.to_string(), ChunkingStrategy::Sliding.as_str());
    }

    #[test]
    fn test_deserialize_from_config_name() {
        let parsed: CompressionMethod = serde_json::from_str("\"redundancy_removal\"").unwrap();
        assert_eq!(parsed, CompressionMethod::RedundancyRemoval);
    }
}
