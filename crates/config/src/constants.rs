//! Centralized constants for the context engine
//!
//! Single source of truth for the default values and algorithm parameters
//! used across the chunker, ranker, search engine, context builder and
//! engine. Settings defaults and runtime option defaults both read these.

/// Chunking defaults (characters unless noted)
pub mod chunking {
    pub const CHUNK_SIZE: usize = 1000;

    pub const CHUNK_OVERLAP: usize = 200;

    pub const MIN_CHUNK_SIZE: usize = 100;

    pub const MAX_CHUNK_SIZE: usize = 2000;

    /// Documents processed concurrently by batch ingestion
    pub const BATCH_CONCURRENCY: usize = 4;

    /// Semantic merge threshold (Jaccard over topic words)
    pub const COHERENCE_THRESHOLD: f32 = 0.3;

    /// Significant words forming a coarse topic signature
    pub const TOPIC_WORDS: usize = 3;

    /// Keywords stored in chunk metadata
    pub const METADATA_KEYWORDS: usize = 10;
}

/// Ranking and fusion parameters
pub mod ranking {
    /// BM25 term saturation
    pub const BM25_K1: f32 = 1.2;

    /// BM25 length normalization
    pub const BM25_B: f32 = 0.75;

    /// Assumed corpus size for approximate IDF
    ///
    /// No global document-frequency index exists; IDF is computed against
    /// this fixed size with document frequency counted in the candidate set.
    pub const ASSUMED_CORPUS_SIZE: usize = 1000;

    /// Reciprocal rank fusion constant
    pub const RRF_K: f32 = 60.0;

    pub const SEMANTIC_WEIGHT: f32 = 0.7;

    pub const KEYWORD_WEIGHT: f32 = 0.3;

    /// Learning-to-rank blend weights
    pub const LTR_SEMANTIC: f32 = 0.4;
    pub const LTR_KEYWORD_OVERLAP: f32 = 0.2;
    pub const LTR_POSITION: f32 = 0.2;
    pub const LTR_FRESHNESS: f32 = 0.1;
    pub const LTR_LENGTH: f32 = 0.1;

    /// Content length (chars) earning the LTR length bonus
    pub const LTR_LENGTH_MIN: usize = 100;
    pub const LTR_LENGTH_MAX: usize = 1000;

    /// Age (days) at which LTR freshness reaches zero
    pub const FRESHNESS_HORIZON_DAYS: f32 = 365.0;
}

/// Search engine defaults
pub mod search {
    pub const MAX_RESULTS: usize = 10;

    /// Stream batch size
    pub const STREAM_BATCH_SIZE: usize = 5;

    /// Pause between stream batches (ms)
    pub const STREAM_DELAY_MS: u64 = 50;

    /// History turns used by contextual search
    pub const CONTEXTUAL_TURNS: usize = 3;

    /// Extra results fetched before contextual re-scoring
    pub const CONTEXTUAL_EXTRA_RESULTS: usize = 5;

    /// Contextual re-score blend
    pub const CONTEXTUAL_ORIGINAL_WEIGHT: f32 = 0.7;
    pub const CONTEXTUAL_OVERLAP_WEIGHT: f32 = 0.3;

    /// Keywords extracted from a query for keyword retrieval
    pub const QUERY_KEYWORDS: usize = 10;

    /// Deadline for each embedder/vector store call (ms)
    pub const BACKEND_TIMEOUT_MS: u64 = 10_000;
}

/// Search cache defaults
pub mod cache {
    pub const TTL_SECS: u64 = 300;

    pub const MAX_ENTRIES: usize = 1000;
}

/// Context builder defaults
pub mod context {
    pub const MAX_TOKENS: usize = 4000;

    /// Remaining budget (tokens) required before a truncated chunk is added
    pub const TRUNCATION_FLOOR_TOKENS: usize = 100;

    /// Placeholder summarization cap (chars)
    pub const SUMMARY_MAX_CHARS: usize = 500;

    pub const SUMMARY_MARKER: &str = "... [summarized]";

    /// Keywords kept by keyword-extraction compression
    pub const COMPRESSION_KEYWORDS: usize = 20;

    /// Balanced strategy blend
    pub const BALANCED_RELEVANCE: f32 = 0.5;
    pub const BALANCED_RECENCY: f32 = 0.3;
    pub const BALANCED_RANDOM: f32 = 0.2;

    /// Decay horizons (days)
    pub const LINEAR_DECAY_DAYS: f64 = 365.0;
    pub const EXPONENTIAL_DECAY_DAYS: f64 = 30.0;

    pub const DEFAULT_TIME_WEIGHT: f32 = 0.3;

    pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";
}

/// Engine defaults
pub mod engine {
    pub const MAX_CONVERSATION_HISTORY: usize = 10;

    pub const MAX_CONTEXT_LENGTH: usize = 4000;

    /// Turns passed to the generator
    pub const GENERATION_HISTORY_TURNS: usize = 3;

    /// Deadline for a generator call (ms)
    pub const GENERATION_TIMEOUT_MS: u64 = 30_000;

    pub const TEMPERATURE: f32 = 0.7;

    pub const MAX_GENERATION_TOKENS: usize = 1024;

    /// Answer prefix used as the related-documents query (chars)
    pub const RELATED_QUERY_CHARS: usize = 200;

    pub const RELATED_DOCUMENTS: usize = 3;

    /// Latency split estimate (fractions of total)
    pub const RETRIEVAL_LATENCY_SHARE: f64 = 0.3;
    pub const GENERATION_LATENCY_SHARE: f64 = 0.7;

    /// Evaluation thresholds
    pub const SUCCESS_CONFIDENCE: f32 = 0.5;
    pub const HALLUCINATION_CONSISTENCY: f32 = 0.5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hybrid_weights_sum_to_one() {
        assert!((ranking::SEMANTIC_WEIGHT + ranking::KEYWORD_WEIGHT - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ltr_weights_sum_to_one() {
        let sum = ranking::LTR_SEMANTIC
            + ranking::LTR_KEYWORD_OVERLAP
            + ranking::LTR_POSITION
            + ranking::LTR_FRESHNESS
            + ranking::LTR_LENGTH;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_chunk_bounds_ordered() {
        assert!(chunking::MIN_CHUNK_SIZE < chunking::CHUNK_SIZE);
        assert!(chunking::CHUNK_OVERLAP < chunking::CHUNK_SIZE);
        assert!(chunking::CHUNK_SIZE <= chunking::MAX_CHUNK_SIZE);
    }

    #[test]
    fn test_latency_shares() {
        assert!(
            (engine::RETRIEVAL_LATENCY_SHARE + engine::GENERATION_LATENCY_SHARE - 1.0).abs()
                < 1e-9
        );
    }
}
