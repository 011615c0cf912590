//! Result ranking and list fusion
//!
//! BM25 and TF-IDF here are approximations: there is no global document
//! frequency index, so IDF uses document frequency within the candidate set
//! against an assumed corpus size.

use chrono::{DateTime, Utc};
use ragline_config::constants::ranking;
use ragline_core::{RankingAlgorithm, SearchResult};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::text;

/// Ranker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RankerConfig {
    /// BM25 term saturation
    pub k1: f32,
    /// BM25 length normalization
    pub b: f32,
    /// Assumed corpus size for IDF
    pub corpus_size: usize,
    /// Reciprocal rank fusion constant
    pub rrf_k: f32,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            k1: ranking::BM25_K1,
            b: ranking::BM25_B,
            corpus_size: ranking::ASSUMED_CORPUS_SIZE,
            rrf_k: ranking::RRF_K,
        }
    }
}

impl From<&ragline_config::SearchConfig> for RankerConfig {
    fn from(config: &ragline_config::SearchConfig) -> Self {
        Self {
            corpus_size: config.corpus_size,
            rrf_k: config.rrf_k,
            ..Self::default()
        }
    }
}

/// Re-scores and orders candidate lists
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    config: RankerConfig,
}

/// Sort by score, highest first, keeping input order on ties
pub fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

struct Tokenized {
    words: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Tokenized {
    fn new(content: &str) -> Self {
        let words = text::words(content);
        let mut counts = HashMap::new();
        for word in &words {
            *counts.entry(word.clone()).or_insert(0) += 1;
        }
        Self { words, counts }
    }

    fn tf(&self, term: &str) -> usize {
        self.counts.get(term).copied().unwrap_or(0)
    }

    fn len(&self) -> usize {
        self.words.len()
    }
}

fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text::significant_words(query)
        .into_iter()
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

impl Ranker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Re-score and sort
    pub fn rank(
        &self,
        algorithm: RankingAlgorithm,
        query: &str,
        results: Vec<SearchResult>,
    ) -> Vec<SearchResult> {
        self.rank_at(algorithm, query, results, Utc::now())
    }

    /// Re-score and sort with an explicit clock for freshness
    pub fn rank_at(
        &self,
        algorithm: RankingAlgorithm,
        query: &str,
        mut results: Vec<SearchResult>,
        now: DateTime<Utc>,
    ) -> Vec<SearchResult> {
        if results.is_empty() {
            return results;
        }

        match algorithm {
            RankingAlgorithm::Semantic => {},
            RankingAlgorithm::Bm25 => self.score_bm25(query, &mut results),
            RankingAlgorithm::TfIdf => self.score_tf_idf(query, &mut results),
            RankingAlgorithm::LearningToRank => self.score_ltr(query, &mut results, now),
        }

        sort_by_score(&mut results);
        results
    }

    fn idf(&self, term: &str, docs: &[Tokenized]) -> f32 {
        let n = self.config.corpus_size.max(docs.len()) as f32;
        let df = docs.iter().filter(|d| d.tf(term) > 0).count() as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score_bm25(&self, query: &str, results: &mut [SearchResult]) {
        let terms = query_terms(query);
        let docs: Vec<Tokenized> = results.iter().map(|r| Tokenized::new(r.content())).collect();

        let total_len: usize = docs.iter().map(Tokenized::len).sum();
        let avg_len = (total_len as f32 / docs.len() as f32).max(1.0);
        let idf: Vec<f32> = terms.iter().map(|t| self.idf(t, &docs)).collect();
        let (k1, b) = (self.config.k1, self.config.b);

        for (result, doc) in results.iter_mut().zip(&docs) {
            let norm = k1 * (1.0 - b + b * doc.len() as f32 / avg_len);
            result.score = terms
                .iter()
                .zip(&idf)
                .map(|(term, idf)| {
                    let tf = doc.tf(term) as f32;
                    idf * tf * (k1 + 1.0) / (tf + norm)
                })
                .sum();
        }
    }

    fn score_tf_idf(&self, query: &str, results: &mut [SearchResult]) {
        let terms = query_terms(query);
        let docs: Vec<Tokenized> = results.iter().map(|r| Tokenized::new(r.content())).collect();
        let idf: Vec<f32> = terms.iter().map(|t| self.idf(t, &docs)).collect();

        for (result, doc) in results.iter_mut().zip(&docs) {
            let len = doc.len().max(1) as f32;
            result.score = terms
                .iter()
                .zip(&idf)
                .map(|(term, idf)| doc.tf(term) as f32 / len * idf)
                .sum();
        }
    }

    /// Fixed-weight blend of semantic score, keyword overlap, input position,
    /// freshness and a length bonus
    fn score_ltr(&self, query: &str, results: &mut [SearchResult], now: DateTime<Utc>) {
        let terms = query_terms(query);

        for (position, result) in results.iter_mut().enumerate() {
            let doc_words: HashSet<String> = text::words(result.content()).into_iter().collect();
            let overlap = if terms.is_empty() {
                0.0
            } else {
                terms.iter().filter(|t| doc_words.contains(*t)).count() as f32 / terms.len() as f32
            };

            let position_score = 1.0 / (position as f32 + 1.0);

            let freshness = match result.chunk.metadata.created_at {
                Some(created) => {
                    let days = (now - created).num_seconds() as f32 / 86_400.0;
                    (1.0 - days / ranking::FRESHNESS_HORIZON_DAYS).clamp(0.0, 1.0)
                },
                None => 0.5,
            };

            let len = result.content().chars().count();
            let length_bonus = if (ranking::LTR_LENGTH_MIN..=ranking::LTR_LENGTH_MAX).contains(&len)
            {
                1.0
            } else {
                0.0
            };

            result.score = ranking::LTR_SEMANTIC * result.score
                + ranking::LTR_KEYWORD_OVERLAP * overlap
                + ranking::LTR_POSITION * position_score
                + ranking::LTR_FRESHNESS * freshness
                + ranking::LTR_LENGTH * length_bonus;
        }
    }

    /// Reciprocal rank fusion
    ///
    /// Each list contributes `1 / (k + position + 1)` per item, summed by
    /// chunk id. Ties keep first-appearance order.
    pub fn reciprocal_rank_fusion(&self, lists: &[Vec<SearchResult>]) -> Vec<SearchResult> {
        let k = self.config.rrf_k;
        fuse(lists, |_, position, _| 1.0 / (k + position as f32 + 1.0))
    }

    /// Weighted score fusion
    ///
    /// Scores are summed by chunk id, each list's score scaled by its weight.
    /// Missing or mismatched weights fall back to uniform.
    pub fn weighted_fusion(
        &self,
        lists: &[Vec<SearchResult>],
        weights: Option<&[f32]>,
    ) -> Vec<SearchResult> {
        if lists.is_empty() {
            return Vec::new();
        }

        let uniform = vec![1.0 / lists.len() as f32; lists.len()];
        let weights = match weights {
            Some(w) if w.len() == lists.len() => w,
            Some(w) => {
                tracing::warn!(
                    weights = w.len(),
                    lists = lists.len(),
                    "Fusion weight count mismatch, using uniform weights"
                );
                &uniform[..]
            },
            None => &uniform[..],
        };

        fuse(lists, |list, _, result| weights[list] * result.score)
    }
}

fn fuse<F>(lists: &[Vec<SearchResult>], contribution: F) -> Vec<SearchResult>
where
    F: Fn(usize, usize, &SearchResult) -> f32,
{
    let mut order: Vec<String> = Vec::new();
    let mut fused: HashMap<String, SearchResult> = HashMap::new();

    for (list_idx, list) in lists.iter().enumerate() {
        for (position, result) in list.iter().enumerate() {
            let score = contribution(list_idx, position, result);
            match fused.get_mut(result.id()) {
                Some(existing) => existing.score += score,
                None => {
                    order.push(result.id().to_string());
                    let mut entry = result.clone();
                    entry.score = score;
                    fused.insert(result.id().to_string(), entry);
                },
            }
        }
    }

    let mut results: Vec<SearchResult> = order
        .into_iter()
        .filter_map(|id| fused.remove(&id))
        .collect();
    sort_by_score(&mut results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ragline_core::Chunk;

    fn result(id: &str, content: &str, score: f32) -> SearchResult {
        SearchResult::new(Chunk::new(id, "doc", 0, content), score)
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.id()).collect()
    }

    #[test]
    fn test_semantic_sorts_stably() {
        let ranker = Ranker::default();
        let ranked = ranker.rank(
            RankingAlgorithm::Semantic,
            "q",
            vec![result("a", "x", 0.5), result("b", "y", 0.9), result("c", "z", 0.5)],
        );
        assert_eq!(ids(&ranked), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_bm25_prefers_term_matches() {
        let ranker = Ranker::default();
        let ranked = ranker.rank(
            RankingAlgorithm::Bm25,
            "rust ownership",
            vec![
                result("a", "Gardening needs water and sunlight every day.", 0.9),
                result("b", "Rust ownership rules prevent data races. Ownership is checked.", 0.1),
                result("c", "Rust is a systems language.", 0.5),
            ],
        );
        assert_eq!(ids(&ranked), vec!["b", "c", "a"]);
        assert_eq!(ranked[2].score, 0.0);
    }

    #[test]
    fn test_bm25_penalizes_long_documents() {
        let ranker = Ranker::default();
        let padding = " filler".repeat(40);
        let ranked = ranker.rank(
            RankingAlgorithm::Bm25,
            "tokio",
            vec![
                result("long", &format!("tokio{}", padding), 0.0),
                result("short", "tokio runtime", 0.0),
            ],
        );
        assert_eq!(ids(&ranked), vec!["short", "long"]);
    }

    #[test]
    fn test_tf_idf_normalizes_by_length() {
        let ranker = Ranker::default();
        let ranked = ranker.rank(
            RankingAlgorithm::TfIdf,
            "embeddings",
            vec![
                result("a", "embeddings are vectors with many other words around them", 0.0),
                result("b", "embeddings embeddings", 0.0),
            ],
        );
        assert_eq!(ids(&ranked), vec!["b", "a"]);
        assert!(ranked[0].score > 0.0);
    }

    #[test]
    fn test_ltr_blend() {
        let ranker = Ranker::default();
        let now = Utc::now();
        let mut fresh = result("fresh", &"vector search ".repeat(10), 0.5);
        fresh.chunk.metadata.created_at = Some(now);
        let mut stale = result("stale", "unrelated", 0.6);
        stale.chunk.metadata.created_at = Some(now - Duration::days(400));

        let ranked = ranker.rank_at(
            RankingAlgorithm::LearningToRank,
            "vector search",
            vec![stale, fresh],
            now,
        );

        // fresh: 0.4*0.5 + 0.2*1 + 0.2*0.5 + 0.1*1 + 0.1*1 = 0.7
        // stale: 0.4*0.6 + 0 + 0.2*1 + 0 + 0 = 0.44
        assert_eq!(ids(&ranked), vec!["fresh", "stale"]);
        assert!((ranked[0].score - 0.7).abs() < 1e-4);
        assert!((ranked[1].score - 0.44).abs() < 1e-4);
    }

    #[test]
    fn test_ltr_missing_date_is_neutral() {
        let ranker = Ranker::default();
        let ranked = ranker.rank(RankingAlgorithm::LearningToRank, "x", vec![result("a", "y", 0.0)]);
        // position 0.2 + freshness 0.05
        assert!((ranked[0].score - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_rrf_rewards_agreement() {
        let ranker = Ranker::default();
        let lists = vec![
            vec![result("1", "a", 0.9), result("2", "b", 0.8)],
            vec![result("2", "b", 0.85), result("3", "c", 0.7)],
        ];
        let fused = ranker.reciprocal_rank_fusion(&lists);

        assert_eq!(fused.len(), 3);
        assert_eq!(fused[0].id(), "2");
        let expected = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((fused[0].score - expected).abs() < 1e-6);
        assert_eq!(ids(&fused), vec!["2", "1", "3"]);
    }

    #[test]
    fn test_rrf_single_list_preserves_order() {
        let ranker = Ranker::default();
        // Input scores deliberately out of descending order
        let list = vec![
            result("low", "a", 0.1),
            result("high", "b", 0.9),
            result("mid", "c", 0.5),
            result("top", "d", 1.0),
        ];
        let fused = ranker.reciprocal_rank_fusion(&[list.clone()]);

        assert_eq!(ids(&fused), ids(&list));
        for (i, r) in fused.iter().enumerate() {
            let expected = 1.0 / (61.0 + i as f32);
            assert!((r.score - expected).abs() < 1e-6, "{} scored {}", r.id(), r.score);
        }
    }

    #[test]
    fn test_rrf_ties_keep_first_appearance() {
        let ranker = Ranker::default();
        let lists = vec![vec![result("x", "a", 0.1)], vec![result("y", "b", 0.9)]];
        let fused = ranker.reciprocal_rank_fusion(&lists);
        assert_eq!(ids(&fused), vec!["x", "y"]);
    }

    #[test]
    fn test_weighted_fusion() {
        let ranker = Ranker::default();
        let lists = vec![
            vec![result("a", "a", 1.0), result("b", "b", 0.4)],
            vec![result("a", "a", 0.5), result("c", "c", 1.0)],
        ];
        let fused = ranker.weighted_fusion(&lists, Some(&[0.7, 0.3]));

        assert_eq!(fused[0].id(), "a");
        assert!((fused[0].score - 0.85).abs() < 1e-6);
        assert!((fused[1].score - 0.3).abs() < 1e-6);
        assert_eq!(fused[1].id(), "c");
    }

    #[test]
    fn test_weighted_fusion_mismatch_uses_uniform() {
        let ranker = Ranker::default();
        let lists = vec![vec![result("a", "a", 1.0)], vec![result("b", "b", 0.5)]];
        let fused = ranker.weighted_fusion(&lists, Some(&[1.0]));
        assert!((fused[0].score - 0.5).abs() < 1e-6);
        assert!((fused[1].score - 0.25).abs() < 1e-6);
    }
}
