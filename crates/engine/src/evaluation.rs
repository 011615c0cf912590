//! Batch evaluation
//!
//! Aggregates per-query outcomes into the report returned by
//! [`RagEngine::evaluate_performance`].
//!
//! [`RagEngine::evaluate_performance`]: crate::RagEngine::evaluate_performance

use ragline_config::constants::engine as defaults;
use ragline_rag::text;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::response::RagResponse;

/// One evaluation query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestQuery {
    pub query: String,
    /// Reference answer for keyword overlap scoring
    #[serde(default)]
    pub expected_answer: Option<String>,
}

impl TestQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            expected_answer: None,
        }
    }

    pub fn with_expected(mut self, answer: impl Into<String>) -> Self {
        self.expected_answer = Some(answer.into());
        self
    }
}

/// Outcome of one evaluation query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCase {
    pub query: String,
    pub confidence: f32,
    pub latency_ms: u64,
    pub relevance: f32,
    pub factual_consistency: f32,
    /// Jaccard overlap with the expected answer's keywords
    pub answer_overlap: Option<f32>,
    pub error: Option<String>,
}

impl EvaluationCase {
    pub fn from_response(test: &TestQuery, response: &RagResponse) -> Self {
        Self {
            query: test.query.clone(),
            confidence: response.confidence,
            latency_ms: response.metrics.total_latency_ms,
            relevance: response.metrics.response_relevance,
            factual_consistency: response.metrics.factual_consistency,
            answer_overlap: test
                .expected_answer
                .as_deref()
                .map(|expected| answer_overlap(&response.answer, expected)),
            error: response.metadata.error.clone(),
        }
    }
}

/// Aggregate evaluation report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub total_queries: usize,
    pub mean_confidence: f32,
    pub mean_latency_ms: f64,
    pub mean_relevance: f32,
    pub mean_factual_consistency: f32,
    /// Over cases with an expected answer
    pub mean_answer_overlap: Option<f32>,
    /// Fraction with confidence above the success threshold
    pub success_rate: f32,
    /// Fraction with factual consistency below the hallucination threshold
    pub hallucination_rate: f32,
    pub cases: Vec<EvaluationCase>,
}

impl EvaluationReport {
    /// Degraded cases count with their zeroed scores
    pub fn from_cases(cases: Vec<EvaluationCase>) -> Self {
        if cases.is_empty() {
            return Self::default();
        }

        let n = cases.len() as f32;
        let mean = |f: fn(&EvaluationCase) -> f32| cases.iter().map(f).sum::<f32>() / n;
        let fraction = |f: fn(&EvaluationCase) -> bool| cases.iter().filter(|c| f(c)).count() as f32 / n;

        let overlaps: Vec<f32> = cases.iter().filter_map(|c| c.answer_overlap).collect();
        let mean_answer_overlap = (!overlaps.is_empty())
            .then(|| overlaps.iter().sum::<f32>() / overlaps.len() as f32);

        Self {
            total_queries: cases.len(),
            mean_confidence: mean(|c| c.confidence),
            mean_latency_ms: cases.iter().map(|c| c.latency_ms as f64).sum::<f64>()
                / cases.len() as f64,
            mean_relevance: mean(|c| c.relevance),
            mean_factual_consistency: mean(|c| c.factual_consistency),
            mean_answer_overlap,
            success_rate: fraction(|c| c.confidence > defaults::SUCCESS_CONFIDENCE),
            hallucination_rate: fraction(|c| c.factual_consistency < defaults::HALLUCINATION_CONSISTENCY),
            cases,
        }
    }
}

fn answer_overlap(answer: &str, expected: &str) -> f32 {
    let a: HashSet<String> = text::significant_words(answer).into_iter().collect();
    let b: HashSet<String> = text::significant_words(expected).into_iter().collect();
    let a: Vec<String> = a.into_iter().collect();
    let b: Vec<String> = b.into_iter().collect();
    text::jaccard(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(confidence: f32, consistency: f32, latency_ms: u64) -> EvaluationCase {
        EvaluationCase {
            query: "q".into(),
            confidence,
            latency_ms,
            relevance: confidence,
            factual_consistency: consistency,
            answer_overlap: None,
            error: None,
        }
    }

    #[test]
    fn test_report_aggregates() {
        let mut cases = vec![case(0.9, 0.8, 100), case(0.6, 0.3, 200), case(0.0, 0.0, 30)];
        cases[0].answer_overlap = Some(0.5);
        cases[2].error = Some("Retrieval failed: down".into());

        let report = EvaluationReport::from_cases(cases);

        assert_eq!(report.total_queries, 3);
        assert!((report.mean_confidence - 0.5).abs() < 1e-6);
        assert!((report.mean_latency_ms - 110.0).abs() < 1e-9);
        assert!((report.mean_relevance - 0.5).abs() < 1e-6);
        assert!((report.mean_factual_consistency - 11.0 / 30.0).abs() < 1e-6);
        assert_eq!(report.mean_answer_overlap, Some(0.5));
        assert!((report.success_rate - 2.0 / 3.0).abs() < 1e-6);
        assert!((report.hallucination_rate - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_report() {
        let report = EvaluationReport::from_cases(Vec::new());
        assert_eq!(report.total_queries, 0);
        assert_eq!(report.success_rate, 0.0);
        assert!(report.mean_answer_overlap.is_none());
    }

    #[test]
    fn test_answer_overlap() {
        assert_eq!(answer_overlap("Tokio runtime", "the tokio runtime"), 1.0);
        assert_eq!(answer_overlap("garden compost", "tokio runtime"), 0.0);
    }
}
