//! Running engine statistics and derived quality estimates

use parking_lot::Mutex;
use ragline_core::ErrorKind;
use ragline_rag::text;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Snapshot returned by [`RagEngine::get_statistics`]
///
/// [`RagEngine::get_statistics`]: crate::RagEngine::get_statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStatistics {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    /// Over every query, failed ones included
    pub average_latency_ms: f64,
    /// Over successful, non-streamed queries
    pub average_confidence: f32,
    pub failures_by_kind: BTreeMap<String, u64>,
    pub documents_ingested: u64,
    pub chunks_ingested: u64,
    pub history_length: usize,
    pub cache_entries: usize,
}

#[derive(Debug, Default)]
struct Totals {
    queries: u64,
    failures: u64,
    latency_ms: u64,
    confidence_sum: f64,
    confidence_count: u64,
    failures_by_kind: BTreeMap<String, u64>,
    documents: u64,
    chunks: u64,
}

/// Thread-safe statistics accumulator
#[derive(Debug)]
pub struct StatsRecorder {
    totals: Mutex<Totals>,
    metrics_enabled: bool,
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl StatsRecorder {
    /// `metrics_enabled` also forwards counters to the `metrics` facade
    pub fn new(metrics_enabled: bool) -> Self {
        Self {
            totals: Mutex::new(Totals::default()),
            metrics_enabled,
        }
    }

    /// `confidence` is `None` for streamed answers
    pub fn record_success(&self, latency_ms: u64, confidence: Option<f32>) {
        {
            let mut totals = self.totals.lock();
            totals.queries += 1;
            totals.latency_ms += latency_ms;
            if let Some(confidence) = confidence {
                totals.confidence_sum += f64::from(confidence);
                totals.confidence_count += 1;
            }
        }
        if self.metrics_enabled {
            metrics::counter!("ragline_queries_total").increment(1);
        }
    }

    pub fn record_failure(&self, latency_ms: u64, kind: ErrorKind) {
        {
            let mut totals = self.totals.lock();
            totals.queries += 1;
            totals.failures += 1;
            totals.latency_ms += latency_ms;
            *totals.failures_by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
        if self.metrics_enabled {
            metrics::counter!("ragline_queries_total").increment(1);
            metrics::counter!("ragline_query_failures_total", "kind" => kind.to_string())
                .increment(1);
        }
    }

    pub fn record_ingest(&self, documents: u64, chunks: u64) {
        let mut totals = self.totals.lock();
        totals.documents += documents;
        totals.chunks += chunks;
    }

    pub fn snapshot(&self, history_length: usize, cache_entries: usize) -> EngineStatistics {
        let totals = self.totals.lock();
        EngineStatistics {
            total_queries: totals.queries,
            successful_queries: totals.queries - totals.failures,
            failed_queries: totals.failures,
            average_latency_ms: if totals.queries == 0 {
                0.0
            } else {
                totals.latency_ms as f64 / totals.queries as f64
            },
            average_confidence: if totals.confidence_count == 0 {
                0.0
            } else {
                (totals.confidence_sum / totals.confidence_count as f64) as f32
            },
            failures_by_kind: totals.failures_by_kind.clone(),
            documents_ingested: totals.documents,
            chunks_ingested: totals.chunks,
            history_length,
            cache_entries,
        }
    }
}

/// Share of the answer's significant words found in the context
///
/// An estimate used when the generator reports no grounding score. An
/// answer with no significant words scores 1.0.
pub fn factual_consistency(answer: &str, context: &[String]) -> f32 {
    let claims: HashSet<String> = text::significant_words(answer).into_iter().collect();
    if claims.is_empty() {
        return 1.0;
    }
    let grounded: HashSet<String> = context
        .iter()
        .flat_map(|c| text::words(c))
        .collect();
    claims.iter().filter(|w| grounded.contains(*w)).count() as f32 / claims.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_aggregate() {
        let stats = StatsRecorder::new(false);
        stats.record_success(100, Some(0.8));
        stats.record_success(200, Some(0.4));
        stats.record_success(50, None);
        stats.record_failure(10, ErrorKind::RetrievalFailed);
        stats.record_ingest(2, 7);

        let snapshot = stats.snapshot(3, 5);
        assert_eq!(snapshot.total_queries, 4);
        assert_eq!(snapshot.successful_queries, 3);
        assert_eq!(snapshot.failed_queries, 1);
        assert!((snapshot.average_latency_ms - 90.0).abs() < 1e-9);
        assert!((snapshot.average_confidence - 0.6).abs() < 1e-6);
        assert_eq!(snapshot.failures_by_kind.get("retrieval_failed"), Some(&1));
        assert_eq!(snapshot.documents_ingested, 2);
        assert_eq!(snapshot.chunks_ingested, 7);
        assert_eq!(snapshot.history_length, 3);
        assert_eq!(snapshot.cache_entries, 5);
    }

    #[test]
    fn test_empty_statistics() {
        let snapshot = StatsRecorder::default().snapshot(0, 0);
        assert_eq!(snapshot.total_queries, 0);
        assert_eq!(snapshot.average_latency_ms, 0.0);
        assert_eq!(snapshot.average_confidence, 0.0);
    }

    #[test]
    fn test_factual_consistency() {
        let context = vec!["Tokio schedules async tasks on worker threads.".to_string()];
        assert_eq!(factual_consistency("Tokio schedules tasks.", &context), 1.0);
        assert!((factual_consistency("Tokio uses fibers.", &context) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(factual_consistency("It is.", &context), 1.0);
        assert_eq!(factual_consistency("Tokio", &[]), 0.0);
    }
}
