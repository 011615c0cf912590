//! Engine responses

use ragline_core::{Citation, Error, ErrorKind, SearchResult};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::query::{QueryAnalysis, QueryIntent};

/// Query pipeline state
///
/// States advance in declaration order; `Failed` is reachable from any
/// state before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    Received,
    QueryProcessed,
    Retrieved,
    ContextBuilt,
    Generated,
    HistoryUpdated,
    Done,
    Failed,
}

impl QueryState {
    /// Next state on success; terminal states stay put
    pub fn next(self) -> Self {
        match self {
            QueryState::Received => QueryState::QueryProcessed,
            QueryState::QueryProcessed => QueryState::Retrieved,
            QueryState::Retrieved => QueryState::ContextBuilt,
            QueryState::ContextBuilt => QueryState::Generated,
            QueryState::Generated => QueryState::HistoryUpdated,
            QueryState::HistoryUpdated => QueryState::Done,
            QueryState::Done => QueryState::Done,
            QueryState::Failed => QueryState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, QueryState::Done | QueryState::Failed)
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryState::Received => "received",
            QueryState::QueryProcessed => "query_processed",
            QueryState::Retrieved => "retrieved",
            QueryState::ContextBuilt => "context_built",
            QueryState::Generated => "generated",
            QueryState::HistoryUpdated => "history_updated",
            QueryState::Done => "done",
            QueryState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-query metrics
///
/// Retrieval and generation latencies are fixed shares of the total, not
/// measured sub-timings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetrics {
    pub total_latency_ms: u64,
    pub retrieval_latency_ms: u64,
    pub generation_latency_ms: u64,
    pub retrieved_count: usize,
    pub context_tokens: usize,
    /// Context tokens / context budget
    pub context_utilization: f32,
    pub response_relevance: f32,
    pub factual_consistency: f32,
}

/// Response metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub query_id: String,
    pub intent: QueryIntent,
    pub entities: Vec<String>,
    pub keywords: Vec<String>,
    /// Model that produced the answer
    pub model: Option<String>,
    /// Set on degraded responses
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// State the pipeline was in when it failed
    pub failed_at: Option<QueryState>,
}

/// Answer plus provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResponse {
    pub answer: String,
    /// Retrieved results, in rank order
    pub sources: Vec<SearchResult>,
    /// Context handed to the generator
    pub context: Vec<String>,
    pub confidence: f32,
    pub citations: Vec<Citation>,
    pub follow_up_questions: Vec<String>,
    /// Advisory lookups from the answer text
    pub related_documents: Vec<SearchResult>,
    pub metrics: ResponseMetrics,
    pub metadata: ResponseMetadata,
}

impl RagResponse {
    /// Error message as the answer, nothing retrieved, zero confidence
    pub fn degraded(
        query_id: impl Into<String>,
        analysis: Option<&QueryAnalysis>,
        error: &Error,
        failed_at: QueryState,
        total_latency_ms: u64,
    ) -> Self {
        let mut metadata = ResponseMetadata {
            query_id: query_id.into(),
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            failed_at: Some(failed_at),
            ..Default::default()
        };
        if let Some(analysis) = analysis {
            metadata.intent = analysis.intent;
            metadata.entities = analysis.entities.clone();
            metadata.keywords = analysis.keywords.clone();
        }

        Self {
            answer: error.to_string(),
            sources: Vec::new(),
            context: Vec::new(),
            confidence: 0.0,
            citations: Vec::new(),
            follow_up_questions: Vec::new(),
            related_documents: Vec::new(),
            metrics: ResponseMetrics {
                total_latency_ms,
                ..Default::default()
            },
            metadata,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.metadata.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_progression() {
        let mut state = QueryState::Received;
        let mut seen = vec![state];
        while !state.is_terminal() {
            state = state.next();
            seen.push(state);
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(seen.last(), Some(&QueryState::Done));
        assert_eq!(QueryState::Failed.next(), QueryState::Failed);
        assert_eq!(QueryState::ContextBuilt.to_string(), "context_built");
    }

    #[test]
    fn test_degraded_response() {
        let err = Error::RetrievalFailed("store offline".into());
        let response = RagResponse::degraded("q-1", None, &err, QueryState::QueryProcessed, 12);

        assert!(response.is_degraded());
        assert_eq!(response.confidence, 0.0);
        assert_eq!(response.answer, "Retrieval failed: store offline");
        assert!(response.sources.is_empty());
        assert_eq!(response.metadata.error_kind, Some(ErrorKind::RetrievalFailed));
        assert_eq!(response.metadata.failed_at, Some(QueryState::QueryProcessed));
        assert_eq!(response.metrics.total_latency_ms, 12);
        assert_eq!(response.metrics.context_tokens, 0);
    }

    #[test]
    fn test_response_serializes() {
        let err = Error::GenerationFailed("timeout".into());
        let response = RagResponse::degraded("q-2", None, &err, QueryState::ContextBuilt, 0);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["metadata"]["error_kind"], "generation_failed");
        assert_eq!(json["metadata"]["failed_at"], "context_built");
    }
}
