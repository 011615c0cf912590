//! Query orchestration for the ragline context engine
//!
//! Features:
//! - [`RagEngine`]: retrieval, context assembly and generation per query
//! - Lightweight query analysis (intent, entities, keywords)
//! - Bounded conversation history
//! - Per-query metrics, running statistics and a batch evaluation harness
//! - Streaming queries and document ingestion
//!
//! Queries never fail past the engine boundary: backend failures become
//! degraded responses with zero confidence.

pub mod engine;
pub mod evaluation;
pub mod history;
pub mod stats;
pub mod query;
pub mod response;
pub mod telemetry;

pub use engine::{EngineConfig, IngestReport, QueryOptions, RagEngine};
pub use evaluation::{EvaluationCase, EvaluationReport, TestQuery};
pub use history::ConversationHistory;
pub use stats::{EngineStatistics, StatsRecorder};
pub use query::{QueryAnalysis, QueryAnalyzer, QueryIntent};
pub use response::{QueryState, RagResponse, ResponseMetadata, ResponseMetrics};
pub use telemetry::init_tracing;

use thiserror::Error;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Rag(#[from] ragline_rag::RagError),

    #[error(transparent)]
    Core(#[from] ragline_core::Error),

    #[error(transparent)]
    Config(#[from] ragline_config::ConfigError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl EngineError {
    /// Collapse into the shared taxonomy
    pub fn into_core(self) -> ragline_core::Error {
        match self {
            EngineError::InvalidInput(msg) => ragline_core::Error::InvalidInput(msg),
            EngineError::Rag(e) => e.into(),
            EngineError::Core(e) => e,
            EngineError::Config(e) => ragline_core::Error::InvalidInput(e.to_string()),
            EngineError::Telemetry(msg) => ragline_core::Error::Backend(msg),
        }
    }
}
