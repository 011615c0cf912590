//! Conversation turns recorded by the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Chunk;

/// One completed query/response exchange
///
/// `context_chunks` is a snapshot of the window used for the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    pub response: String,
    #[serde(default)]
    pub context_chunks: Vec<Chunk>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
            context_chunks: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_context(mut self, chunks: Vec<Chunk>) -> Self {
        self.context_chunks = chunks;
        self
    }

    /// Query and response joined, for keyword extraction
    pub fn text(&self) -> String {
        format!("{} {}", self.query, self.response)
    }
}
