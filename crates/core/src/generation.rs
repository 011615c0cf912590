//! Generator request/response types

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationTurn;

/// Generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: usize,
    /// Ask the generator for follow-up questions
    #[serde(default)]
    pub follow_up_questions: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            follow_up_questions: true,
        }
    }
}

/// Input to a generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub query: String,
    /// Context chunk contents, in window order
    pub context: Vec<String>,
    /// Most recent turns, oldest first
    pub conversation_history: Vec<ConversationTurn>,
    #[serde(default)]
    pub options: GenerationOptions,
}

/// A citation of a context chunk
///
/// `index` is the 1-based position in the context the generator was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub index: usize,
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
}

impl Citation {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            chunk_id: None,
            document_id: None,
            excerpt: None,
        }
    }
}

/// Generator output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub answer: String,
    /// 0.0 - 1.0
    pub confidence: f32,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
    /// Generator's own grounding estimate, if it reports one
    #[serde(default)]
    pub factual_consistency: Option<f32>,
}

impl GenerationResponse {
    pub fn text(answer: impl Into<String>, confidence: f32) -> Self {
        Self {
            answer: answer.into(),
            confidence: confidence.clamp(0.0, 1.0),
            citations: Vec::new(),
            follow_up_questions: Vec::new(),
            factual_consistency: None,
        }
    }
}

/// Incremental streaming output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub content: String,
    pub done: bool,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            content: String::new(),
            done: true,
        }
    }
}
