//! Core traits and types for the ragline context engine
//!
//! This crate provides the types shared by every other crate:
//! - Documents, chunks and search results
//! - Collaborator traits (embedder, vector store, generator, summarizer)
//! - Metadata filter tree
//! - Lifecycle events
//! - Token estimation
//! - Error types

pub mod conversation;
pub mod document;
pub mod error;
pub mod events;
pub mod filter;
pub mod generation;
pub mod search;
pub mod strategy;
pub mod tokens;
pub mod traits;

pub use conversation::ConversationTurn;
pub use document::{Chunk, ChunkMetadata, Document, DocumentMetadata};
pub use error::{Error, ErrorKind, Result};
pub use events::{EventSink, PipelineEvent, DEFAULT_EVENT_CAPACITY};
pub use filter::{FieldCondition, Filter, FilterOp};
pub use generation::{
    Citation, GenerationOptions, GenerationRequest, GenerationResponse, StreamChunk,
};
pub use search::{assign_ranks, Candidate, SearchResult, SearchSource};
pub use strategy::{
    ChunkingStrategy, CompressionMethod, DecayFunction, RankingAlgorithm, RelevanceStrategy,
};
pub use tokens::{estimate_tokens, CharRatioEstimator, TokenEstimator};

pub use traits::{Embedder, Generator, GeneratorStream, Summarizer, VectorQuery, VectorStore};
