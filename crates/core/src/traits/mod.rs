//! Collaborator interfaces
//!
//! The core consumes these; embedding providers, vector databases and
//! language models live behind them.

mod embedder;
mod generator;
mod summarizer;
mod vector_store;

pub use embedder::Embedder;
pub use generator::{Generator, GeneratorStream};
pub use summarizer::Summarizer;
pub use vector_store::{VectorQuery, VectorStore};
