//! Error taxonomy shared by every ragline crate
//!
//! The variants mirror the failure policy of the pipeline: invalid input is
//! rejected before any backend call, retrieval and generation failures are
//! converted into degraded responses at the engine boundary, and cache
//! failures are logged and bypassed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias using the core [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("Context build failed: {0}")]
    ContextBuildFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Classify the error for response metadata and statistics
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::RetrievalFailed(_) => ErrorKind::RetrievalFailed,
            Error::ContextBuildFailed(_) => ErrorKind::ContextBuildFailed,
            Error::GenerationFailed(_) => ErrorKind::GenerationFailed,
            Error::Cache(_) => ErrorKind::Cache,
            Error::Timeout(_) | Error::Backend(_) => ErrorKind::Backend,
        }
    }

    /// Whether the pipeline may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Cache(_) | Error::ContextBuildFailed(_))
    }
}

/// Serializable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    RetrievalFailed,
    ContextBuildFailed,
    GenerationFailed,
    Cache,
    Backend,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::RetrievalFailed => "retrieval_failed",
            ErrorKind::ContextBuildFailed => "context_build_failed",
            ErrorKind::GenerationFailed => "generation_failed",
            ErrorKind::Cache => "cache",
            ErrorKind::Backend => "backend",
        };
        f.write_str(name)
    }
}
