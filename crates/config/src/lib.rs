//! Configuration management for the ragline context engine
//!
//! Supports loading configuration from:
//! - YAML/TOML/JSON files under `config/`
//! - Environment variables (`RAGLINE__` prefix, `__` separator)
//!
//! Runtime option structs in the rag and engine crates convert from the
//! sections defined here.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from, CacheConfig, ChunkingConfig, ContextConfig, EngineConfig,
    ObservabilityConfig, SearchConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(field) => ConfigError::MissingField(field),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}

impl From<ConfigError> for ragline_core::Error {
    fn from(err: ConfigError) -> Self {
        ragline_core::Error::InvalidInput(err.to_string())
    }
}
