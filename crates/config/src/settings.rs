//! Main settings module

use config::{Config, Environment, File};
use ragline_core::{
    ChunkingStrategy, CompressionMethod, RankingAlgorithm, RelevanceStrategy,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{cache, chunking, context, engine, ranking, search};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Document chunking
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval and ranking
    #[serde(default)]
    pub search: SearchConfig,

    /// Search result cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Context window assembly
    #[serde(default)]
    pub context: ContextConfig,

    /// Query orchestration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging and metrics
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_chunking()?;
        self.validate_search()?;
        self.validate_cache()?;
        self.validate_context()?;
        self.validate_engine()?;
        Ok(())
    }

    /// Render the effective settings as YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn validate_chunking(&self) -> Result<(), ConfigError> {
        let c = &self.chunking;

        if c.chunk_size == 0 {
            return Err(invalid("chunking.chunk_size", "Must be at least 1".to_string()));
        }

        if c.chunk_overlap >= c.chunk_size {
            return Err(invalid(
                "chunking.chunk_overlap",
                format!(
                    "Must be smaller than chunk_size ({}), got {}",
                    c.chunk_size, c.chunk_overlap
                ),
            ));
        }

        if c.min_chunk_size > c.chunk_size {
            return Err(invalid(
                "chunking.min_chunk_size",
                format!(
                    "Cannot exceed chunk_size ({}), got {}",
                    c.chunk_size, c.min_chunk_size
                ),
            ));
        }

        if c.max_chunk_size < c.chunk_size {
            return Err(invalid(
                "chunking.max_chunk_size",
                format!(
                    "Cannot be smaller than chunk_size ({}), got {}",
                    c.chunk_size, c.max_chunk_size
                ),
            ));
        }

        if c.batch_concurrency == 0 {
            return Err(invalid(
                "chunking.batch_concurrency",
                "Must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_search(&self) -> Result<(), ConfigError> {
        let s = &self.search;

        if s.max_results == 0 {
            return Err(invalid("search.max_results", "Must be at least 1".to_string()));
        }

        for (field, value) in [
            ("search.semantic_weight", s.semantic_weight),
            ("search.keyword_weight", s.keyword_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(
                    field,
                    format!("Must be between 0.0 and 1.0, got {}", value),
                ));
            }
        }

        if (s.semantic_weight + s.keyword_weight - 1.0).abs() > 1e-3 {
            tracing::warn!(
                semantic = s.semantic_weight,
                keyword = s.keyword_weight,
                "hybrid weights do not sum to 1.0, fused scores will not be normalized"
            );
        }

        if let Some(min_score) = s.min_score {
            if !(0.0..=1.0).contains(&min_score) {
                return Err(invalid(
                    "search.min_score",
                    format!("Must be between 0.0 and 1.0, got {}", min_score),
                ));
            }
        }

        if s.rrf_k <= 0.0 {
            return Err(invalid(
                "search.rrf_k",
                format!("Must be positive, got {}", s.rrf_k),
            ));
        }

        if s.stream_batch_size == 0 {
            return Err(invalid(
                "search.stream_batch_size",
                "Must be at least 1".to_string(),
            ));
        }

        if s.backend_timeout_ms == 0 {
            return Err(invalid(
                "search.backend_timeout_ms",
                "Must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_cache(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_secs == 0 {
            return Err(invalid("cache.ttl_secs", "Must be at least 1".to_string()));
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(invalid(
                "cache.max_entries",
                "Must be at least 1 when the cache is enabled".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_context(&self) -> Result<(), ConfigError> {
        if self.context.max_tokens == 0 {
            return Err(invalid("context.max_tokens", "Must be at least 1".to_string()));
        }

        if self.context.summary_max_chars == 0 {
            return Err(invalid(
                "context.summary_max_chars",
                "Must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_engine(&self) -> Result<(), ConfigError> {
        let e = &self.engine;

        if e.max_conversation_history == 0 {
            return Err(invalid(
                "engine.max_conversation_history",
                "Must be at least 1".to_string(),
            ));
        }

        if e.max_context_length == 0 {
            return Err(invalid(
                "engine.max_context_length",
                "Must be at least 1".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&e.temperature) {
            return Err(invalid(
                "engine.temperature",
                format!("Must be between 0.0 and 2.0, got {}", e.temperature),
            ));
        }

        if e.generation_timeout_ms == 0 {
            return Err(invalid(
                "engine.generation_timeout_ms",
                "Must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Default splitting strategy
    #[serde(default)]
    pub strategy: ChunkingStrategy,

    /// Target chunk size (chars; words for sliding windows)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between sliding windows (words)
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,

    /// Chunks above this are re-split by the hybrid strategy
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Documents chunked concurrently during batch ingestion
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// Store a `[Title]` prefix for embedding
    #[serde(default = "default_true")]
    pub include_context_prefix: bool,
}

fn default_chunk_size() -> usize {
    chunking::CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    chunking::CHUNK_OVERLAP
}
fn default_min_chunk_size() -> usize {
    chunking::MIN_CHUNK_SIZE
}
fn default_max_chunk_size() -> usize {
    chunking::MAX_CHUNK_SIZE
}
fn default_batch_concurrency() -> usize {
    chunking::BATCH_CONCURRENCY
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::default(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_size: default_min_chunk_size(),
            max_chunk_size: default_max_chunk_size(),
            batch_concurrency: default_batch_concurrency(),
            include_context_prefix: true,
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default)]
    pub ranking_algorithm: RankingAlgorithm,

    /// Drop results scoring below this
    #[serde(default)]
    pub min_score: Option<f32>,

    /// Keep only the first result per coarse topic
    #[serde(default)]
    pub diversify: bool,

    /// Hybrid search weight for vector results
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    /// Hybrid search weight for keyword results
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Reciprocal rank fusion constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Assumed corpus size for approximate IDF
    #[serde(default = "default_corpus_size")]
    pub corpus_size: usize,

    #[serde(default = "default_stream_batch_size")]
    pub stream_batch_size: usize,

    #[serde(default = "default_stream_delay_ms")]
    pub stream_delay_ms: u64,

    /// Deadline for each embedder/vector store call
    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,
}

fn default_max_results() -> usize {
    search::MAX_RESULTS
}
fn default_semantic_weight() -> f32 {
    ranking::SEMANTIC_WEIGHT
}
fn default_keyword_weight() -> f32 {
    ranking::KEYWORD_WEIGHT
}
fn default_rrf_k() -> f32 {
    ranking::RRF_K
}
fn default_corpus_size() -> usize {
    ranking::ASSUMED_CORPUS_SIZE
}
fn default_stream_batch_size() -> usize {
    search::STREAM_BATCH_SIZE
}
fn default_stream_delay_ms() -> u64 {
    search::STREAM_DELAY_MS
}
fn default_backend_timeout_ms() -> u64 {
    search::BACKEND_TIMEOUT_MS
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            ranking_algorithm: RankingAlgorithm::default(),
            min_score: None,
            diversify: false,
            semantic_weight: default_semantic_weight(),
            keyword_weight: default_keyword_weight(),
            rrf_k: default_rrf_k(),
            corpus_size: default_corpus_size(),
            stream_batch_size: default_stream_batch_size(),
            stream_delay_ms: default_stream_delay_ms(),
            backend_timeout_ms: default_backend_timeout_ms(),
        }
    }
}

/// Search cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry lifetime, also the sweep interval
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_ttl_secs() -> u64 {
    cache::TTL_SECS
}
fn default_max_entries() -> usize {
    cache::MAX_ENTRIES
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

/// Context window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_context_max_tokens")]
    pub max_tokens: usize,

    #[serde(default)]
    pub relevance_strategy: RelevanceStrategy,

    #[serde(default)]
    pub compression_method: CompressionMethod,

    /// Sort by recency before applying the relevance strategy
    #[serde(default = "default_true")]
    pub prioritize_recency: bool,

    /// Label rendered chunks with their title or source
    #[serde(default = "default_true")]
    pub include_metadata: bool,

    /// Title heading and separators when rendering
    #[serde(default)]
    pub optimize_layout: bool,

    /// Placeholder summarization cap (chars)
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
}

fn default_context_max_tokens() -> usize {
    context::MAX_TOKENS
}
fn default_summary_max_chars() -> usize {
    context::SUMMARY_MAX_CHARS
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_context_max_tokens(),
            relevance_strategy: RelevanceStrategy::default(),
            compression_method: CompressionMethod::default(),
            prioritize_recency: true,
            include_metadata: true,
            optimize_layout: false,
            summary_max_chars: default_summary_max_chars(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Conversation turns retained
    #[serde(default = "default_max_conversation_history")]
    pub max_conversation_history: usize,

    /// Context window budget (tokens)
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_generation_tokens")]
    pub max_generation_tokens: usize,

    /// Deadline for a generator call
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,

    /// Look up related documents from the answer
    #[serde(default = "default_true")]
    pub related_documents: bool,

    /// Lifecycle event channel capacity (0 disables events)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_conversation_history() -> usize {
    engine::MAX_CONVERSATION_HISTORY
}
fn default_max_context_length() -> usize {
    engine::MAX_CONTEXT_LENGTH
}
fn default_temperature() -> f32 {
    engine::TEMPERATURE
}
fn default_max_generation_tokens() -> usize {
    engine::MAX_GENERATION_TOKENS
}
fn default_generation_timeout_ms() -> u64 {
    engine::GENERATION_TIMEOUT_MS
}
fn default_event_capacity() -> usize {
    ragline_core::DEFAULT_EVENT_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conversation_history: default_max_conversation_history(),
            max_context_length: default_max_context_length(),
            temperature: default_temperature(),
            max_generation_tokens: default_max_generation_tokens(),
            generation_timeout_ms: default_generation_timeout_ms(),
            related_documents: true,
            event_capacity: default_event_capacity(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Emit metrics counters
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (RAGLINE__ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings with an explicit config directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = dir.join("default");
    builder = builder.add_source(File::with_name(&default_path.to_string_lossy()).required(false));

    if let Some(env_name) = env {
        let env_path = dir.join(env_name);
        builder =
            builder.add_source(File::with_name(&env_path.to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("RAGLINE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(
        dir = %dir.display(),
        env = env.unwrap_or("default"),
        "Loaded settings"
    );

    Ok(settings)
}
