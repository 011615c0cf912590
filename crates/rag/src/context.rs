//! Context Window Assembly
//!
//! Turns ranked search results into a single window bounded by a token
//! budget:
//!
//! 1. Order by relevance strategy (optionally pre-sorted newest first)
//! 2. Compress (summarize, keyword-extract, entity-filter, de-duplicate)
//! 3. Pack under the budget, truncating the last chunk when enough budget
//!    remains
//!
//! `total_tokens <= max_tokens` holds for every window this module builds,
//! and `total_tokens` covers chunk contents together with their metadata
//! labels.
//! Building never fails; an input that cannot fit yields an empty window.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ragline_config::constants::context as defaults;
use ragline_core::{
    CharRatioEstimator, Chunk, CompressionMethod, DecayFunction, EventSink, RelevanceStrategy,
    SearchResult, Summarizer, TokenEstimator,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::compressor::TruncatingSummarizer;
use crate::ranker::sort_by_score;
use crate::text;

const COMPONENT: &str = "context_builder";
const SECTION_ID_PREFIX: &str = "section::";

/// Context build options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextOptions {
    pub max_tokens: usize,
    /// Query text for coverage ordering and entity filtering
    pub query: String,
    pub relevance_strategy: RelevanceStrategy,
    pub compression_method: CompressionMethod,
    /// Pre-sort newest first before strategy ordering
    pub prioritize_recency: bool,
    /// Label chunks with their title or source when rendering
    pub include_metadata: bool,
    /// Title heading and separators when rendering
    pub optimize_layout: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_tokens: defaults::MAX_TOKENS,
            query: String::new(),
            relevance_strategy: RelevanceStrategy::default(),
            compression_method: CompressionMethod::default(),
            prioritize_recency: true,
            include_metadata: true,
            optimize_layout: false,
        }
    }
}

impl From<&ragline_config::ContextConfig> for ContextOptions {
    fn from(config: &ragline_config::ContextConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            query: String::new(),
            relevance_strategy: config.relevance_strategy,
            compression_method: config.compression_method,
            prioritize_recency: config.prioritize_recency,
            include_metadata: config.include_metadata,
            optimize_layout: config.optimize_layout,
        }
    }
}

impl ContextOptions {
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_strategy(mut self, strategy: RelevanceStrategy) -> Self {
        self.relevance_strategy = strategy;
        self
    }

    pub fn with_compression(mut self, method: CompressionMethod) -> Self {
        self.compression_method = method;
        self
    }
}

/// Build metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowMetadata {
    pub strategy: RelevanceStrategy,
    pub compression: CompressionMethod,
    pub build_time_ms: u64,
    /// Input result count
    pub original_count: usize,
    /// Last chunk was cut to fit
    pub truncated: bool,
    pub include_metadata: bool,
    pub layout_optimized: bool,
    /// Section titles in output order (hierarchical builds)
    pub sections: Vec<String>,
}

/// Token-bounded context window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub chunks: Vec<SearchResult>,
    pub total_tokens: usize,
    /// Characters
    pub total_length: usize,
    /// Output chunks / input results
    pub compression_ratio: f32,
    /// Mean score of content chunks
    pub relevance_score: f32,
    pub metadata: WindowMetadata,
}

impl ContextWindow {
    fn assemble(
        chunks: Vec<SearchResult>,
        total_tokens: usize,
        original_count: usize,
        options: &ContextOptions,
        truncated: bool,
    ) -> Self {
        let content: Vec<&SearchResult> = chunks.iter().filter(|r| !is_section_header(r)).collect();
        let relevance_score = if content.is_empty() {
            0.0
        } else {
            content.iter().map(|r| r.score).sum::<f32>() / content.len() as f32
        };
        let compression_ratio = if original_count == 0 {
            1.0
        } else {
            content.len() as f32 / original_count as f32
        };

        Self {
            total_length: chunks.iter().map(|r| r.content().chars().count()).sum(),
            chunks,
            total_tokens,
            compression_ratio,
            relevance_score,
            metadata: WindowMetadata {
                strategy: options.relevance_strategy,
                compression: options.compression_method,
                build_time_ms: 0,
                original_count,
                truncated,
                include_metadata: options.include_metadata,
                layout_optimized: options.optimize_layout,
                sections: Vec::new(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk contents in window order, as handed to a generator
    pub fn contents(&self) -> Vec<String> {
        self.chunks.iter().map(|r| self.render_chunk(r)).collect()
    }

    /// Content chunks, without section headers
    pub fn source_chunks(&self) -> Vec<Chunk> {
        self.chunks
            .iter()
            .filter(|r| !is_section_header(r))
            .map(|r| r.chunk.clone())
            .collect()
    }

    fn render_chunk(&self, result: &SearchResult) -> String {
        match metadata_label(result, self.metadata.include_metadata) {
            Some(label) => format!("{}{}", label, result.content()),
            None => result.content().to_string(),
        }
    }

    /// Render as a single prompt string
    ///
    /// Layout only affects presentation; token accounting covers rendered
    /// chunks but not headings or separators.
    pub fn render(&self) -> String {
        let parts = self.contents();
        if !self.metadata.layout_optimized {
            return parts.join("\n\n");
        }

        let heading = self
            .chunks
            .iter()
            .find(|r| !is_section_header(r))
            .and_then(|r| r.chunk.metadata.title.as_deref())
            .map(|title| format!("# {}\n\n", title))
            .unwrap_or_default();
        format!("{}{}", heading, parts.join(defaults::CHUNK_SEPARATOR))
    }
}

/// One section of a hierarchical context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSection {
    pub title: String,
    pub max_tokens: usize,
    /// Higher first
    pub priority: i32,
    /// Restrict to these documents; `None` takes every result
    pub document_ids: Option<Vec<String>>,
}

impl ContextSection {
    pub fn new(title: impl Into<String>, max_tokens: usize, priority: i32) -> Self {
        Self {
            title: title.into(),
            max_tokens,
            priority,
            document_ids: None,
        }
    }

    pub fn with_documents(mut self, ids: Vec<String>) -> Self {
        self.document_ids = Some(ids);
        self
    }

    fn includes(&self, result: &SearchResult) -> bool {
        self.document_ids
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|id| *id == result.chunk.document_id))
    }
}

/// Temporal weighting options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalOptions {
    /// Share of the final score taken by the decay score
    pub time_weight: f32,
    pub decay: DecayFunction,
    /// Age is measured from here; defaults to now
    pub reference_date: Option<DateTime<Utc>>,
}

impl Default for TemporalOptions {
    fn default() -> Self {
        Self {
            time_weight: defaults::DEFAULT_TIME_WEIGHT,
            decay: DecayFunction::default(),
            reference_date: None,
        }
    }
}

/// Decay score for an age in days, in `[0, 1]`
pub fn decay_score(decay: DecayFunction, days: f64) -> f32 {
    let days = days.max(0.0);
    let score = match decay {
        DecayFunction::Linear => 1.0 - days / defaults::LINEAR_DECAY_DAYS,
        DecayFunction::Exponential => (-days / defaults::EXPONENTIAL_DECAY_DAYS).exp(),
        DecayFunction::Logarithmic => {
            let horizon = defaults::LINEAR_DECAY_DAYS / defaults::EXPONENTIAL_DECAY_DAYS + 1.0;
            1.0 - (1.0 + days / defaults::EXPONENTIAL_DECAY_DAYS).ln() / horizon.ln()
        },
    };
    score.clamp(0.0, 1.0) as f32
}

fn age_days(created: DateTime<Utc>, reference: DateTime<Utc>) -> f64 {
    (reference - created).num_seconds() as f64 / 86_400.0
}

fn is_section_header(result: &SearchResult) -> bool {
    result.chunk.id.starts_with(SECTION_ID_PREFIX)
}

/// Assembles context windows
pub struct ContextBuilder {
    estimator: Arc<dyn TokenEstimator>,
    summarizer: Arc<dyn Summarizer>,
    summary_max_chars: usize,
    seed: Option<u64>,
    events: EventSink,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            estimator: Arc::new(CharRatioEstimator::default()),
            summarizer: Arc::new(TruncatingSummarizer),
            summary_max_chars: defaults::SUMMARY_MAX_CHARS,
            seed: None,
            events: EventSink::disabled(),
        }
    }

    pub fn from_config(config: &ragline_config::ContextConfig) -> Self {
        Self {
            summary_max_chars: config.summary_max_chars,
            ..Self::new()
        }
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Fix the random tie-break of the balanced strategy
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn estimator(&self) -> &dyn TokenEstimator {
        self.estimator.as_ref()
    }

    /// Build a window from ranked results
    pub async fn build_context(
        &self,
        results: &[SearchResult],
        options: &ContextOptions,
    ) -> ContextWindow {
        let start = Instant::now();
        self.events.started(COMPONENT, "build_context");

        let mut window = self.build_window(results.to_vec(), options).await;
        window.metadata.build_time_ms = start.elapsed().as_millis() as u64;
        self.finish("build_context", &window, results.len());
        window
    }

    /// One sub-window per section, highest priority first, each preceded by
    /// a `## title` header chunk
    ///
    /// Each section is bounded by its own budget and by what remains of the
    /// overall budget; header tokens count against the section.
    pub async fn build_hierarchical_context(
        &self,
        results: &[SearchResult],
        sections: &[ContextSection],
        options: &ContextOptions,
    ) -> ContextWindow {
        let start = Instant::now();
        self.events.started(COMPONENT, "build_hierarchical_context");

        let mut ordered: Vec<&ContextSection> = sections.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut remaining = options.max_tokens;
        let mut chunks = Vec::new();
        let mut titles = Vec::new();
        let mut truncated = false;

        for (idx, section) in ordered.into_iter().enumerate() {
            let budget = section.max_tokens.min(remaining);
            let header_text = format!("## {}", section.title);
            let header_tokens = self.estimator.estimate(&header_text);
            if budget <= header_tokens {
                tracing::debug!(section = %section.title, budget, "No budget left for section");
                continue;
            }

            let members: Vec<SearchResult> =
                results.iter().filter(|r| section.includes(r)).cloned().collect();
            if members.is_empty() {
                continue;
            }

            let sub_options = ContextOptions {
                max_tokens: budget - header_tokens,
                ..options.clone()
            };
            let sub = self.build_window(members, &sub_options).await;
            if sub.is_empty() {
                continue;
            }

            let mut header = Chunk::new(
                format!("{}{}", SECTION_ID_PREFIX, idx),
                String::new(),
                idx,
                header_text,
            );
            header.token_estimate = header_tokens;
            header.metadata.section = Some(section.title.clone());

            remaining -= header_tokens + sub.total_tokens;
            truncated |= sub.metadata.truncated;
            titles.push(section.title.clone());
            chunks.push(SearchResult::new(header, 0.0));
            chunks.extend(sub.chunks);
        }

        let total_tokens = options.max_tokens - remaining;
        let mut window =
            ContextWindow::assemble(chunks, total_tokens, results.len(), options, truncated);
        window.metadata.sections = titles;
        window.metadata.build_time_ms = start.elapsed().as_millis() as u64;
        self.finish("build_hierarchical_context", &window, results.len());
        window
    }

    /// Blend each score with a temporal decay score, then build newest first
    pub async fn build_temporal_context(
        &self,
        results: &[SearchResult],
        temporal: &TemporalOptions,
        options: &ContextOptions,
    ) -> ContextWindow {
        let reference = temporal.reference_date.unwrap_or_else(Utc::now);
        let weight = temporal.time_weight.clamp(0.0, 1.0);

        let weighted: Vec<SearchResult> = results
            .iter()
            .cloned()
            .map(|mut r| {
                let decay = r
                    .chunk
                    .metadata
                    .created_at
                    .map(|created| decay_score(temporal.decay, age_days(created, reference)))
                    .unwrap_or(0.0);
                r.score = (1.0 - weight) * r.score + weight * decay;
                r
            })
            .collect();

        let options = ContextOptions {
            prioritize_recency: true,
            ..options.clone()
        };
        self.build_context(&weighted, &options).await
    }

    fn finish(&self, operation: &str, window: &ContextWindow, input: usize) {
        if window.is_empty() && input > 0 {
            let err = ragline_core::Error::ContextBuildFailed(format!(
                "none of {} results fit the token budget",
                input
            ));
            tracing::warn!(error = %err, "Falling back to empty context");
        }

        tracing::debug!(
            operation,
            chunks = window.chunks.len(),
            tokens = window.total_tokens,
            truncated = window.metadata.truncated,
            "Built context window"
        );
        self.events.completed(
            COMPONENT,
            operation,
            window.metadata.build_time_ms,
            window.chunks.len(),
        );
    }

    async fn build_window(
        &self,
        results: Vec<SearchResult>,
        options: &ContextOptions,
    ) -> ContextWindow {
        let original_count = results.len();
        let ordered = self.order(results, options);
        let compressed = self.compress(ordered, options).await;
        let (chunks, total_tokens, truncated) = self.pack(compressed, options);
        ContextWindow::assemble(chunks, total_tokens, original_count, options, truncated)
    }

    // ---- Ordering ----

    fn order(&self, mut results: Vec<SearchResult>, options: &ContextOptions) -> Vec<SearchResult> {
        if options.prioritize_recency {
            sort_by_recency(&mut results);
        }

        match options.relevance_strategy {
            RelevanceStrategy::SemanticRelevance => {
                sort_by_score(&mut results);
                results
            },
            RelevanceStrategy::Recency => {
                sort_by_recency(&mut results);
                results
            },
            RelevanceStrategy::Diversity => {
                sort_by_score(&mut results);
                let mut topics = HashSet::new();
                results
                    .into_iter()
                    .filter(|r| {
                        let topic = text::topic_signature(r.content());
                        topic.is_empty() || topics.insert(topic)
                    })
                    .collect()
            },
            RelevanceStrategy::Coverage => {
                let mut seen = HashSet::new();
                let terms: Vec<String> = text::significant_words(&options.query)
                    .into_iter()
                    .filter(|w| seen.insert(w.clone()))
                    .collect();
                sort_by_key_desc(results, |r| coverage(r, &terms))
            },
            RelevanceStrategy::Balanced => {
                let now = Utc::now();
                let max = results.iter().map(|r| r.score).fold(0.0f32, f32::max);
                let mut rng = match self.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                sort_by_key_desc(results, |r| {
                    let relevance = if max > 0.0 { r.score / max } else { 0.0 };
                    let recency = r
                        .chunk
                        .metadata
                        .created_at
                        .map(|created| decay_score(DecayFunction::Linear, age_days(created, now)))
                        .unwrap_or(0.0);
                    defaults::BALANCED_RELEVANCE * relevance
                        + defaults::BALANCED_RECENCY * recency
                        + defaults::BALANCED_RANDOM * rng.gen::<f32>()
                })
            },
        }
    }

    // ---- Compression ----

    async fn compress(
        &self,
        results: Vec<SearchResult>,
        options: &ContextOptions,
    ) -> Vec<SearchResult> {
        match options.compression_method {
            CompressionMethod::None => results,
            CompressionMethod::Summarization => {
                let mut out = Vec::with_capacity(results.len());
                for result in results {
                    out.push(self.summarize(result).await);
                }
                out
            },
            CompressionMethod::KeywordExtraction => results
                .into_iter()
                .map(|r| {
                    let keywords = text::extract_keywords(r.content(), defaults::COMPRESSION_KEYWORDS);
                    if keywords.is_empty() {
                        r
                    } else {
                        self.replace_content(r, keywords.join(" "))
                    }
                })
                .collect(),
            CompressionMethod::EntityFiltering => {
                let entities: Vec<String> = text::capitalized_phrases(&options.query)
                    .into_iter()
                    .map(|e| e.to_lowercase())
                    .collect();
                if entities.is_empty() {
                    return results;
                }
                results
                    .into_iter()
                    .filter(|r| {
                        let content = r.content().to_lowercase();
                        entities.iter().any(|e| content.contains(e.as_str()))
                    })
                    .collect()
            },
            CompressionMethod::RedundancyRemoval => {
                let mut seen = HashSet::new();
                results
                    .into_iter()
                    .filter(|r| {
                        let hash = if r.chunk.metadata.content_hash.is_empty() {
                            text::content_hash(r.content())
                        } else {
                            r.chunk.metadata.content_hash.clone()
                        };
                        seen.insert(hash)
                    })
                    .collect()
            },
        }
    }

    async fn summarize(&self, result: SearchResult) -> SearchResult {
        let max_chars = self.summary_max_chars;
        let original_length = result.content().chars().count();
        if original_length <= max_chars {
            return result;
        }

        let summary = match self.summarizer.summarize(result.content(), max_chars).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(chunk_id = %result.id(), error = %e, "Summarizer failed, truncating");
                TruncatingSummarizer::truncate(result.content(), max_chars)
            },
        };

        let mut summarized = self.replace_content(result, summary);
        summarized.chunk.metadata.summarized = true;
        summarized.chunk.metadata.original_length = Some(original_length);
        summarized
    }

    fn replace_content(&self, mut result: SearchResult, content: String) -> SearchResult {
        result.chunk.token_estimate = self.estimator.estimate(&content);
        result.chunk.content = content;
        result
    }

    // ---- Packing ----

    /// Whole chunks while they fit; then one truncated copy if at least the
    /// truncation floor remains
    ///
    /// A chunk costs its content tokens plus its label tokens when labels are
    /// rendered.
    fn pack(
        &self,
        results: Vec<SearchResult>,
        options: &ContextOptions,
    ) -> (Vec<SearchResult>, usize, bool) {
        let max_tokens = options.max_tokens;
        let mut packed = Vec::new();
        let mut total = 0usize;

        for result in results {
            let label_tokens = metadata_label(&result, options.include_metadata)
                .map_or(0, |label| self.estimator.estimate(&label));
            let tokens = label_tokens + self.estimator.estimate(result.content());
            if total + tokens <= max_tokens {
                total += tokens;
                packed.push(result);
                continue;
            }

            let remaining = max_tokens - total;
            if remaining >= defaults::TRUNCATION_FLOOR_TOKENS && remaining > label_tokens {
                if let Some((cut, tokens)) =
                    self.truncate_to_budget(result, remaining - label_tokens)
                {
                    total += label_tokens + tokens;
                    packed.push(cut);
                    return (packed, total, true);
                }
            }
            break;
        }

        (packed, total, false)
    }

    fn truncate_to_budget(
        &self,
        result: SearchResult,
        budget: usize,
    ) -> Option<(SearchResult, usize)> {
        let original_length = result.content().chars().count();
        let mut max_chars = budget.saturating_mul(ragline_core::tokens::DEFAULT_CHARS_PER_TOKEN);

        while max_chars > 0 {
            let cut = text::truncate_at_word_boundary(result.content(), max_chars);
            let tokens = self.estimator.estimate(cut);
            if tokens <= budget && !cut.is_empty() {
                let cut = cut.to_string();
                let mut truncated = self.replace_content(result, cut);
                truncated.chunk.metadata.truncated = true;
                truncated.chunk.metadata.original_length = Some(original_length);
                return Some((truncated, tokens));
            }
            let overshoot = tokens.saturating_sub(budget).max(1);
            max_chars = max_chars.saturating_sub(overshoot * ragline_core::tokens::DEFAULT_CHARS_PER_TOKEN);
        }

        None
    }
}

/// `[title]` or `[source]` line prepended to rendered content chunks
fn metadata_label(result: &SearchResult, include_metadata: bool) -> Option<String> {
    if !include_metadata || is_section_header(result) {
        return None;
    }
    let meta = &result.chunk.metadata;
    meta.title
        .as_ref()
        .or(meta.source.as_ref())
        .map(|label| format!("[{}]\n", label))
}

/// Newest first; undated results sort as oldest
fn sort_by_recency(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.chunk.metadata.created_at.cmp(&a.chunk.metadata.created_at));
}

fn sort_by_key_desc<F>(results: Vec<SearchResult>, mut key: F) -> Vec<SearchResult>
where
    F: FnMut(&SearchResult) -> f32,
{
    let mut keyed: Vec<(f32, SearchResult)> = results.into_iter().map(|r| (key(&r), r)).collect();
    keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    keyed.into_iter().map(|(_, r)| r).collect()
}

fn coverage(result: &SearchResult, terms: &[String]) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let words: HashSet<String> = text::words(result.content()).into_iter().collect();
    terms.iter().filter(|t| words.contains(*t)).count() as f32 / terms.len() as f32
}
