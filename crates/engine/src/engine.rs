//! RAG Engine
//!
//! Sequences one query through the pipeline:
//!
//! ```text
//! Received -> QueryProcessed -> Retrieved -> ContextBuilt -> Generated
//!          -> HistoryUpdated -> Done
//! ```
//!
//! Any step may move the query to `Failed`; [`RagEngine::query`] then returns
//! a degraded response instead of an error. The engine owns its conversation
//! history and its search engine (and through it, the result cache).

use async_stream::try_stream;
use futures::Stream;
use once_cell::sync::Lazy;
use ragline_config::constants::engine as defaults;
use ragline_config::Settings;
use ragline_core::{
    Chunk, Citation, ConversationTurn, Document, Embedder, Error, EventSink, GenerationOptions,
    GenerationRequest, GenerationResponse, Generator, PipelineEvent, SearchResult, StreamChunk,
    VectorStore,
};
use ragline_rag::{
    text, Chunker, ChunkingOptions, ContextBuilder, ContextOptions, ContextWindow, SearchEngine,
    SearchEngineConfig, SearchOptions,
};
use regex::Regex;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::evaluation::{EvaluationCase, EvaluationReport, TestQuery};
use crate::history::ConversationHistory;
use crate::query::{QueryAnalysis, QueryAnalyzer};
use crate::response::{QueryState, RagResponse, ResponseMetadata, ResponseMetrics};
use crate::stats::{self, EngineStatistics, StatsRecorder};
use crate::EngineError;

const COMPONENT: &str = "rag_engine";
const CITATION_EXCERPT_CHARS: usize = 100;

static CITATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d{1,4})\]").expect("valid citation marker regex"));

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_conversation_history: usize,
    /// Context window budget (tokens)
    pub max_context_length: usize,
    pub generation: GenerationOptions,
    pub generation_timeout: Duration,
    /// Look up related documents from the answer
    pub related_documents: bool,
    pub metrics_enabled: bool,
    pub search: SearchOptions,
    pub context: ContextOptions,
    pub chunking: ChunkingOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let engine = &settings.engine;
        Self {
            max_conversation_history: engine.max_conversation_history,
            max_context_length: engine.max_context_length,
            generation: GenerationOptions {
                temperature: engine.temperature,
                max_tokens: engine.max_generation_tokens,
                follow_up_questions: true,
            },
            generation_timeout: Duration::from_millis(engine.generation_timeout_ms),
            related_documents: engine.related_documents,
            metrics_enabled: settings.observability.metrics_enabled,
            search: SearchOptions::from(&settings.search),
            context: ContextOptions::from(&settings.context),
            chunking: ChunkingOptions::from(&settings.chunking),
        }
    }
}

/// Per-query overrides
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub search: Option<SearchOptions>,
    /// Context budget override (tokens)
    pub max_context_tokens: Option<usize>,
    pub generation: Option<GenerationOptions>,
    /// Use conversation history for retrieval and generation
    pub include_history: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            search: None,
            max_context_tokens: None,
            generation: None,
            include_history: true,
        }
    }
}

impl QueryOptions {
    pub fn with_search(mut self, options: SearchOptions) -> Self {
        self.search = Some(options);
        self
    }

    pub fn with_max_context_tokens(mut self, max_tokens: usize) -> Self {
        self.max_context_tokens = Some(max_tokens);
        self
    }

    pub fn without_history(mut self) -> Self {
        self.include_history = false;
        self
    }
}

/// Result of batch ingestion
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestReport {
    /// Stored documents with their chunk counts, in input order
    pub documents: Vec<(String, usize)>,
    /// Failed documents with the error message
    pub failures: Vec<(String, String)>,
}

impl IngestReport {
    pub fn total_chunks(&self) -> usize {
        self.documents.iter().map(|(_, n)| n).sum()
    }
}

/// Tracks one query's progress for logging and degraded responses
struct QueryRun {
    id: String,
    state: QueryState,
    analysis: Option<QueryAnalysis>,
}

impl QueryRun {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: QueryState::Received,
            analysis: None,
        }
    }

    fn advance(&mut self) {
        self.state = self.state.next();
        tracing::trace!(query_id = %self.id, state = %self.state, "Query state");
    }
}

/// Retrieval-augmented generation engine
pub struct RagEngine {
    config: EngineConfig,
    search: SearchEngine,
    context: ContextBuilder,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    analyzer: QueryAnalyzer,
    history: ConversationHistory,
    stats: StatsRecorder,
    events: EventSink,
}

impl RagEngine {
    /// Engine with default settings
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self::build(&Settings::default(), embedder, store, generator)
    }

    /// Engine from validated settings
    pub fn from_settings(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, EngineError> {
        settings.validate()?;
        Ok(Self::build(settings, embedder, store, generator))
    }

    fn build(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let config = EngineConfig::from_settings(settings);
        let events = match settings.engine.event_capacity {
            0 => EventSink::disabled(),
            capacity => EventSink::new(capacity),
        };

        let search = SearchEngine::new(
            embedder.clone(),
            store.clone(),
            SearchEngineConfig::from_settings(&settings.search, &settings.cache),
        )
        .with_events(events.clone());
        let context = ContextBuilder::from_config(&settings.context).with_events(events.clone());
        let chunker = Chunker::new(config.chunking.clone()).with_events(events.clone());

        tracing::info!(
            generator = generator.model_name(),
            embedder = embedder.model_name(),
            store = store.name(),
            max_history = config.max_conversation_history,
            "Created RAG engine"
        );

        Self {
            history: ConversationHistory::new(config.max_conversation_history),
            stats: StatsRecorder::new(config.metrics_enabled),
            analyzer: QueryAnalyzer::new(),
            config,
            search,
            context,
            chunker,
            embedder,
            store,
            generator,
            events,
        }
    }

    /// Replace the context builder (custom summarizer or estimator)
    pub fn with_context_builder(mut self, builder: ContextBuilder) -> Self {
        self.context = builder.with_events(self.events.clone());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn search_engine(&self) -> &SearchEngine {
        &self.search
    }

    /// Lifecycle events from every component; `None` when events are disabled
    pub fn subscribe(&self) -> Option<broadcast::Receiver<PipelineEvent>> {
        self.events.subscribe()
    }

    /// Start the cache sweeper; requires a Tokio runtime
    pub fn start_background_tasks(&self) {
        self.search.spawn_cache_sweeper();
    }

    // ---- Queries ----

    /// Answer a query; never fails
    pub async fn query(&self, query: &str) -> RagResponse {
        self.query_with(query, &QueryOptions::default()).await
    }

    /// Answer a query with per-call overrides; never fails
    pub async fn query_with(&self, query: &str, options: &QueryOptions) -> RagResponse {
        let start = Instant::now();
        let mut run = QueryRun::new();
        self.events.started(COMPONENT, "query");

        match self.run_query(&mut run, query, options, start).await {
            Ok(response) => {
                let latency = response.metrics.total_latency_ms;
                self.stats.record_success(latency, Some(response.confidence));
                self.events.completed(COMPONENT, "query", latency, response.sources.len());
                tracing::info!(
                    query_id = %run.id,
                    intent = %response.metadata.intent,
                    sources = response.sources.len(),
                    confidence = response.confidence,
                    latency_ms = latency,
                    "Query answered"
                );
                response
            },
            Err(error) => {
                let latency = elapsed_ms(start);
                tracing::warn!(
                    query_id = %run.id,
                    state = %run.state,
                    error = %error,
                    "Query failed, returning degraded response"
                );
                self.stats.record_failure(latency, error.kind());
                self.events.failed(COMPONENT, "query", &error);
                RagResponse::degraded(run.id, run.analysis.as_ref(), &error, run.state, latency)
            },
        }
    }

    async fn run_query(
        &self,
        run: &mut QueryRun,
        query: &str,
        options: &QueryOptions,
        start: Instant,
    ) -> Result<RagResponse, Error> {
        let analysis = self.analyze(run, query)?;

        let history = if options.include_history {
            self.history.snapshot(None)
        } else {
            Vec::new()
        };
        let max_tokens = self.context_budget(options);
        let (results, window) = self
            .retrieve_and_build(run, &analysis.text, &history, options)
            .await?;

        let context = window.contents();
        let request = self.generation_request(&analysis.text, context.clone(), &history, options);
        let generated = self.generate(request).await?;
        run.advance();

        let citations = reconcile_citations(&generated.answer, &generated.citations, &window);
        let related_documents = self.related_documents(&generated.answer, &results).await;

        self.history.push(
            ConversationTurn::new(&analysis.text, &generated.answer)
                .with_context(window.source_chunks()),
        );
        run.advance();

        let confidence = generated.confidence.clamp(0.0, 1.0);
        let factual_consistency = generated
            .factual_consistency
            .map(|f| f.clamp(0.0, 1.0))
            .unwrap_or_else(|| stats::factual_consistency(&generated.answer, &context));
        let total = elapsed_ms(start);
        let metrics = ResponseMetrics {
            total_latency_ms: total,
            retrieval_latency_ms: (total as f64 * defaults::RETRIEVAL_LATENCY_SHARE).round() as u64,
            generation_latency_ms: (total as f64 * defaults::GENERATION_LATENCY_SHARE).round()
                as u64,
            retrieved_count: results.len(),
            context_tokens: window.total_tokens,
            context_utilization: if max_tokens == 0 {
                0.0
            } else {
                window.total_tokens as f32 / max_tokens as f32
            },
            response_relevance: confidence,
            factual_consistency,
        };
        run.advance();

        Ok(RagResponse {
            answer: generated.answer,
            sources: results,
            context,
            confidence,
            citations,
            follow_up_questions: generated.follow_up_questions,
            related_documents,
            metrics,
            metadata: ResponseMetadata {
                query_id: run.id.clone(),
                intent: analysis.intent,
                entities: analysis.entities,
                keywords: analysis.keywords,
                model: Some(self.generator.model_name().to_string()),
                ..Default::default()
            },
        })
    }

    /// Stream the answer as the generator produces it
    ///
    /// Unlike [`RagEngine::query`], failures are yielded as errors. The turn
    /// is recorded in history once the generator finishes.
    pub fn query_stream<'a>(
        &'a self,
        query: &'a str,
    ) -> impl Stream<Item = Result<StreamChunk, Error>> + Send + 'a {
        let start = Instant::now();
        self.stream_inner(query, start).map(move |item| {
            if let Err(e) = &item {
                tracing::warn!(error = %e, "Streaming query failed");
                self.stats.record_failure(elapsed_ms(start), e.kind());
                self.events.failed(COMPONENT, "query_stream", e);
            }
            item
        })
    }

    fn stream_inner<'a>(
        &'a self,
        query: &'a str,
        start: Instant,
    ) -> impl Stream<Item = Result<StreamChunk, Error>> + Send + 'a {
        try_stream! {
            let mut run = QueryRun::new();
            self.events.started(COMPONENT, "query_stream");
            let analysis = self.analyze(&mut run, query)?;

            let options = QueryOptions::default();
            let history = self.history.snapshot(None);
            let (_, window) = self
                .retrieve_and_build(&mut run, &analysis.text, &history, &options)
                .await?;

            let request =
                self.generation_request(&analysis.text, window.contents(), &history, &options);
            let mut upstream = self.generator.generate_stream(request);
            let deadline = self.config.generation_timeout;
            let mut answer = String::new();

            while let Some(item) = tokio::time::timeout(deadline, upstream.next())
                .await
                .map_err(|_| timed_out(deadline))?
            {
                let chunk = item.map_err(generation_error)?;
                let done = chunk.done;
                answer.push_str(&chunk.content);
                yield chunk;
                if done {
                    break;
                }
            }
            run.advance();

            self.history.push(
                ConversationTurn::new(analysis.text.as_str(), answer)
                    .with_context(window.source_chunks()),
            );
            run.advance();

            let latency = elapsed_ms(start);
            self.stats.record_success(latency, None);
            self.events.completed(COMPONENT, "query_stream", latency, window.chunks.len());
            run.advance();
        }
    }

    fn analyze(&self, run: &mut QueryRun, query: &str) -> Result<QueryAnalysis, Error> {
        let analysis = self.analyzer.analyze(query);
        if analysis.text.is_empty() {
            return Err(Error::InvalidInput("query is empty".into()));
        }
        tracing::debug!(
            query_id = %run.id,
            intent = %analysis.intent,
            entities = ?analysis.entities,
            keywords = ?analysis.keywords,
            "Analyzed query"
        );
        run.analysis = Some(analysis.clone());
        run.advance();
        Ok(analysis)
    }

    /// Contextual search when there is history, plain search otherwise
    async fn retrieve_and_build(
        &self,
        run: &mut QueryRun,
        query: &str,
        history: &[ConversationTurn],
        options: &QueryOptions,
    ) -> Result<(Vec<SearchResult>, ContextWindow), Error> {
        let search_options = options
            .search
            .clone()
            .unwrap_or_else(|| self.config.search.clone());

        let results = if history.is_empty() {
            self.search.search(query, &search_options).await
        } else {
            self.search
                .contextual_search(query, history, &search_options)
                .await
        }
        .map_err(Error::from)?;
        run.advance();

        let context_options = ContextOptions {
            max_tokens: self.context_budget(options),
            query: query.to_string(),
            prioritize_recency: true,
            ..self.config.context.clone()
        };
        let window = self.context.build_context(&results, &context_options).await;
        run.advance();

        tracing::debug!(
            query_id = %run.id,
            retrieved = results.len(),
            context_chunks = window.chunks.len(),
            context_tokens = window.total_tokens,
            "Built context"
        );
        Ok((results, window))
    }

    fn context_budget(&self, options: &QueryOptions) -> usize {
        options
            .max_context_tokens
            .unwrap_or(self.config.max_context_length)
    }

    fn generation_request(
        &self,
        query: &str,
        context: Vec<String>,
        history: &[ConversationTurn],
        options: &QueryOptions,
    ) -> GenerationRequest {
        let skip = history
            .len()
            .saturating_sub(defaults::GENERATION_HISTORY_TURNS);
        GenerationRequest {
            query: query.to_string(),
            context,
            conversation_history: history[skip..].to_vec(),
            options: options
                .generation
                .clone()
                .unwrap_or_else(|| self.config.generation.clone()),
        }
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, Error> {
        let deadline = self.config.generation_timeout;
        match tokio::time::timeout(deadline, self.generator.generate(request)).await {
            Ok(result) => result.map_err(generation_error),
            Err(_) => Err(timed_out(deadline)),
        }
    }

    /// Other documents matching the start of the answer
    ///
    /// Advisory only: failures are logged and yield nothing.
    async fn related_documents(&self, answer: &str, sources: &[SearchResult]) -> Vec<SearchResult> {
        if !self.config.related_documents {
            return Vec::new();
        }
        let lookup_text: String = answer.chars().take(defaults::RELATED_QUERY_CHARS).collect();
        if lookup_text.trim().is_empty() {
            return Vec::new();
        }

        let options = SearchOptions::default()
            .with_max_results(defaults::RELATED_DOCUMENTS + sources.len());
        match self.search.search(&lookup_text, &options).await {
            Ok(results) => {
                let mut seen: HashSet<String> =
                    sources.iter().map(|r| r.chunk.document_id.clone()).collect();
                results
                    .into_iter()
                    .filter(|r| seen.insert(r.chunk.document_id.clone()))
                    .take(defaults::RELATED_DOCUMENTS)
                    .collect()
            },
            Err(e) => {
                tracing::warn!(error = %e, "Related document lookup failed");
                Vec::new()
            },
        }
    }

    // ---- Ingestion ----

    /// Chunk, embed and store one document
    pub async fn ingest(&self, document: &Document) -> Result<Vec<Chunk>, EngineError> {
        let chunks = self.chunker.chunk(document)?;
        let stored = self.embed_and_store(chunks).await?;

        self.stats.record_ingest(1, stored.len() as u64);
        self.search.clear_cache();
        tracing::info!(document_id = %document.id, chunks = stored.len(), "Ingested document");
        Ok(stored)
    }

    /// Ingest many documents, chunking `concurrency` at a time
    ///
    /// Failures are collected per document; the rest of the batch proceeds.
    pub async fn ingest_batch(&self, documents: Vec<Document>, concurrency: usize) -> IngestReport {
        let outcome = self
            .chunker
            .process_batch(documents, concurrency, |completed, total| {
                tracing::debug!(completed, total, "Chunking progress");
            })
            .await;

        let mut report = IngestReport::default();
        for (id, error) in outcome.failures {
            report.failures.push((id, error.to_string()));
        }

        for (id, chunks) in outcome.chunks {
            match self.embed_and_store(chunks).await {
                Ok(stored) => {
                    self.stats.record_ingest(1, stored.len() as u64);
                    report.documents.push((id, stored.len()));
                },
                Err(e) => {
                    tracing::warn!(document_id = %id, error = %e, "Failed to store document");
                    report.failures.push((id, e.to_string()));
                },
            }
        }

        if !report.documents.is_empty() {
            self.search.clear_cache();
        }
        tracing::info!(
            documents = report.documents.len(),
            chunks = report.total_chunks(),
            failures = report.failures.len(),
            "Batch ingestion complete"
        );
        report
    }

    async fn embed_and_store(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, EngineError> {
        if chunks.is_empty() {
            return Ok(chunks);
        }
        let deadline = self.search.config().backend_timeout;

        let texts: Vec<String> = chunks.iter().map(|c| c.text_with_context()).collect();
        let vectors = with_deadline(deadline, self.embedder.embed_batch(&texts)).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::Backend(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            ))
            .into());
        }

        let chunks: Vec<Chunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| chunk.with_embedding(vector))
            .collect();
        with_deadline(deadline, self.store.upsert(chunks.clone())).await?;
        Ok(chunks)
    }

    // ---- History, statistics, evaluation ----

    /// Oldest first; `limit` keeps the most recent turns
    pub fn get_conversation_history(&self, limit: Option<usize>) -> Vec<ConversationTurn> {
        self.history.snapshot(limit)
    }

    pub fn clear_conversation_history(&self) {
        self.history.clear();
        tracing::debug!("Cleared conversation history");
    }

    pub fn get_statistics(&self) -> EngineStatistics {
        self.stats
            .snapshot(self.history.len(), self.search.cache_len())
    }

    /// Run each test query in order and aggregate the outcomes
    ///
    /// Queries go through [`RagEngine::query`], so they are recorded in
    /// history and statistics like any other query.
    pub async fn evaluate_performance(&self, tests: &[TestQuery]) -> EvaluationReport {
        let mut cases = Vec::with_capacity(tests.len());
        for test in tests {
            let response = self.query(&test.query).await;
            cases.push(EvaluationCase::from_response(test, &response));
        }

        let report = EvaluationReport::from_cases(cases);
        tracing::info!(
            queries = report.total_queries,
            mean_confidence = report.mean_confidence,
            success_rate = report.success_rate,
            hallucination_rate = report.hallucination_rate,
            "Evaluation complete"
        );
        report
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn timed_out(deadline: Duration) -> Error {
    Error::GenerationFailed(format!("timed out after {}ms", deadline.as_millis()))
}

fn generation_error(error: Error) -> Error {
    match error {
        Error::GenerationFailed(_) => error,
        other => Error::GenerationFailed(other.to_string()),
    }
}

async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| Error::Timeout(deadline.as_millis() as u64))?
}

/// Citations the generator reported plus `[n]` markers in the answer
///
/// Indices are 1-based positions in the context window; out-of-range
/// indices are dropped and duplicates collapsed in first-seen order.
fn reconcile_citations(answer: &str, reported: &[Citation], window: &ContextWindow) -> Vec<Citation> {
    let markers = CITATION_MARKER
        .captures_iter(answer)
        .filter_map(|caps| caps[1].parse::<usize>().ok());
    let indices: Vec<usize> = reported.iter().map(|c| c.index).chain(markers).collect();

    let mut seen = HashSet::new();
    let mut citations = Vec::new();
    for index in indices {
        if index == 0 || index > window.chunks.len() {
            tracing::debug!(index, context = window.chunks.len(), "Dropping out-of-range citation");
            continue;
        }
        if !seen.insert(index) {
            continue;
        }

        let chunk = &window.chunks[index - 1].chunk;
        let excerpt = reported
            .iter()
            .find(|c| c.index == index)
            .and_then(|c| c.excerpt.clone())
            .unwrap_or_else(|| {
                text::truncate_at_word_boundary(&chunk.content, CITATION_EXCERPT_CHARS).to_string()
            });
        citations.push(Citation {
            index,
            chunk_id: Some(chunk.id.clone()),
            document_id: Some(chunk.document_id.clone()),
            excerpt: Some(excerpt),
        });
    }
    citations
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn window(contents: &[&str]) -> ContextWindow {
        let results: Vec<SearchResult> = contents
            .iter()
            .enumerate()
            .map(|(i, c)| {
                SearchResult::new(Chunk::new(format!("c{}", i + 1), format!("d{}", i + 1), 0, *c), 1.0)
            })
            .collect();
        let options = ContextOptions {
            prioritize_recency: false,
            include_metadata: false,
            ..ContextOptions::default()
        };
        ContextBuilder::new().build_context(&results, &options).await
    }

    #[tokio::test]
    async fn test_reconcile_citations() {
        let window = window(&["alpha text", "beta text"]).await;
        let mut reported = Citation::new(2);
        reported.excerpt = Some("beta".into());

        let citations = reconcile_citations(
            "Alpha [1] and beta [2], not [7] or [0]. Again [1].",
            &[reported, Citation::new(5)],
            &window,
        );

        let indices: Vec<usize> = citations.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![2, 1]);
        assert_eq!(citations[0].excerpt.as_deref(), Some("beta"));
        assert_eq!(citations[1].chunk_id.as_deref(), Some("c1"));
        assert_eq!(citations[1].document_id.as_deref(), Some("d1"));
        assert_eq!(citations[1].excerpt.as_deref(), Some("alpha text"));
    }

    #[tokio::test]
    async fn test_citations_against_empty_window() {
        let window = window(&[]).await;
        assert!(reconcile_citations("See [1].", &[], &window).is_empty());
    }

    #[test]
    fn test_generation_error_mapping() {
        let err = generation_error(Error::Backend("quota".into()));
        assert_eq!(err, Error::GenerationFailed("Backend error: quota".into()));

        let err = generation_error(Error::GenerationFailed("bad prompt".into()));
        assert_eq!(err, Error::GenerationFailed("bad prompt".into()));
        assert_eq!(
            timed_out(Duration::from_millis(250)),
            Error::GenerationFailed("timed out after 250ms".into())
        );
    }

    #[test]
    fn test_engine_config_from_settings() {
        let mut settings = Settings::default();
        settings.engine.max_conversation_history = 4;
        settings.engine.generation_timeout_ms = 1500;
        settings.observability.metrics_enabled = false;

        let config = EngineConfig::from_settings(&settings);
        assert_eq!(config.max_conversation_history, 4);
        assert_eq!(config.generation_timeout, Duration::from_millis(1500));
        assert!(!config.metrics_enabled);
        assert_eq!(config.search.max_results, settings.search.max_results);
    }

    #[test]
    fn test_query_options_default_uses_history() {
        let options = QueryOptions::default();
        assert!(options.include_history);
        assert!(!options.without_history().include_history);
    }
}
