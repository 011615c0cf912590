//! Semantic Search Engine
//!
//! Embeds the query, retrieves candidates from the vector store, ranks them
//! and post-processes the list (diversify, de-duplicate, threshold,
//! truncate). Results are cached per `(query, options)`.
//!
//! # Variants
//!
//! - [`SearchEngine::search`]: single query
//! - [`SearchEngine::hybrid_search`]: vector results fused with keyword-filtered results
//! - [`SearchEngine::multi_query_search`]: several queries fused with RRF
//! - [`SearchEngine::contextual_search`]: query expanded and re-scored with recent turns
//! - [`SearchEngine::find_similar`]: neighbours of a stored chunk
//! - [`SearchEngine::stream_search`]: results delivered in small batches
//!
//! Backend failures propagate as errors; callers decide how to degrade.

use async_stream::try_stream;
use futures::Stream;
use parking_lot::Mutex;
use ragline_config::constants::search as search_defaults;
use ragline_core::{
    assign_ranks, ConversationTurn, Embedder, EventSink, Filter, RankingAlgorithm, SearchResult,
    SearchSource, VectorQuery, VectorStore,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::cache::{CacheConfig, SearchCache};
use crate::ranker::{sort_by_score, Ranker, RankerConfig};
use crate::text;
use crate::RagError;

const COMPONENT: &str = "search_engine";

/// Per-call search options
///
/// Everything except `skip_cache` is part of the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub max_results: usize,
    pub ranking_algorithm: RankingAlgorithm,
    /// Metadata filter passed to the vector store
    pub filters: Option<Filter>,
    /// Drop results scoring below this
    pub min_score: Option<f32>,
    /// Keep only the first result per coarse topic
    pub diversify: bool,
    #[serde(skip)]
    pub skip_cache: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: search_defaults::MAX_RESULTS,
            ranking_algorithm: RankingAlgorithm::default(),
            filters: None,
            min_score: None,
            diversify: false,
            skip_cache: false,
        }
    }
}

impl From<&ragline_config::SearchConfig> for SearchOptions {
    fn from(config: &ragline_config::SearchConfig) -> Self {
        Self {
            max_results: config.max_results,
            ranking_algorithm: config.ranking_algorithm,
            min_score: config.min_score,
            diversify: config.diversify,
            ..Self::default()
        }
    }
}

impl SearchOptions {
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_algorithm(mut self, algorithm: RankingAlgorithm) -> Self {
        self.ranking_algorithm = algorithm;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters = Some(filter);
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_diversify(mut self, diversify: bool) -> Self {
        self.diversify = diversify;
        self
    }

    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }
}

/// Search engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SearchEngineConfig {
    /// Hybrid weight for vector results
    pub semantic_weight: f32,
    /// Hybrid weight for keyword results
    pub keyword_weight: f32,
    pub ranker: RankerConfig,
    pub stream_batch_size: usize,
    /// Pause between stream batches
    pub stream_delay: Duration,
    /// Deadline for each embedder/vector store call
    pub backend_timeout: Duration,
    pub cache: CacheConfig,
}

impl Default for SearchEngineConfig {
    fn default() -> Self {
        Self::from_settings(
            &ragline_config::SearchConfig::default(),
            &ragline_config::CacheConfig::default(),
        )
    }
}

impl SearchEngineConfig {
    pub fn from_settings(
        search: &ragline_config::SearchConfig,
        cache: &ragline_config::CacheConfig,
    ) -> Self {
        Self {
            semantic_weight: search.semantic_weight,
            keyword_weight: search.keyword_weight,
            ranker: RankerConfig::from(search),
            stream_batch_size: search.stream_batch_size,
            stream_delay: Duration::from_millis(search.stream_delay_ms),
            backend_timeout: Duration::from_millis(search.backend_timeout_ms),
            cache: CacheConfig::from(cache),
        }
    }
}

type ResultCache = SearchCache<Vec<SearchResult>>;

/// Search engine over an embedder and a vector store
pub struct SearchEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    ranker: Ranker,
    cache: Option<Arc<ResultCache>>,
    config: SearchEngineConfig,
    events: EventSink,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SearchEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: SearchEngineConfig,
    ) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(SearchCache::new(config.cache.clone())));

        Self {
            embedder,
            store,
            ranker: Ranker::new(config.ranker.clone()),
            cache,
            config,
            events: EventSink::disabled(),
            sweeper: Mutex::new(None),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &SearchEngineConfig {
        &self.config
    }

    pub fn ranker(&self) -> &Ranker {
        &self.ranker
    }

    /// Start the periodic cache sweep; stopped when the engine is dropped
    ///
    /// Must be called inside a Tokio runtime. No-op when caching is disabled
    /// or a sweeper is already running.
    pub fn spawn_cache_sweeper(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_none() {
            *sweeper = Some(cache.spawn_sweeper());
            tracing::debug!(ttl_ms = self.config.cache.ttl.as_millis() as u64, "Started cache sweeper");
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    // ---- Single query ----

    /// Search with the full pipeline
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        self.observe("search", self.search_inner(query, options)).await
    }

    async fn search_inner(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        validate(query, options)?;

        let key = self.cache_key("search", query, options);
        if let Some(hit) = self.cache_get(key.as_deref()) {
            tracing::debug!(query = %query, results = hit.len(), "Search cache hit");
            return Ok(hit);
        }

        let vector = self.embed(query).await?;
        let candidates = self
            .retrieve(vector, options.max_results, options.filters.clone())
            .await?;
        let ranked = self.ranker.rank(options.ranking_algorithm, query, candidates);
        let results = post_process(ranked, options);

        tracing::debug!(
            query = %query,
            algorithm = %options.ranking_algorithm,
            results = results.len(),
            "Search complete"
        );

        self.cache_put(key, &results);
        Ok(results)
    }

    // ---- Hybrid ----

    /// Vector results fused with keyword-filtered results
    ///
    /// The keyword list is the vector store queried with a filter requiring
    /// at least one query keyword in chunk metadata, re-ranked with BM25.
    /// Both lists are max-normalized before weighted fusion.
    pub async fn hybrid_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        self.observe("hybrid_search", self.hybrid_inner(query, options))
            .await
    }

    async fn hybrid_inner(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        validate(query, options)?;

        let key = self.cache_key("hybrid", query, options);
        if let Some(hit) = self.cache_get(key.as_deref()) {
            return Ok(hit);
        }

        let vector = self.embed(query).await?;

        let semantic = self
            .retrieve(vector.clone(), options.max_results, options.filters.clone())
            .await?;
        let semantic = self.ranker.rank(RankingAlgorithm::Semantic, query, semantic);

        let keywords = text::extract_keywords(query, search_defaults::QUERY_KEYWORDS);
        let keyword = if keywords.is_empty() {
            Vec::new()
        } else {
            let keyword_filter = Filter::Or(
                keywords
                    .iter()
                    .map(|kw| Filter::contains("keywords", kw.as_str()))
                    .collect(),
            );
            let filter = match &options.filters {
                Some(user) => user.clone().and(keyword_filter),
                None => keyword_filter,
            };
            let found = self.retrieve(vector, options.max_results, Some(filter)).await?;
            self.ranker
                .rank(RankingAlgorithm::Bm25, query, found)
                .into_iter()
                .map(|mut r| {
                    r.source = SearchSource::Keyword;
                    r
                })
                .collect()
        };

        tracing::debug!(
            query = %query,
            semantic = semantic.len(),
            keyword = keyword.len(),
            "Fusing hybrid results"
        );

        let lists = [normalize_scores(semantic), normalize_scores(keyword)];
        let weights = [self.config.semantic_weight, self.config.keyword_weight];
        let fused = self
            .ranker
            .weighted_fusion(&lists, Some(&weights))
            .into_iter()
            .map(|mut r| {
                r.source = SearchSource::Hybrid;
                r
            })
            .collect();

        let results = post_process(fused, options);
        self.cache_put(key, &results);
        Ok(results)
    }

    // ---- Multi-query ----

    /// Run every query and fuse the lists with reciprocal rank fusion
    pub async fn multi_query_search(
        &self,
        queries: &[String],
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        self.observe("multi_query_search", self.multi_query_inner(queries, options))
            .await
    }

    async fn multi_query_inner(
        &self,
        queries: &[String],
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        if queries.is_empty() {
            return Err(RagError::InvalidInput("no queries given".into()));
        }

        let mut lists = Vec::with_capacity(queries.len());
        for query in queries {
            lists.push(self.search_inner(query, options).await?);
        }

        let fused = self
            .ranker
            .reciprocal_rank_fusion(&lists)
            .into_iter()
            .map(|mut r| {
                r.source = SearchSource::MultiQuery;
                r
            })
            .collect();
        Ok(post_process(fused, options))
    }

    // ---- Contextual ----

    /// Search expanded with keywords from recent turns, re-scored by overlap
    /// with the conversation
    ///
    /// With no history this is exactly [`SearchEngine::search`].
    pub async fn contextual_search(
        &self,
        query: &str,
        history: &[ConversationTurn],
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        if history.is_empty() {
            return self.search(query, options).await;
        }
        self.observe("contextual_search", self.contextual_inner(query, history, options))
            .await
    }

    async fn contextual_inner(
        &self,
        query: &str,
        history: &[ConversationTurn],
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        validate(query, options)?;

        let recent = &history[history.len().saturating_sub(search_defaults::CONTEXTUAL_TURNS)..];
        let history_text = recent
            .iter()
            .map(ConversationTurn::text)
            .collect::<Vec<_>>()
            .join(" ");

        let mut seen = HashSet::new();
        let expanded: Vec<String> = text::extract_keywords(query, search_defaults::QUERY_KEYWORDS)
            .into_iter()
            .chain(recent.iter().flat_map(|turn| {
                text::extract_keywords(&turn.text(), search_defaults::QUERY_KEYWORDS)
            }))
            .filter(|kw| seen.insert(kw.clone()))
            .collect();
        let expanded_query = if expanded.is_empty() {
            query.to_string()
        } else {
            expanded.join(" ")
        };

        tracing::debug!(
            query = %query,
            expanded = %expanded_query,
            turns = recent.len(),
            "Expanded contextual query"
        );

        let wider = options
            .clone()
            .with_max_results(options.max_results + search_defaults::CONTEXTUAL_EXTRA_RESULTS);
        let mut results = self.search_inner(&expanded_query, &wider).await?;

        let history_words: HashSet<String> = text::words(&history_text).into_iter().collect();
        for result in &mut results {
            let overlap = context_overlap(result, &history_words);
            result.score = search_defaults::CONTEXTUAL_ORIGINAL_WEIGHT * result.score
                + search_defaults::CONTEXTUAL_OVERLAP_WEIGHT * overlap;
            result.source = SearchSource::Contextual;
        }

        sort_by_score(&mut results);
        results.truncate(options.max_results);
        assign_ranks(&mut results);
        Ok(results)
    }

    // ---- Similar chunks ----

    /// Chunks closest to a stored chunk, excluding the chunk itself
    pub async fn find_similar(
        &self,
        chunk_id: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        self.observe("find_similar", self.find_similar_inner(chunk_id, options))
            .await
    }

    async fn find_similar_inner(
        &self,
        chunk_id: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        if options.max_results == 0 {
            return Err(RagError::InvalidInput("max_results must be at least 1".into()));
        }

        let chunk = self
            .with_deadline(self.store.get(chunk_id))
            .await?
            .map_err(|e| RagError::VectorStore(e.to_string()))?
            .ok_or_else(|| RagError::NotFound(format!("chunk {}", chunk_id)))?;

        let vector = match &chunk.embedding {
            Some(vector) => vector.clone(),
            None => self.embed(&chunk.content).await?,
        };

        let candidates: Vec<SearchResult> = self
            .retrieve(vector, options.max_results + 1, options.filters.clone())
            .await?
            .into_iter()
            .filter(|r| r.id() != chunk_id)
            .collect();

        let ranked = self
            .ranker
            .rank(options.ranking_algorithm, &chunk.content, candidates);
        Ok(post_process(ranked, options))
    }

    // ---- Streaming ----

    /// Results in batches of `stream_batch_size`, pausing between batches
    ///
    /// Ends when a batch comes back empty or `max_results` is reached. Each
    /// call starts a fresh stream; results are not cached.
    pub fn stream_search<'a>(
        &'a self,
        query: &'a str,
        options: SearchOptions,
    ) -> impl Stream<Item = Result<Vec<SearchResult>, RagError>> + Send + 'a {
        try_stream! {
            validate(query, &options)?;

            let vector = self.embed(query).await?;
            let batch_size = self.config.stream_batch_size.max(1);
            let mut seen: HashSet<String> = HashSet::new();

            while seen.len() < options.max_results {
                let want = batch_size.min(options.max_results - seen.len());
                let fetched = self
                    .retrieve(vector.clone(), seen.len() + want, options.filters.clone())
                    .await?;
                let fresh: Vec<SearchResult> = fetched
                    .into_iter()
                    .filter(|r| !seen.contains(r.id()))
                    .take(want)
                    .collect();
                if fresh.is_empty() {
                    break;
                }

                let mut batch = self.ranker.rank(options.ranking_algorithm, query, fresh);
                let offset = seen.len();
                for (i, result) in batch.iter_mut().enumerate() {
                    result.rank = offset + i + 1;
                    seen.insert(result.id().to_string());
                }

                tracing::trace!(query = %query, batch = batch.len(), total = seen.len(), "Streaming batch");
                yield batch;

                if seen.len() < options.max_results {
                    tokio::time::sleep(self.config.stream_delay).await;
                }
            }
        }
    }

    // ---- Backend calls ----

    async fn with_deadline<T, F>(&self, fut: F) -> Result<T, RagError>
    where
        F: Future<Output = T>,
    {
        let timeout = self.config.backend_timeout;
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| RagError::Timeout(timeout.as_millis() as u64))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.with_deadline(self.embedder.embed(text))
            .await?
            .map_err(|e| RagError::Embedding(e.to_string()))
    }

    async fn retrieve(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: Option<Filter>,
    ) -> Result<Vec<SearchResult>, RagError> {
        let query = VectorQuery::new(vector, top_k).with_filter(filter);
        let candidates = self
            .with_deadline(self.store.query(query))
            .await?
            .map_err(|e| RagError::VectorStore(e.to_string()))?;
        Ok(candidates.into_iter().map(SearchResult::from).collect())
    }

    // ---- Cache ----

    fn cache_key(&self, kind: &str, query: &str, options: &SearchOptions) -> Option<String> {
        if options.skip_cache || self.cache.is_none() {
            return None;
        }
        match serde_json::to_string(options) {
            Ok(serialized) => Some(format!("{}::{}::{}", kind, query, serialized)),
            Err(e) => {
                let err = RagError::Cache(e.to_string());
                tracing::warn!(error = %err, "Bypassing search cache");
                None
            },
        }
    }

    fn cache_get(&self, key: Option<&str>) -> Option<Vec<SearchResult>> {
        let (cache, key) = (self.cache.as_ref()?, key?);
        cache.get(key)
    }

    fn cache_put(&self, key: Option<String>, results: &[SearchResult]) {
        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, results.to_vec());
        }
    }

    async fn observe<F>(&self, operation: &str, fut: F) -> Result<Vec<SearchResult>, RagError>
    where
        F: Future<Output = Result<Vec<SearchResult>, RagError>>,
    {
        let start = Instant::now();
        self.events.started(COMPONENT, operation);

        let outcome = fut.await;
        match &outcome {
            Ok(results) => self.events.completed(
                COMPONENT,
                operation,
                start.elapsed().as_millis() as u64,
                results.len(),
            ),
            Err(e) => {
                tracing::warn!(operation, error = %e, "Search failed");
                self.events.failed(COMPONENT, operation, e);
            },
        }
        outcome
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

fn validate(query: &str, options: &SearchOptions) -> Result<(), RagError> {
    if query.trim().is_empty() {
        return Err(RagError::InvalidInput("query is empty".into()));
    }
    if options.max_results == 0 {
        return Err(RagError::InvalidInput("max_results must be at least 1".into()));
    }
    Ok(())
}

/// Diversify, de-duplicate, threshold, truncate and rank
fn post_process(results: Vec<SearchResult>, options: &SearchOptions) -> Vec<SearchResult> {
    let mut topics: HashSet<Vec<String>> = HashSet::new();
    let mut hashes: HashSet<String> = HashSet::new();

    let mut out: Vec<SearchResult> = results
        .into_iter()
        .filter(|r| {
            if !options.diversify {
                return true;
            }
            let topic = text::topic_signature(r.content());
            topic.is_empty() || topics.insert(topic)
        })
        .filter(|r| {
            let hash = if r.chunk.metadata.content_hash.is_empty() {
                text::content_hash(r.content())
            } else {
                r.chunk.metadata.content_hash.clone()
            };
            hashes.insert(hash)
        })
        .filter(|r| options.min_score.map_or(true, |min| r.score >= min))
        .take(options.max_results)
        .collect();

    assign_ranks(&mut out);
    out
}

/// Divide by the list maximum so lists fuse on a common scale
fn normalize_scores(mut results: Vec<SearchResult>) -> Vec<SearchResult> {
    let max = results.iter().map(|r| r.score).fold(f32::MIN, f32::max);
    if max > 0.0 {
        for result in &mut results {
            result.score /= max;
        }
    }
    results
}

/// Fraction of the result's keywords that appear in the conversation
fn context_overlap(result: &SearchResult, history_words: &HashSet<String>) -> f32 {
    let keywords = if result.chunk.metadata.keywords.is_empty() {
        text::extract_keywords(
            result.content(),
            ragline_config::constants::chunking::METADATA_KEYWORDS,
        )
    } else {
        result.chunk.metadata.keywords.clone()
    };
    if keywords.is_empty() {
        return 0.0;
    }
    keywords.iter().filter(|k| history_words.contains(*k)).count() as f32 / keywords.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use crate::vector_store::InMemoryVectorStore;
    use async_trait::async_trait;
    use futures::StreamExt;
    use ragline_core::Chunk;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        inner: HashEmbedder,
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                inner: HashEmbedder::default(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> ragline_core::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }

        fn model_name(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, _text: &str) -> ragline_core::Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![1.0])
        }

        fn model_name(&self) -> &str {
            "slow"
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    struct FailingStore;

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn query(&self, _query: VectorQuery) -> ragline_core::Result<Vec<ragline_core::Candidate>> {
            Err(ragline_core::Error::Backend("connection refused".into()))
        }

        async fn upsert(&self, _chunks: Vec<Chunk>) -> ragline_core::Result<()> {
            Ok(())
        }

        async fn delete(&self, _ids: &[String]) -> ragline_core::Result<()> {
            Ok(())
        }

        async fn get(&self, _id: &str) -> ragline_core::Result<Option<Chunk>> {
            Ok(None)
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Returns fixed candidates regardless of the query vector
    struct ScriptedStore {
        candidates: Vec<ragline_core::Candidate>,
    }

    impl ScriptedStore {
        fn new(entries: &[(&str, f32, &str)]) -> Self {
            let candidates = entries
                .iter()
                .map(|(id, score, keywords)| {
                    let mut chunk = Chunk::new(*id, format!("doc-{}", id), 0, format!("content of {}", id));
                    chunk.metadata.keywords = keywords.split_whitespace().map(String::from).collect();
                    ragline_core::Candidate {
                        chunk,
                        raw_score: *score,
                    }
                })
                .collect();
            Self { candidates }
        }
    }

    #[async_trait]
    impl VectorStore for ScriptedStore {
        async fn query(&self, _query: VectorQuery) -> ragline_core::Result<Vec<ragline_core::Candidate>> {
            Ok(self.candidates.clone())
        }

        async fn upsert(&self, _chunks: Vec<Chunk>) -> ragline_core::Result<()> {
            Ok(())
        }

        async fn delete(&self, _ids: &[String]) -> ragline_core::Result<()> {
            Ok(())
        }

        async fn get(&self, _id: &str) -> ragline_core::Result<Option<Chunk>> {
            Ok(None)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    const CORPUS: &[(&str, &str)] = &[
        ("rust-1", "Rust ownership rules prevent data races at compile time."),
        ("rust-2", "The borrow checker enforces Rust ownership and lifetimes."),
        ("garden", "Gardening needs water, sunlight and healthy compost."),
        ("pasta", "Cooking pasta requires salted boiling water."),
        ("tokio", "Tokio is an async runtime for Rust network services."),
    ];

    fn chunk(id: &str, content: &str) -> Chunk {
        let mut chunk = Chunk::new(id, format!("doc-{}", id), 0, content)
            .with_embedding(HashEmbedder::default().embed_sync(content));
        chunk.metadata.keywords = text::extract_keywords(content, 10);
        chunk.metadata.content_hash = text::content_hash(content);
        chunk
    }

    async fn populated_store(corpus: &[(&str, &str)]) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .upsert(corpus.iter().map(|(id, content)| chunk(id, content)).collect())
            .await
            .unwrap();
        store
    }

    async fn engine_with(embedder: Arc<dyn Embedder>) -> SearchEngine {
        let store = populated_store(CORPUS).await;
        SearchEngine::new(embedder, store, SearchEngineConfig::default())
    }

    async fn engine() -> SearchEngine {
        engine_with(Arc::new(HashEmbedder::default())).await
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.id()).collect()
    }

    #[tokio::test]
    async fn test_search_ranks_relevant_first() {
        let engine = engine().await;
        let results = engine
            .search("rust ownership", &SearchOptions::default().with_max_results(3))
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].id().starts_with("rust"));
        assert!(results[1].id().starts_with("rust"));
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_backend() {
        let embedder = Arc::new(CountingEmbedder::new());
        let engine = engine_with(embedder.clone()).await;

        let err = engine.search("   ", &SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));

        let err = engine
            .search("rust", &SearchOptions::default().with_max_results(0))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_embedder_until_ttl() {
        let embedder = Arc::new(CountingEmbedder::new());
        let engine = engine_with(embedder.clone()).await;
        let options = SearchOptions::default();

        let first = engine.search("rust ownership", &options).await.unwrap();
        let second = engine.search("rust ownership", &options).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(embedder.calls(), 1);
        assert_eq!(engine.cache_len(), 1);

        tokio::time::advance(engine.config().cache.ttl + Duration::from_secs(1)).await;
        engine.search("rust ownership", &options).await.unwrap();
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_skip_cache_and_distinct_options() {
        let embedder = Arc::new(CountingEmbedder::new());
        let engine = engine_with(embedder.clone()).await;

        engine.search("rust", &SearchOptions::default()).await.unwrap();
        engine
            .search("rust", &SearchOptions::default().skip_cache())
            .await
            .unwrap();
        engine
            .search("rust", &SearchOptions::default().with_max_results(2))
            .await
            .unwrap();
        assert_eq!(embedder.calls(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_content_removed() {
        let store = populated_store(&[
            ("a", "Vector search finds similar text."),
            ("b", "Vector search finds similar text."),
            ("c", "Keyword search matches exact terms."),
        ])
        .await;
        let engine = SearchEngine::new(
            Arc::new(HashEmbedder::default()),
            store,
            SearchEngineConfig::default(),
        );

        let results = engine.search("vector search", &SearchOptions::default()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id(), "a");
    }

    #[tokio::test]
    async fn test_diversify_keeps_one_per_topic() {
        let store = populated_store(&[
            ("a", "Vector databases store embeddings. First variant."),
            ("b", "Vector databases store embeddings. Second variant here."),
            ("c", "Compost improves garden soil."),
        ])
        .await;
        let engine = SearchEngine::new(
            Arc::new(HashEmbedder::default()),
            store,
            SearchEngineConfig::default(),
        );

        let results = engine
            .search("vector databases", &SearchOptions::default().with_diversify(true))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(ids(&results).contains(&"c"));
    }

    #[tokio::test]
    async fn test_min_score_threshold() {
        let engine = engine().await;
        let results = engine
            .search("rust ownership", &SearchOptions::default().with_min_score(0.1))
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.score >= 0.1));
        assert!(!ids(&results).contains(&"pasta"));
    }

    #[tokio::test]
    async fn test_filter_passed_to_store() {
        let engine = engine().await;
        let options = SearchOptions::default().with_filter(Filter::eq("document_id", "doc-tokio"));
        let results = engine.search("rust", &options).await.unwrap();
        assert_eq!(ids(&results), vec!["tokio"]);
    }

    #[tokio::test]
    async fn test_hybrid_search_fuses_keyword_matches() {
        let engine = engine().await;
        let results = engine
            .hybrid_search("tokio runtime", &SearchOptions::default().with_max_results(3))
            .await
            .unwrap();

        assert_eq!(results[0].id(), "tokio");
        assert!(results.iter().all(|r| r.source == SearchSource::Hybrid));
        assert_eq!(results[0].rank, 1);
        // Semantic max-normalized to 1.0 plus keyword max-normalized to 1.0
        assert!((results[0].score - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_multi_query_search() {
        let engine = engine().await;
        let queries = vec!["pasta cooking".to_string(), "garden compost".to_string()];
        let results = engine
            .multi_query_search(&queries, &SearchOptions::default().with_max_results(2))
            .await
            .unwrap();

        let found = ids(&results);
        assert!(found.contains(&"pasta"));
        assert!(found.contains(&"garden"));
        assert!(results.iter().all(|r| r.source == SearchSource::MultiQuery));

        let err = engine
            .multi_query_search(&[], &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_contextual_search_without_history_matches_search() {
        let engine = engine().await;
        let options = SearchOptions::default().skip_cache();

        let plain = engine.search("borrow checker", &options).await.unwrap();
        let contextual = engine
            .contextual_search("borrow checker", &[], &options)
            .await
            .unwrap();
        assert_eq!(plain, contextual);
    }

    #[tokio::test]
    async fn test_contextual_search_uses_history() {
        let engine = engine().await;
        let history = vec![ConversationTurn::new(
            "How does the tokio runtime work?",
            "Tokio schedules async tasks for network services.",
        )];

        let results = engine
            .contextual_search("what else should I know", &history, &SearchOptions::default().with_max_results(2))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id(), "tokio");
        assert!(results.iter().all(|r| r.source == SearchSource::Contextual));
        assert_eq!(results[1].rank, 2);
    }

    #[tokio::test]
    async fn test_contextual_rescore_blends_history_overlap() {
        let store = Arc::new(ScriptedStore::new(&[
            ("garden", 0.9, "garden compost"),
            ("tokio", 0.6, "tokio runtime tasks scheduler"),
            ("mixed", 0.5, "tokio compost"),
            ("other", 0.4, "unrelated"),
        ]));
        let engine = SearchEngine::new(
            Arc::new(HashEmbedder::default()),
            store,
            SearchEngineConfig::default(),
        );
        let history = vec![ConversationTurn::new(
            "How does the tokio runtime work?",
            "It schedules tasks.",
        )];

        let results = engine
            .contextual_search(
                "what else",
                &history,
                &SearchOptions::default().with_max_results(2).skip_cache(),
            )
            .await
            .unwrap();

        // tokio: 0.7 * 0.6 + 0.3 * 3/4; garden: 0.7 * 0.9 + 0.3 * 0
        assert_eq!(ids(&results), vec!["tokio", "garden"]);
        assert!((results[0].score - 0.645).abs() < 1e-6, "{}", results[0].score);
        assert!((results[1].score - 0.63).abs() < 1e-6, "{}", results[1].score);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 2);
    }

    #[tokio::test]
    async fn test_find_similar_excludes_self() {
        let engine = engine().await;
        let results = engine
            .find_similar("rust-1", &SearchOptions::default().with_max_results(2))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(!ids(&results).contains(&"rust-1"));
        assert_eq!(results[0].id(), "rust-2");

        let err = engine
            .find_similar("missing", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stream_search_batches() {
        let mut config = SearchEngineConfig::default();
        config.stream_batch_size = 2;
        config.stream_delay = Duration::from_millis(1);
        let store = populated_store(CORPUS).await;
        let engine = SearchEngine::new(Arc::new(HashEmbedder::default()), store, config);

        let batches: Vec<Vec<SearchResult>> = engine
            .stream_search("rust", SearchOptions::default().with_max_results(5))
            .map(|batch| batch.unwrap())
            .collect()
            .await;

        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        let all: Vec<&SearchResult> = batches.iter().flatten().collect();
        let unique: HashSet<&str> = all.iter().map(|r| r.id()).collect();
        assert_eq!(unique.len(), 5);
        let ranks: Vec<usize> = all.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_stream_search_stops_when_exhausted() {
        let store = populated_store(&CORPUS[..3]).await;
        let engine = SearchEngine::new(
            Arc::new(HashEmbedder::default()),
            store,
            SearchEngineConfig {
                stream_batch_size: 2,
                stream_delay: Duration::from_millis(1),
                ..SearchEngineConfig::default()
            },
        );

        let total: usize = engine
            .stream_search("rust", SearchOptions::default().with_max_results(10))
            .map(|batch| batch.unwrap().len())
            .fold(0, |acc, n| async move { acc + n })
            .await;
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let engine = SearchEngine::new(
            Arc::new(HashEmbedder::default()),
            Arc::new(FailingStore),
            SearchEngineConfig::default(),
        );
        let err = engine.search("rust", &SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, RagError::VectorStore(_)));

        let core: ragline_core::Error = err.into();
        assert_eq!(core.kind(), ragline_core::ErrorKind::RetrievalFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_embedder_deadline() {
        let store = populated_store(CORPUS).await;
        let engine = SearchEngine::new(
            Arc::new(SlowEmbedder),
            store,
            SearchEngineConfig {
                backend_timeout: Duration::from_millis(100),
                ..SearchEngineConfig::default()
            },
        );
        let err = engine.search("rust", &SearchOptions::default()).await.unwrap_err();
        assert_eq!(err, RagError::Timeout(100));
    }

    #[tokio::test]
    async fn test_search_emits_events() {
        let events = EventSink::new(8);
        let mut rx = events.subscribe().unwrap();
        let engine = engine().await.with_events(events);

        engine.search("rust", &SearchOptions::default()).await.unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            ragline_core::PipelineEvent::Started { component: COMPONENT, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ragline_core::PipelineEvent::Completed { component: COMPONENT, .. }
        ));
    }
}
