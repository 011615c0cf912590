//! Document Chunking
//!
//! Splits documents into bounded fragments for indexing and retrieval.
//!
//! # Strategies
//!
//! 1. **Fixed**: accumulate sentences up to `chunk_size`
//! 2. **Semantic** (default): merge blank-line paragraphs while their topics
//!    overlap
//! 3. **Recursive**: split on the coarsest separator that divides the text,
//!    merge back up to `chunk_size`, recurse into oversized pieces
//! 4. **Sliding**: overlapping word windows; a window shorter than
//!    `min_chunk_size` widens into the following words, and a short tail
//!    folds into the previous window
//! 5. **Hybrid**: semantic, then fixed for anything above `max_chunk_size`
//!
//! Topic coherence is a heuristic (Jaccard overlap of the first significant
//! words), not ground truth.
//!
//! Chunk contents are exact substrings of the document. Sizes are measured in
//! characters, except sliding windows which count words.
//!
//! # Usage
//!
//! ```ignore
//! use ragline_rag::chunker::{Chunker, ChunkingOptions};
//!
//! let chunker = Chunker::new(ChunkingOptions::default());
//! let chunks = chunker.chunk(&document)?;
//! ```

use futures::future::join_all;
use ragline_config::constants::chunking;
use ragline_core::{Chunk, ChunkMetadata, ChunkingStrategy, Document, EventSink};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::text::{self, Span};
use crate::RagError;

const COMPONENT: &str = "chunker";

/// Chunking options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingOptions {
    pub strategy: ChunkingStrategy,
    /// Target chunk size (chars; words for sliding windows)
    pub chunk_size: usize,
    /// Window overlap (words) for sliding windows
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    /// Hybrid re-split threshold (chars)
    pub max_chunk_size: usize,
    /// Store a `[Title]` prefix for embedding
    pub include_context_prefix: bool,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::default(),
            chunk_size: chunking::CHUNK_SIZE,
            chunk_overlap: chunking::CHUNK_OVERLAP,
            min_chunk_size: chunking::MIN_CHUNK_SIZE,
            max_chunk_size: chunking::MAX_CHUNK_SIZE,
            include_context_prefix: true,
        }
    }
}

impl From<&ragline_config::ChunkingConfig> for ChunkingOptions {
    fn from(config: &ragline_config::ChunkingConfig) -> Self {
        Self {
            strategy: config.strategy,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            min_chunk_size: config.min_chunk_size,
            max_chunk_size: config.max_chunk_size,
            include_context_prefix: config.include_context_prefix,
        }
    }
}

impl ChunkingOptions {
    pub fn with_strategy(mut self, strategy: ChunkingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Reject option combinations that cannot chunk anything
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidInput("chunk_size must be at least 1".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidInput(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.max_chunk_size == 0 {
            return Err(RagError::InvalidInput("max_chunk_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Result of batch chunking
///
/// One failing document never aborts the batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Chunks per successfully processed document, in input order
    pub chunks: Vec<(String, Vec<Chunk>)>,
    /// Failed documents with their errors
    pub failures: Vec<(String, RagError)>,
}

impl BatchOutcome {
    pub fn total_chunks(&self) -> usize {
        self.chunks.iter().map(|(_, c)| c.len()).sum()
    }
}

/// Document chunker
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    options: ChunkingOptions,
    events: EventSink,
}

impl Chunker {
    pub fn new(options: ChunkingOptions) -> Self {
        Self {
            options,
            events: EventSink::disabled(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn options(&self) -> &ChunkingOptions {
        &self.options
    }

    /// Chunk with the default options
    pub fn chunk(&self, document: &Document) -> Result<Vec<Chunk>, RagError> {
        self.chunk_with(document, &self.options)
    }

    /// Chunk with explicit options
    pub fn chunk_with(
        &self,
        document: &Document,
        options: &ChunkingOptions,
    ) -> Result<Vec<Chunk>, RagError> {
        let start = Instant::now();
        self.events.started(COMPONENT, document.id.clone());

        match chunk_document(document, options) {
            Ok(chunks) => {
                tracing::debug!(
                    document_id = %document.id,
                    strategy = %options.strategy,
                    chunks = chunks.len(),
                    "Chunked document"
                );
                self.events.completed(
                    COMPONENT,
                    document.id.clone(),
                    start.elapsed().as_millis() as u64,
                    chunks.len(),
                );
                Ok(chunks)
            },
            Err(e) => {
                tracing::warn!(document_id = %document.id, error = %e, "Chunking failed");
                self.events.failed(COMPONENT, document.id.clone(), e.to_string());
                Err(e)
            },
        }
    }

    /// Chunk many documents in concurrent groups of `concurrency`
    ///
    /// `on_progress(completed, total)` is called after each group.
    pub async fn process_batch<F>(
        &self,
        documents: Vec<Document>,
        concurrency: usize,
        mut on_progress: F,
    ) -> BatchOutcome
    where
        F: FnMut(usize, usize),
    {
        let total = documents.len();
        let group_size = concurrency.max(1);
        let mut outcome = BatchOutcome::default();
        let mut completed = 0;

        let mut remaining = documents.into_iter().peekable();
        while remaining.peek().is_some() {
            let group: Vec<Document> = remaining.by_ref().take(group_size).collect();

            let tasks = group.into_iter().map(|document| {
                let chunker = self.clone();
                let id = document.id.clone();
                let handle = tokio::task::spawn_blocking(move || chunker.chunk(&document));
                async move { (id, handle.await) }
            });

            for (id, joined) in join_all(tasks).await {
                match joined {
                    Ok(Ok(chunks)) => outcome.chunks.push((id, chunks)),
                    Ok(Err(e)) => outcome.failures.push((id, e)),
                    Err(join_err) => {
                        tracing::warn!(document_id = %id, error = %join_err, "Chunking task failed");
                        outcome
                            .failures
                            .push((id, RagError::Search(join_err.to_string())));
                    },
                }
                completed += 1;
            }

            self.events.progress(COMPONENT, completed, total);
            on_progress(completed, total);
        }

        tracing::info!(
            documents = total,
            chunks = outcome.total_chunks(),
            failures = outcome.failures.len(),
            "Batch chunking complete"
        );

        outcome
    }
}

/// Chunk a document (pure)
pub fn chunk_document(
    document: &Document,
    options: &ChunkingOptions,
) -> Result<Vec<Chunk>, RagError> {
    options.validate()?;

    let text = document.content.as_str();
    let whole = match text::trim_span(text, Span::new(0, text.len())) {
        Some(span) => span,
        None => {
            return Err(RagError::InvalidInput(format!(
                "document {} has no content",
                document.id
            )))
        },
    };

    let spans = if whole.char_len(text) < options.min_chunk_size {
        vec![whole]
    } else {
        match options.strategy {
            ChunkingStrategy::Fixed => fixed_spans(text, whole, options),
            ChunkingStrategy::Semantic => semantic_spans(text, whole, options),
            ChunkingStrategy::Recursive => recursive_spans(text, whole, options.chunk_size, 0),
            ChunkingStrategy::Sliding => sliding_spans(text, whole, options),
            ChunkingStrategy::Hybrid => hybrid_spans(text, whole, options),
        }
    };

    Ok(build_chunks(document, &spans, options))
}

/// Accumulate sentences; flush when the next one would overflow `chunk_size`
/// and the current chunk already exceeds `min_chunk_size`
fn fixed_spans(text: &str, within: Span, options: &ChunkingOptions) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut current: Option<Span> = None;

    for sentence in text::sentence_spans(text, within) {
        current = match current {
            None => Some(sentence),
            Some(cur) => {
                let combined = cur.cover(sentence);
                if combined.char_len(text) > options.chunk_size
                    && cur.char_len(text) > options.min_chunk_size
                {
                    spans.push(cur);
                    Some(sentence)
                } else {
                    Some(combined)
                }
            },
        };
    }

    spans.extend(current);
    spans
}

/// Merge consecutive paragraphs while their topics overlap
fn semantic_spans(text: &str, within: Span, options: &ChunkingOptions) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut current: Option<(Span, Vec<String>)> = None;

    for paragraph in text::paragraph_spans(text, within) {
        let topic = text::topic_signature(paragraph.slice(text));

        current = match current {
            None => Some((paragraph, topic)),
            Some((cur, prev_topic)) => {
                let coherent = text::jaccard(&prev_topic, &topic) >= chunking::COHERENCE_THRESHOLD;
                if coherent && cur.char_len(text) < options.chunk_size {
                    Some((cur.cover(paragraph), topic))
                } else {
                    spans.push(cur);
                    Some((paragraph, topic))
                }
            },
        };
    }

    spans.extend(current.map(|(span, _)| span));
    spans
}

#[derive(Clone, Copy)]
enum Separator {
    Literal(&'static str),
    Sentence,
    Word,
}

const SEPARATORS: [Separator; 5] = [
    Separator::Literal("\n\n\n"),
    Separator::Literal("\n\n"),
    Separator::Literal("\n"),
    Separator::Sentence,
    Separator::Word,
];

fn split_on(text: &str, within: Span, separator: Separator) -> Vec<Span> {
    match separator {
        Separator::Literal(sep) => text::separator_spans(text, within, sep),
        Separator::Sentence => text::sentence_spans(text, within),
        Separator::Word => text::word_spans(text, within),
    }
}

/// Split on the first separator that divides the span, merge pieces back up
/// to `chunk_size`, recurse into oversized pieces with the next separator
///
/// Terminates: every recursion moves down the finite separator list, and a
/// single word is never split further.
fn recursive_spans(text: &str, within: Span, chunk_size: usize, level: usize) -> Vec<Span> {
    if within.char_len(text) <= chunk_size {
        return vec![within];
    }

    for (depth, separator) in SEPARATORS.iter().enumerate().skip(level) {
        let pieces = split_on(text, within, *separator);
        if pieces.len() <= 1 {
            continue;
        }

        let mut merged = Vec::new();
        let mut current: Option<Span> = None;
        for piece in pieces {
            current = match current {
                None => Some(piece),
                Some(cur) if cur.cover(piece).char_len(text) <= chunk_size => {
                    Some(cur.cover(piece))
                },
                Some(cur) => {
                    merged.push(cur);
                    Some(piece)
                },
            };
        }
        merged.extend(current);

        return merged
            .into_iter()
            .flat_map(|span| {
                if span.char_len(text) > chunk_size {
                    recursive_spans(text, span, chunk_size, depth + 1)
                } else {
                    vec![span]
                }
            })
            .collect();
    }

    vec![within]
}

/// Overlapping windows of `chunk_size` words advancing by
/// `chunk_size - chunk_overlap` words
///
/// A window shorter than `min_chunk_size` characters widens word by word
/// until it is long enough; a short final window folds into the previous
/// one. Every word lands in some window.
fn sliding_spans(text: &str, within: Span, options: &ChunkingOptions) -> Vec<Span> {
    let words = text::word_spans(text, within);
    if words.is_empty() {
        return Vec::new();
    }

    let window = options.chunk_size.max(1);
    let step = options.chunk_size.saturating_sub(options.chunk_overlap).max(1);
    let mut spans: Vec<Span> = Vec::new();
    let mut start = 0;

    loop {
        let mut end = (start + window).min(words.len());
        while end < words.len()
            && words[start].cover(words[end - 1]).char_len(text) < options.min_chunk_size
        {
            end += 1;
        }
        let span = words[start].cover(words[end - 1]);
        let is_last = end == words.len();

        if span.char_len(text) >= options.min_chunk_size {
            spans.push(span);
        } else if is_last {
            match spans.last_mut() {
                Some(prev) => *prev = prev.cover(span),
                None => spans.push(span),
            }
        }

        if is_last {
            break;
        }
        // a widened window pushes the next one past it, keeping the overlap
        start = (start + step).max(end.saturating_sub(options.chunk_overlap));
    }

    spans
}

/// Semantic, then fixed re-splitting of anything above `max_chunk_size`
fn hybrid_spans(text: &str, within: Span, options: &ChunkingOptions) -> Vec<Span> {
    semantic_spans(text, within, options)
        .into_iter()
        .flat_map(|span| {
            if span.char_len(text) > options.max_chunk_size {
                fixed_spans(text, span, options)
            } else {
                vec![span]
            }
        })
        .collect()
}

fn build_chunks(document: &Document, spans: &[Span], options: &ChunkingOptions) -> Vec<Chunk> {
    let text = document.content.as_str();
    let base = ChunkMetadata::from_document(document);
    let context_prefix = if options.include_context_prefix {
        document.title.as_ref().map(|title| format!("[{}]", title))
    } else {
        None
    };

    spans
        .iter()
        .filter_map(|span| text::trim_span(text, *span))
        .enumerate()
        .map(|(index, span)| {
            let content = span.slice(text);
            let metadata = ChunkMetadata {
                language: base
                    .language
                    .clone()
                    .or_else(|| text::detect_language(content).map(str::to_string)),
                strategy: Some(options.strategy.as_str().to_string()),
                start_char: span.start,
                end_char: span.end,
                context_prefix: context_prefix.clone(),
                keywords: text::extract_keywords(content, chunking::METADATA_KEYWORDS),
                entities: text::extract_entities(content),
                content_hash: text::content_hash(content),
                ..base.clone()
            };
            Chunk::new(
                format!("{}_chunk_{}", document.id, index),
                document.id.clone(),
                index,
                content,
            )
            .with_metadata(metadata)
        })
        .collect()
}
