//! Documents and the chunks derived from them
//!
//! Both types are immutable once produced. Re-ingesting a document replaces
//! its chunks; a truncated or summarized chunk is always a new value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Document-level metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// ISO language code, if known
    #[serde(default)]
    pub language: Option<String>,
    /// Document type (e.g. "faq", "manual")
    #[serde(default, rename = "type")]
    pub doc_type: Option<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Caller-defined fields
    #[serde(default)]
    pub custom: HashMap<String, serde_json::Value>,
}

/// A source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub title: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a document with a random ID
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), content)
    }

    /// Create a document with an explicit ID
    pub fn with_id(id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            content: content.into(),
            title: None,
            source: None,
            metadata: DocumentMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }
}

/// Chunk metadata: inherited document fields plus chunk-specific ones
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub title: Option<String>,
    pub source: Option<String>,
    pub language: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Chunking strategy that produced this chunk
    pub strategy: Option<String>,
    /// Byte offsets into the source document
    pub start_char: usize,
    pub end_char: usize,
    /// Title prefix for embedding, not part of `content`
    pub context_prefix: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    /// SHA-256 of the content, hex encoded
    pub content_hash: String,
    #[serde(default)]
    pub truncated: bool,
    /// Length in characters before truncation
    pub original_length: Option<usize>,
    #[serde(default)]
    pub summarized: bool,
    /// Section title for hierarchical context headers
    pub section: Option<String>,
    #[serde(default)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl ChunkMetadata {
    /// Inherit document-level fields
    pub fn from_document(document: &Document) -> Self {
        Self {
            title: document.title.clone(),
            source: document.source.clone(),
            language: document.metadata.language.clone(),
            doc_type: document.metadata.doc_type.clone(),
            tags: document.metadata.tags.clone(),
            created_at: Some(document.created_at),
            custom: document.metadata.custom.clone(),
            ..Default::default()
        }
    }
}

/// A bounded fragment of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    /// Parent document (non-owning back-reference)
    pub document_id: String,
    /// 0-based position within the document
    pub index: usize,
    pub content: String,
    pub token_estimate: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Minimal chunk, mostly useful for tests and pseudo-chunks
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        index: usize,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            document_id: document_id.into(),
            index,
            token_estimate: crate::tokens::estimate_tokens(&content),
            content,
            embedding: None,
            metadata: ChunkMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Content with the context prefix, as handed to an embedder
    pub fn text_with_context(&self) -> String {
        match &self.metadata.context_prefix {
            Some(prefix) => format!("{} {}", prefix, self.content),
            None => self.content.clone(),
        }
    }

    /// Look up a field for metadata filtering
    ///
    /// Well-known names resolve to typed fields; anything else falls back to
    /// the custom map.
    pub fn field(&self, name: &str) -> Option<serde_json::Value> {
        use serde_json::Value;

        let meta = &self.metadata;
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "documentId" | "document_id" => Some(Value::String(self.document_id.clone())),
            "index" => Some(Value::from(self.index as u64)),
            "title" => meta.title.clone().map(Value::String),
            "source" => meta.source.clone().map(Value::String),
            "language" => meta.language.clone().map(Value::String),
            "type" => meta.doc_type.clone().map(Value::String),
            "tags" => Some(Value::from(meta.tags.clone())),
            "keywords" => Some(Value::from(meta.keywords.clone())),
            "entities" => Some(Value::from(meta.entities.clone())),
            "createdAt" | "created_at" => meta
                .created_at
                .map(|ts| Value::from(ts.timestamp_millis())),
            "strategy" => meta.strategy.clone().map(Value::String),
            other => meta.custom.get(other).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builder() {
        let doc = Document::with_id("doc-1", "Body text")
            .with_title("Guide")
            .with_source("guide.md");

        assert_eq!(doc.id, "doc-1");
        assert_eq!(doc.title.as_deref(), Some("Guide"));
        assert_eq!(doc.created_at, doc.updated_at);
    }

    #[test]
    fn test_chunk_metadata_inherits_document() {
        let doc = Document::with_id("doc-1", "Body").with_metadata(DocumentMetadata {
            language: Some("en".into()),
            tags: vec!["faq".into()],
            ..Default::default()
        });

        let meta = ChunkMetadata::from_document(&doc);
        assert_eq!(meta.language.as_deref(), Some("en"));
        assert_eq!(meta.tags, vec!["faq".to_string()]);
        assert_eq!(meta.created_at, Some(doc.created_at));
    }

    #[test]
    fn test_chunk_field_lookup() {
        let mut meta = ChunkMetadata {
            language: Some("en".into()),
            ..Default::default()
        };
        meta.custom.insert("priority".into(), serde_json::json!(3));
        let chunk = Chunk::new("c1", "doc-1", 0, "hello").with_metadata(meta);

        assert_eq!(chunk.field("language"), Some(serde_json::json!("en")));
        assert_eq!(chunk.field("documentId"), Some(serde_json::json!("doc-1")));
        assert_eq!(chunk.field("priority"), Some(serde_json::json!(3)));
        assert_eq!(chunk.field("missing"), None);
    }

    #[test]
    fn test_text_with_context() {
        let mut chunk = Chunk::new("c1", "d1", 0, "Main content.");
        assert_eq!(chunk.text_with_context(), "Main content.");

        chunk.metadata.context_prefix = Some("[Guide]".into());
        assert_eq!(chunk.text_with_context(), "[Guide] Main content.");
    }
}
