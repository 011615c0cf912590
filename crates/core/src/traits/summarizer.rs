//! Summarization hook used by context compression

use async_trait::async_trait;

use crate::Result;

/// Shortens text to roughly `max_chars` characters
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, max_chars: usize) -> Result<String>;
}
