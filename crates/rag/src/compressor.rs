//! Rule-based summarization
//!
//! Fallback [`Summarizer`] used by context compression when no model-backed
//! summarizer is configured: cut at a word boundary and mark the cut.

use async_trait::async_trait;
use ragline_config::constants::context;
use ragline_core::{Result, Summarizer};

use crate::text;

/// Word-boundary truncation with a `... [summarized]` marker
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncatingSummarizer;

impl TruncatingSummarizer {
    /// Synchronous form, also used as the fallback when another summarizer fails
    pub fn truncate(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        format!(
            "{}{}",
            text::truncate_at_word_boundary(text, max_chars),
            context::SUMMARY_MARKER
        )
    }
}

#[async_trait]
impl Summarizer for TruncatingSummarizer {
    async fn summarize(&self, text: &str, max_chars: usize) -> Result<String> {
        Ok(Self::truncate(text, max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_short_text_unchanged() {
        let out = TruncatingSummarizer.summarize("short text", 100).await.unwrap();
        assert_eq!(out, "short text");
    }

    #[tokio::test]
    async fn test_long_text_cut_at_word() {
        let out = TruncatingSummarizer
            .summarize("alpha beta gamma delta", 12)
            .await
            .unwrap();
        assert_eq!(out, "alpha beta... [summarized]");
    }
}
