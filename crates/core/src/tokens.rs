//! Token estimation
//!
//! The default heuristic is `ceil(characters / 4)`. Callers with access to a
//! real tokenizer can supply their own [`TokenEstimator`].

/// Characters per token for the default estimator
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Estimates the generator-input size of a piece of text
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// Character-ratio estimator
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    pub fn chars_per_token(&self) -> usize {
        self.chars_per_token
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

/// Estimate tokens with the default ratio
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(DEFAULT_CHARS_PER_TOKEN)
}
