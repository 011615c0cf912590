//! Query analysis
//!
//! Surface-pattern intent tagging plus entity and keyword extraction. The
//! result enriches logging and response metadata; it never changes which
//! pipeline steps run.

use once_cell::sync::Lazy;
use ragline_rag::text;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const QUERY_KEYWORDS: usize = ragline_config::constants::search::QUERY_KEYWORDS;

static COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(compare|comparison|difference between|differences between|versus|vs\.?|better than|worse than)\b")
        .expect("valid comparison pattern")
});

static CAUSAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*why\b|\b(what causes|what caused|reason for|reasons for|because of|leads to|result of)\b")
        .expect("valid causal pattern")
});

static DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(what is|what are|what's|who is|who are|define|definition of|meaning of)\b")
        .expect("valid definition pattern")
});

static EXPLANATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(how|explain|describe|walk me through|tell me how)\b")
        .expect("valid explanation pattern")
});

/// Coarse query intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Definition,
    Explanation,
    Comparison,
    Causal,
    #[default]
    General,
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryIntent::Definition => "definition",
            QueryIntent::Explanation => "explanation",
            QueryIntent::Comparison => "comparison",
            QueryIntent::Causal => "causal",
            QueryIntent::General => "general",
        };
        f.write_str(name)
    }
}

/// Analysis of one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    /// Trimmed query text
    pub text: String,
    pub intent: QueryIntent,
    /// Capitalized phrases
    pub entities: Vec<String>,
    pub keywords: Vec<String>,
}

/// Stateless query analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryAnalyzer;

impl QueryAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let text = query.trim().to_string();
        QueryAnalysis {
            intent: self.intent(&text),
            entities: text::capitalized_phrases(&text),
            keywords: text::extract_keywords(&text, QUERY_KEYWORDS),
            text,
        }
    }

    /// Comparison and causal patterns win over the question-word patterns
    pub fn intent(&self, query: &str) -> QueryIntent {
        if COMPARISON.is_match(query) {
            QueryIntent::Comparison
        } else if CAUSAL.is_match(query) {
            QueryIntent::Causal
        } else if DEFINITION.is_match(query) {
            QueryIntent::Definition
        } else if EXPLANATION.is_match(query) {
            QueryIntent::Explanation
        } else {
            QueryIntent::General
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intents() {
        let analyzer = QueryAnalyzer::new();
        let cases = [
            ("What is a context window?", QueryIntent::Definition),
            ("define reciprocal rank fusion", QueryIntent::Definition),
            ("How does the cache expire entries?", QueryIntent::Explanation),
            ("Explain hybrid search", QueryIntent::Explanation),
            ("Compare BM25 and TF-IDF", QueryIntent::Comparison),
            ("What is the difference between RRF and weighted fusion?", QueryIntent::Comparison),
            ("Why does the sweeper run every TTL?", QueryIntent::Causal),
            ("What causes a degraded response?", QueryIntent::Causal),
            ("Tokio runtime tuning tips", QueryIntent::General),
        ];
        for (query, expected) in cases {
            assert_eq!(analyzer.intent(query), expected, "{}", query);
        }
    }

    #[test]
    fn test_analysis_extracts_entities_and_keywords() {
        let analysis = QueryAnalyzer::new().analyze("  What is Rust Programming and why use Rust?  ");

        assert_eq!(analysis.text, "What is Rust Programming and why use Rust?");
        assert_eq!(analysis.intent, QueryIntent::Definition);
        assert_eq!(analysis.entities, vec!["Rust Programming".to_string(), "Rust".to_string()]);
        assert_eq!(analysis.keywords[0], "rust");
        assert!(!analysis.keywords.contains(&"what".to_string()));
    }

    #[test]
    fn test_intent_display() {
        assert_eq!(QueryIntent::Causal.to_string(), "causal");
        assert_eq!(QueryIntent::default(), QueryIntent::General);
    }
}
