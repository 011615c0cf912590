//! Lightweight text analysis
//!
//! Keyword frequency ranking, regex entity detection, a script-based language
//! guess and coarse topic signatures. These are approximations and not a
//! substitute for a real NER model or language identifier.
//!
//! Splitting helpers work on byte [`Span`]s into the source text so chunk
//! contents stay exact substrings of the document.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use unicode_segmentation::UnicodeSegmentation;

use ragline_config::constants::chunking;

const SENTENCE_ENDINGS: [char; 4] = ['.', '!', '?', '।'];

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
        "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down",
        "during", "each", "few", "for", "from", "further", "had", "has", "have", "having", "he",
        "her", "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in",
        "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no",
        "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
        "ourselves", "out", "over", "own", "same", "she", "should", "so", "some", "such",
        "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
        "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
        "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
        "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
        "tell", "explain", "describe", "please", "many", "much", "like", "get", "use", "used",
    ]
    .into_iter()
    .collect()
});

static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t\r]*\n\s*").expect("valid blank line regex"));

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex")
});

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("valid url regex"));

static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+\d{1,3}[\s-]?)?(?:\(\d{3}\)|\b\d{3})[\s.-]?\d{3}[\s.-]?\d{4}\b")
        .expect("valid phone regex")
});

static CAPITALIZED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\p{Lu}[\p{L}\p{N}]*(?:[ \t]+\p{Lu}[\p{L}\p{N}]*)*")
        .expect("valid capitalized phrase regex")
});

/// Byte range into a source string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    /// Length in characters
    pub fn char_len(&self, text: &str) -> usize {
        self.slice(text).chars().count()
    }

    /// Smallest span covering both
    pub fn cover(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Trim whitespace from both ends of a span; `None` if nothing is left
pub fn trim_span(text: &str, span: Span) -> Option<Span> {
    let slice = span.slice(text);
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = span.start + (slice.len() - slice.trim_start().len());
    Some(Span::new(start, start + trimmed.len()))
}

/// Sentence spans within `within`
///
/// A sentence ends at `.`, `!`, `?` or `।` followed by whitespace or the end
/// of the range. Leading and trailing whitespace is excluded.
pub fn sentence_spans(text: &str, within: Span) -> Vec<Span> {
    let slice = within.slice(text);
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = slice.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !SENTENCE_ENDINGS.contains(&c) {
            continue;
        }
        let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            let end = i + c.len_utf8();
            if let Some(span) = trim_span(text, Span::new(within.start + start, within.start + end))
            {
                spans.push(span);
            }
            start = end;
        }
    }

    if start < slice.len() {
        if let Some(span) = trim_span(text, Span::new(within.start + start, within.end)) {
            spans.push(span);
        }
    }

    spans
}

/// Sentences of a string
pub fn sentences(text: &str) -> Vec<&str> {
    sentence_spans(text, Span::new(0, text.len()))
        .into_iter()
        .map(|s| s.slice(text))
        .collect()
}

/// Paragraph spans separated by blank lines
pub fn paragraph_spans(text: &str, within: Span) -> Vec<Span> {
    regex_gap_spans(text, within, &BLANK_LINE)
}

/// Spans between occurrences of a literal separator
pub fn separator_spans(text: &str, within: Span, separator: &str) -> Vec<Span> {
    let slice = within.slice(text);
    let mut spans = Vec::new();
    let mut start = 0;
    for (pos, matched) in slice.match_indices(separator) {
        if let Some(span) = trim_span(text, Span::new(within.start + start, within.start + pos)) {
            spans.push(span);
        }
        start = pos + matched.len();
    }
    if let Some(span) = trim_span(text, Span::new(within.start + start, within.end)) {
        spans.push(span);
    }
    spans
}

fn regex_gap_spans(text: &str, within: Span, re: &Regex) -> Vec<Span> {
    let slice = within.slice(text);
    let mut spans = Vec::new();
    let mut start = 0;
    for m in re.find_iter(slice) {
        if let Some(span) =
            trim_span(text, Span::new(within.start + start, within.start + m.start()))
        {
            spans.push(span);
        }
        start = m.end();
    }
    if let Some(span) = trim_span(text, Span::new(within.start + start, within.end)) {
        spans.push(span);
    }
    spans
}

/// Whitespace-delimited word spans
pub fn word_spans(text: &str, within: Span) -> Vec<Span> {
    let slice = within.slice(text);
    let mut spans = Vec::new();
    let mut word_start: Option<usize> = None;

    for (i, c) in slice.char_indices() {
        match (c.is_whitespace(), word_start) {
            (true, Some(start)) => {
                spans.push(Span::new(within.start + start, within.start + i));
                word_start = None;
            },
            (false, None) => word_start = Some(i),
            _ => {},
        }
    }
    if let Some(start) = word_start {
        spans.push(Span::new(within.start + start, within.end));
    }

    spans
}

/// Lowercased words, punctuation removed
pub fn words(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Lowercased words that carry meaning: not stop words, not numbers, longer
/// than two characters
pub fn significant_words(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| {
            w.chars().count() > 2 && !is_stop_word(w) && !w.chars().all(|c| c.is_ascii_digit())
        })
        .collect()
}

/// Stop-word-filtered frequency ranking
///
/// Ties keep first-occurrence order.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (pos, word) in significant_words(text).into_iter().enumerate() {
        counts.entry(word).or_insert((0, pos)).0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked.into_iter().take(limit).map(|(word, _, _)| word).collect()
}

/// Regex-detected emails, URLs and phone numbers, in that order
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut entities = Vec::new();

    for re in [&*EMAIL, &*URL, &*PHONE] {
        for m in re.find_iter(text) {
            let value = m
                .as_str()
                .trim()
                .trim_end_matches(['.', ',', ';', ':', '!', '?'])
                .to_string();
            if seen.insert(value.clone()) {
                entities.push(value);
            }
        }
    }

    entities
}

/// Runs of capitalized words, with leading stop words removed
///
/// "What is Rust Programming" yields `["Rust Programming"]`.
pub fn capitalized_phrases(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut phrases = Vec::new();

    for m in CAPITALIZED.find_iter(text) {
        let tokens: Vec<&str> = m
            .as_str()
            .split_whitespace()
            .skip_while(|t| is_stop_word(&t.to_lowercase()))
            .collect();
        if tokens.is_empty() {
            continue;
        }
        let phrase = tokens.join(" ");
        if phrase.chars().count() < 2 {
            continue;
        }
        if seen.insert(phrase.to_lowercase()) {
            phrases.push(phrase);
        }
    }

    phrases
}

/// Guess the language from its script
///
/// Devanagari-heavy text is `hi`, Latin-heavy text is `en`, anything else is
/// unknown.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let mut letters = 0usize;
    let mut devanagari = 0usize;
    let mut latin = 0usize;

    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if ('\u{0900}'..='\u{097F}').contains(&c) {
            devanagari += 1;
        } else if c.is_ascii_alphabetic() || ('\u{00C0}'..='\u{024F}').contains(&c) {
            latin += 1;
        }
    }

    if letters == 0 {
        return None;
    }
    if devanagari * 10 > letters * 3 {
        Some("hi")
    } else if latin * 2 > letters {
        Some("en")
    } else {
        None
    }
}

/// Coarse topic: the first significant words of the first sentence
pub fn topic_signature(text: &str) -> Vec<String> {
    let first = sentences(text).into_iter().next().unwrap_or("");
    significant_words(first)
        .into_iter()
        .take(chunking::TOPIC_WORDS)
        .collect()
}

/// Jaccard similarity of two word sets; 0.0 when both are empty
pub fn jaccard(a: &[String], b: &[String]) -> f32 {
    let a: HashSet<&String> = a.iter().collect();
    let b: HashSet<&String> = b.iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f32 / union as f32
}

/// SHA-256 of the text, hex encoded
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cut text to at most `max_chars` characters, backing up to a word boundary
///
/// Falls back to a hard cut when the prefix has no whitespace.
pub fn truncate_at_word_boundary(text: &str, max_chars: usize) -> &str {
    let cut = match text.char_indices().nth(max_chars) {
        Some((idx, _)) => idx,
        None => return text,
    };

    let prefix = &text[..cut];
    if text[cut..].starts_with(char::is_whitespace) {
        return prefix.trim_end();
    }
    match prefix.rfind(char::is_whitespace) {
        Some(pos) => prefix[..pos].trim_end(),
        None => prefix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full(text: &str) -> Span {
        Span::new(0, text.len())
    }

    #[test]
    fn test_sentence_spans() {
        let text = "Sentence one. Sentence two!  Sentence three";
        let found = sentences(text);
        assert_eq!(found, vec!["Sentence one.", "Sentence two!", "Sentence three"]);
    }

    #[test]
    fn test_sentence_ignores_inner_periods() {
        let found = sentences("Version 1.5 shipped. Done.");
        assert_eq!(found, vec!["Version 1.5 shipped.", "Done."]);
    }

    #[test]
    fn test_hindi_sentences() {
        let found = sentences("यह पहला वाक्य है। यह दूसरा वाक्य है।");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_paragraph_spans() {
        let text = "First para.\n\n  Second para.\n \nThird.";
        let spans = paragraph_spans(text, full(text));
        let paras: Vec<&str> = spans.iter().map(|s| s.slice(text)).collect();
        assert_eq!(paras, vec!["First para.", "Second para.", "Third."]);
    }

    #[test]
    fn test_word_spans_are_exact() {
        let text = "  alpha beta\tgamma ";
        let spans = word_spans(text, full(text));
        let found: Vec<&str> = spans.iter().map(|s| s.slice(text)).collect();
        assert_eq!(found, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_separator_spans() {
        let text = "a\nb\n\nc";
        let spans = separator_spans(text, full(text), "\n\n");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].slice(text), "a\nb");
    }

    #[test]
    fn test_extract_keywords_by_frequency() {
        let text = "Rust ownership makes memory safety possible. Ownership rules are checked \
                    at compile time. Memory is freed when ownership ends.";
        let keywords = extract_keywords(text, 3);
        assert_eq!(keywords[0], "ownership");
        assert_eq!(keywords[1], "memory");
        assert_eq!(keywords.len(), 3);
        assert!(!keywords.contains(&"the".to_string()));
    }

    #[test]
    fn test_extract_entities() {
        let text = "Mail support@example.com or visit https://example.com/docs, \
                    call 555-123-4567. Released 2024-01-01.";
        let entities = extract_entities(text);
        assert!(entities.contains(&"support@example.com".to_string()));
        assert!(entities.contains(&"https://example.com/docs".to_string()));
        assert!(entities.contains(&"555-123-4567".to_string()));
        assert!(!entities.iter().any(|e| e.contains("2024")));
    }

    #[test]
    fn test_capitalized_phrases() {
        let phrases = capitalized_phrases("What is Rust Programming and how does Tokio work?");
        assert_eq!(phrases, vec!["Rust Programming".to_string(), "Tokio".to_string()]);
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("Hello there"), Some("en"));
        assert_eq!(detect_language("नमस्ते आप कैसे हैं"), Some("hi"));
        assert_eq!(detect_language("12345"), None);
    }

    #[test]
    fn test_topic_signature_and_jaccard() {
        let a = topic_signature("Vector databases store embeddings. Other text.");
        assert_eq!(a, vec!["vector", "databases", "store"]);
        let b = topic_signature("Vector databases index embeddings quickly.");
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-6);
        assert_eq!(jaccard(&[], &[]), 0.0);
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("").len(), 64);
    }

    #[test]
    fn test_truncate_at_word_boundary() {
        assert_eq!(truncate_at_word_boundary("hello world foo", 11), "hello world");
        assert_eq!(truncate_at_word_boundary("hello world foo", 8), "hello");
        assert_eq!(truncate_at_word_boundary("short", 10), "short");
        assert_eq!(truncate_at_word_boundary("abcdefgh", 3), "abc");
    }
}
