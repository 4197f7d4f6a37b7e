//! Text-structure features of a model response

use crate::config::KeywordConfig;
use crate::models::{FeatureVector, ResponseRecord, ResponseStatus};
use regex::Regex;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+\s").expect("heading pattern"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-*\u{2022}]\s").expect("bullet pattern"));
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s").expect("numbered list pattern"));
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence pattern"));

const CODE_FENCE: &str = "```";

/// Extracts a [`FeatureVector`] from response text
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    error_marker: String,
    technical: Vec<String>,
    solution: Vec<String>,
    cause: Vec<String>,
    alternative: Vec<String>,
    error: Vec<String>,
    visual_markers: Vec<String>,
}

fn lowercased(words: &[String]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

impl FeatureExtractor {
    pub fn new(keywords: &KeywordConfig) -> Self {
        Self {
            error_marker: keywords.error_marker.clone(),
            technical: lowercased(&keywords.technical),
            solution: lowercased(&keywords.solution),
            cause: lowercased(&keywords.cause),
            alternative: lowercased(&keywords.alternative),
            error: lowercased(&keywords.error),
            visual_markers: keywords.visual_markers.clone(),
        }
    }

    /// Features of a stored record; anything but a successful response gets the empty vector
    pub fn extract_record(&self, record: &ResponseRecord) -> FeatureVector {
        match (record.status, record.text.as_deref()) {
            (ResponseStatus::Success, Some(text)) => self.extract(text),
            _ => FeatureVector::empty(),
        }
    }

    /// Extract all features from a response text
    pub fn extract(&self, text: &str) -> FeatureVector {
        if text.is_empty() || text.starts_with(&self.error_marker) {
            return FeatureVector::empty();
        }

        let lower = text.to_lowercase();
        let (sentence_count, avg_sentence_length) = sentence_stats(text);

        FeatureVector {
            word_count: text.split_whitespace().count(),
            code_blocks: text.matches(CODE_FENCE).count() / 2,
            headings: HEADING.find_iter(text).count(),
            bullet_points: BULLET.find_iter(text).count(),
            numbered_lists: NUMBERED.find_iter(text).count(),
            technical_terms: self
                .technical
                .iter()
                .map(|keyword| count_occurrences(&lower, keyword))
                .sum(),
            has_error_keyword: contains_any(&lower, &self.error),
            has_solution_keyword: contains_any(&lower, &self.solution),
            has_cause_keyword: contains_any(&lower, &self.cause),
            has_alternative_keyword: contains_any(&lower, &self.alternative),
            paragraph_count: text
                .split("\n\n")
                .filter(|p| !p.trim().is_empty())
                .count(),
            has_visual_markers: self.visual_markers.iter().any(|m| text.contains(m.as_str())),
            sentence_count,
            avg_sentence_length,
        }
    }
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|k| !k.is_empty() && haystack.contains(k.as_str()))
}

/// Sentence count and mean words per sentence
fn sentence_stats(text: &str) -> (usize, f64) {
    let sentences: Vec<&str> = SENTENCE_END
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.is_empty() {
        return (0, 0.0);
    }

    let words: usize = sentences.iter().map(|s| s.split_whitespace().count()).sum();
    (sentences.len(), words as f64 / sentences.len() as f64)
}
