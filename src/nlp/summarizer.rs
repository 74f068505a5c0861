use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::nlp::text::{split_into_sentences, word_count};

/// Length bounds for one summary in model tokens, derived from the
/// character length of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLength {
    pub min: usize,
    pub max: usize,
}

impl SummaryLength {
    /// The same bounds as word counts, scaled by the words per character of
    /// `text`. `max` stays at least one word.
    pub fn in_words(&self, text: &str) -> Self {
        let chars = text.chars().count();
        if chars == 0 {
            return Self { min: 0, max: 0 };
        }
        let density = word_count(text) as f64 / chars as f64;
        let max = ((self.max as f64 * density).round() as usize).max(1);
        let min = ((self.min as f64 * density).round() as usize).min(max);
        Self { min, max }
    }

    /// Bounds derived from an input length: `max = min(cap_max, len - max_gap)`,
    /// `min = min(cap_min, max - min_gap)`. `None` when `max` is not positive.
    pub fn for_input(input_len: usize, cap_max: i64, max_gap: i64, cap_min: i64, min_gap: i64) -> Option<Self> {
        let max = cap_max.min(input_len as i64 - max_gap);
        if max <= 0 {
            return None;
        }
        let min = cap_min.min(max - min_gap).max(0);
        Some(Self {
            min: min as usize,
            max: max as usize,
        })
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, length: SummaryLength) -> Result<String>;
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "in", "is",
    "it", "its", "of", "on", "or", "that", "the", "their", "this", "to", "was", "we", "were", "will",
    "with", "you",
];

/// Picks the highest scoring sentences by word frequency, keeping their
/// original order.
#[derive(Debug, Default, Clone)]
pub struct ExtractiveSummarizer;

impl ExtractiveSummarizer {
    pub fn new() -> Self {
        Self
    }

    fn normalize(word: &str) -> String {
        word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
    }

    fn score_sentences(sentences: &[String]) -> Vec<f64> {
        let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
        let mut frequencies: HashMap<String, usize> = HashMap::new();
        for sentence in sentences {
            for word in sentence.split_whitespace().map(Self::normalize) {
                if !word.is_empty() && !stop.contains(word.as_str()) {
                    *frequencies.entry(word).or_default() += 1;
                }
            }
        }

        sentences
            .iter()
            .map(|sentence| {
                let words: Vec<String> = sentence.split_whitespace().map(Self::normalize).collect();
                if words.is_empty() {
                    return 0.0;
                }
                let total: usize = words.iter().filter_map(|w| frequencies.get(w)).sum();
                total as f64 / words.len() as f64
            })
            .collect()
    }

    /// Synchronous core of [`Summarizer::summarize`], with `length` in words.
    pub fn summarize_text(&self, text: &str, length: SummaryLength) -> String {
        let sentences = split_into_sentences(text);
        if sentences.is_empty() || length.max == 0 {
            return String::new();
        }

        let scores = Self::score_sentences(&sentences);
        let mut ranked: Vec<usize> = (0..sentences.len()).collect();
        // stable sort keeps earlier sentences first on ties
        ranked.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

        let mut chosen = Vec::new();
        let mut words = 0usize;
        for index in ranked {
            let count = word_count(&sentences[index]);
            if words + count <= length.max {
                chosen.push(index);
                words += count;
            }
            if words >= length.max {
                break;
            }
        }

        // top up to the minimum even past the maximum
        if words < length.min {
            for index in 0..sentences.len() {
                if words >= length.min {
                    break;
                }
                if !chosen.contains(&index) {
                    chosen.push(index);
                    words += word_count(&sentences[index]);
                }
            }
        }

        if chosen.is_empty() {
            // every sentence is longer than the budget, cut the best one
            let best = scores
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
                .map(|(i, _)| i)
                .unwrap_or(0);
            return sentences[best]
                .split_whitespace()
                .take(length.max)
                .collect::<Vec<_>>()
                .join(" ");
        }

        chosen.sort_unstable();
        chosen
            .into_iter()
            .map(|i| sentences[i].as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, text: &str, length: SummaryLength) -> Result<String> {
        Ok(self.summarize_text(text, length.in_words(text)))
    }
}
