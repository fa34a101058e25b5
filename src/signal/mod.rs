//! Signal scoring.
//!
//! Extracts `$TICKER` mentions from raw text and turns the text into a
//! bounded sentiment value: a deny-list of strong negatives forces zero,
//! otherwise a lexicon polarity in [-1, 1] is mapped onto [0, 1]. The
//! combined confidence (sentiment × source trust) is the only gate in
//! front of chain reads.

pub mod lexicon;

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use lexicon::{DEFAULT_DENY_LIST, LEXICON};

static TICKER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([A-Z]+)").unwrap());

/// Lexicon sum that maps to full polarity.
const POLARITY_SCALE: f64 = 5.0;

pub struct SignalScorer {
    lexicon: HashMap<&'static str, i32>,
    deny_list: Vec<String>,
}

impl Default for SignalScorer {
    fn default() -> Self {
        Self::new(DEFAULT_DENY_LIST.iter().map(|s| s.to_string()).collect())
    }
}

impl SignalScorer {
    pub fn new(deny_list: Vec<String>) -> Self {
        Self {
            lexicon: LEXICON.iter().copied().collect(),
            deny_list: deny_list.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// First `$TICKER` in the text, without the marker.
    pub fn extract_ticker(text: &str) -> Option<String> {
        TICKER_REGEX
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
    }

    /// Whether any token starts with a deny-listed keyword.
    pub fn is_denied(&self, text: &str) -> bool {
        Self::tokens(text).any(|t| self.deny_list.iter().any(|k| t.starts_with(k.as_str())))
    }

    /// Lexicon polarity in [-1, 1].
    pub fn polarity(&self, text: &str) -> f64 {
        let sum: i32 = Self::tokens(text)
            .filter_map(|t| self.lexicon.get(t.as_str()).copied())
            .sum();
        (sum as f64 / POLARITY_SCALE).clamp(-1.0, 1.0)
    }

    /// Sentiment in [0, 1]; exactly 0 when a deny-listed keyword appears.
    pub fn score(&self, text: &str) -> f64 {
        if self.is_denied(text) {
            return 0.0;
        }
        (self.polarity(text) + 1.0) / 2.0
    }

    /// Confidence used by the execution gate.
    pub fn combined_confidence(score: f64, trust: f64) -> f64 {
        score * trust
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
