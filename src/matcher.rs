//! # Event Matcher
//! Decide whether a candidate article belongs to an existing event.
//!
//! - Titles are normalized: lowercased, every non-word character removed.
//! - Similarity: `strsim::sorensen_dice` over character bigrams.
//! - An event qualifies when its peril equals the candidate's and the score is
//!   strictly above the threshold (default 0.65).
//! - [`MatchStrategy::First`] returns the first qualifying event in window
//!   order; [`MatchStrategy::Best`] returns the highest-scoring one.

use serde::{Deserialize, Serialize};
use strsim::sorensen_dice;
use uuid::Uuid;

use crate::model::{Event, RawArticle};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.65;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    #[default]
    First,
    Best,
}

#[derive(Debug, Clone, Copy)]
pub struct EventMatcher {
    threshold: f64,
    strategy: MatchStrategy,
}

impl Default for EventMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD, MatchStrategy::First)
    }
}

/// Lowercase and keep word characters only (alphanumerics and `_`).
pub fn normalize_title(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Similarity of two raw titles after normalization, in `[0.0, 1.0]`.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    sorensen_dice(&normalize_title(a), &normalize_title(b))
}

impl EventMatcher {
    pub fn new(threshold: f64, strategy: MatchStrategy) -> Self {
        Self {
            threshold,
            strategy,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Returns the id of the event `candidate` should be attached to, or `None`
    /// when it starts a new event.
    pub fn find_match(&self, candidate: &RawArticle, recent: &[Event]) -> Option<Uuid> {
        let norm = normalize_title(&candidate.title);
        // Two empty strings score 1.0; an empty title must never merge.
        if norm.is_empty() {
            return None;
        }

        let mut scored = recent
            .iter()
            .filter(|ev| ev.peril == candidate.peril)
            .map(|ev| (ev, sorensen_dice(&norm, &normalize_title(&ev.canonical_title))))
            .filter(|(_, score)| *score > self.threshold);

        match self.strategy {
            MatchStrategy::First => scored.next().map(|(ev, _)| ev.id),
            MatchStrategy::Best => scored
                .fold(None::<(&Event, f64)>, |best, (ev, score)| match best {
                    Some((_, s)) if s >= score => best,
                    _ => Some((ev, score)),
                })
                .map(|(ev, _)| ev.id),
        }
    }
}
