//! Fuzzy name similarity.
//!
//! Both sides are reduced with [`normalize_name`] and scored as
//! `1 - levenshtein / max_len`, counting chars. Identical normalized forms
//! score exactly `1.0`.
//!
//! Reference scores at the default thresholds:
//!
//! | query | candidate | score |
//! |-------|-----------|-------|
//! | `Milk` | `  MILK!` | 1.000 |
//! | `Organic Chicken Breast` | `Organic Chicken Breasts` | 0.957 |
//! | `Chicken Breast` | `Chicken Breasts` | 0.933 |
//! | `Milk` | `Silk` | 0.750 |
//! | `Chicken Breast` | `Chicken Breast Organic` | 0.636 |
//!
//! Ties go to the corpus entry encountered first.

use std::fmt;

use crate::normalize::normalize_name;

/// A corpus entry that scored at or above the caller's threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch<V> {
    pub value: V,
    pub similarity: f64,
    /// Position of the entry in the corpus.
    pub index: usize,
}

/// Similarity of two raw names in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(&normalize_name(a), &normalize_name(b))
}

fn normalized_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(a, b);
    (1.0 - distance as f64 / max_len as f64).max(0.0)
}

/// Highest-scoring entry with score `>= threshold`, first one on ties.
pub fn best_match<K, V, I>(query: &str, corpus: I, threshold: f64) -> Option<SimilarityMatch<V>>
where
    K: AsRef<str>,
    I: IntoIterator<Item = (K, V)>,
{
    let query = normalize_name(query);
    let mut best: Option<SimilarityMatch<V>> = None;

    for (index, (key, value)) in corpus.into_iter().enumerate() {
        let score = normalized_similarity(&query, &normalize_name(key.as_ref()));
        if score < threshold {
            continue;
        }
        let better = match &best {
            Some(current) => score > current.similarity,
            None => true,
        };
        if better {
            best = Some(SimilarityMatch {
                value,
                similarity: score,
                index,
            });
        }
    }

    best
}

/// Every entry with score `>= threshold`, highest first. Equal scores keep
/// corpus order.
pub fn all_matches<K, V, I>(query: &str, corpus: I, threshold: f64) -> Vec<SimilarityMatch<V>>
where
    K: AsRef<str>,
    I: IntoIterator<Item = (K, V)>,
{
    let query = normalize_name(query);
    let mut matches: Vec<SimilarityMatch<V>> = corpus
        .into_iter()
        .enumerate()
        .filter_map(|(index, (key, value))| {
            let score = normalized_similarity(&query, &normalize_name(key.as_ref()));
            (score >= threshold).then_some(SimilarityMatch {
                value,
                similarity: score,
                index,
            })
        })
        .collect();
    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches
}

/// Coarse label for a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchConfidence {
    Exact,
    High,
    Medium,
    Low,
    None,
}

impl MatchConfidence {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.95 {
            MatchConfidence::Exact
        } else if score >= 0.85 {
            MatchConfidence::High
        } else if score >= 0.70 {
            MatchConfidence::Medium
        } else if score >= 0.50 {
            MatchConfidence::Low
        } else {
            MatchConfidence::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchConfidence::Exact => "exact",
            MatchConfidence::High => "high",
            MatchConfidence::Medium => "medium",
            MatchConfidence::Low => "low",
            MatchConfidence::None => "none",
        }
    }
}

impl fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
