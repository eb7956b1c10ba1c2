//! Duplicate classification.
//!
//! Decides, for a normalized candidate and a catalog snapshot, whether the
//! observation is new, a further price point for a known item, or a
//! duplicate that must not be stored. Evaluated in order:
//!
//! 1. Exact duplicate: same normalized name and store, same purchase day,
//!    unit price within one cent.
//! 2. Best fuzzy match over the distinct catalog names (an exact name match
//!    is taken first when one exists):
//!    - none at or above `fuzzy_threshold`: new item;
//!    - at or above [`HIGH_CONFIDENCE_THRESHOLD`]: price history, unless one
//!      of the matched name's rows has the same day and unit price, which is
//!      an ambiguous duplicate (or an auto-merge when the caller opted in);
//!    - otherwise a distinct item that merely has a similar name.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::CatalogItem;
use crate::similarity::best_match;

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.95;
/// Unit prices closer than this are the same price.
pub const PRICE_TOLERANCE: f64 = 0.01;

// Absorbs binary representation error so that e.g. 2.00 vs 2.01 is a
// one-cent difference rather than 0.00999...
const PRICE_EPSILON: f64 = 1e-9;

/// The comparison-relevant part of an incoming observation.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub normalized_name: &'a str,
    pub normalized_store: &'a str,
    pub unit_price: f64,
    pub purchase_day: NaiveDate,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassifierPolicy {
    pub fuzzy_threshold: f64,
    pub auto_merge: bool,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            auto_merge: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// No similar name in the catalog.
    NewItem,
    /// Same item observed on another day or at another price.
    PriceHistory {
        reference: CatalogItem,
        similarity: f64,
    },
    /// Similar but distinct product name.
    SimilarName {
        reference: CatalogItem,
        similarity: f64,
    },
    /// Indistinguishable from `existing`, stored anyway because the caller
    /// asked to auto-merge.
    AutoMerged {
        existing: CatalogItem,
        similarity: f64,
    },
    ExactDuplicate {
        existing: CatalogItem,
    },
    AmbiguousDuplicate {
        existing: CatalogItem,
        similarity: f64,
    },
}

impl Classification {
    /// Whether ingestion goes on to persist the candidate.
    pub fn proceeds(&self) -> bool {
        !matches!(
            self,
            Classification::ExactDuplicate { .. } | Classification::AmbiguousDuplicate { .. }
        )
    }
}

pub fn same_unit_price(a: f64, b: f64) -> bool {
    (a - b).abs() < PRICE_TOLERANCE - PRICE_EPSILON
}

fn indistinguishable(item: &CatalogItem, candidate: &Candidate<'_>) -> bool {
    item.purchase_day() == candidate.purchase_day
        && same_unit_price(item.unit_price, candidate.unit_price)
}

/// Classify `candidate` against the catalog snapshot `existing`.
pub fn classify(
    candidate: &Candidate<'_>,
    existing: &[CatalogItem],
    policy: &ClassifierPolicy,
) -> Classification {
    if let Some(dup) = existing.iter().find(|item| {
        item.normalized_name == candidate.normalized_name
            && item.normalized_store == candidate.normalized_store
            && indistinguishable(item, candidate)
    }) {
        return Classification::ExactDuplicate {
            existing: dup.clone(),
        };
    }

    let groups = group_by_name(existing);
    let matched = groups
        .iter()
        .find(|(name, _)| *name == candidate.normalized_name)
        .map(|(_, rows)| (rows, 1.0))
        .or_else(|| {
            best_match(
                candidate.normalized_name,
                groups.iter().map(|(name, rows)| (*name, rows)),
                policy.fuzzy_threshold,
            )
            .map(|m| (m.value, m.similarity))
        });

    let Some((rows, similarity)) = matched else {
        return Classification::NewItem;
    };

    if similarity >= HIGH_CONFIDENCE_THRESHOLD {
        if let Some(twin) = rows.iter().find(|item| indistinguishable(item, candidate)) {
            let existing = (*twin).clone();
            return if policy.auto_merge {
                Classification::AutoMerged {
                    existing,
                    similarity,
                }
            } else {
                Classification::AmbiguousDuplicate {
                    existing,
                    similarity,
                }
            };
        }
        return Classification::PriceHistory {
            reference: latest(rows).clone(),
            similarity,
        };
    }

    if similarity >= policy.fuzzy_threshold {
        return Classification::SimilarName {
            reference: latest(rows).clone(),
            similarity,
        };
    }

    Classification::NewItem
}

/// Distinct normalized names in first-seen order, each with its rows.
fn group_by_name(items: &[CatalogItem]) -> Vec<(&str, Vec<&CatalogItem>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&CatalogItem>)> = Vec::new();
    for item in items {
        let name = item.normalized_name.as_str();
        match index.get(name) {
            Some(&i) => groups[i].1.push(item),
            None => {
                index.insert(name, groups.len());
                groups.push((name, vec![item]));
            }
        }
    }
    groups
}

/// Most recent purchase in a non-empty group; the earliest-listed row wins ties.
fn latest<'a>(rows: &[&'a CatalogItem]) -> &'a CatalogItem {
    let mut best = rows[0];
    for &row in &rows[1..] {
        if row.purchased_at > best.purchased_at {
            best = row;
        }
    }
    best
}
