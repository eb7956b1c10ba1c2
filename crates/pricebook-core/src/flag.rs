//! Suspicious-data predicate for newly created catalog rows.
//!
//! Flagging never blocks creation. A tripped predicate only produces the
//! reason that gets submitted to the moderation queue.

use serde::Deserialize;

use crate::models::{CatalogItem, ProvenanceMetadata};

pub const REASON_PRICE: &str = "Suspicious price detected";
pub const REASON_CONFIDENCE: &str = "Low recognition confidence";
pub const REASON_QUANTITY: &str = "Suspicious quantity";

/// Plausibility bounds. A price `<= min_price` or `> max_price`, a
/// confidence `< min_confidence`, or a quantity `> max_quantity` trips the
/// flag.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FlagPolicy {
    pub min_price: f64,
    pub max_price: f64,
    pub min_confidence: f64,
    pub max_quantity: f64,
}

impl Default for FlagPolicy {
    fn default() -> Self {
        Self {
            min_price: 0.01,
            max_price: 10_000.0,
            min_confidence: 0.5,
            max_quantity: 1000.0,
        }
    }
}

/// Reason string for `item`, or `None` when nothing looks off.
pub fn evaluate(
    item: &CatalogItem,
    provenance: Option<&ProvenanceMetadata>,
    policy: &FlagPolicy,
) -> Option<String> {
    flag_reason(
        item.price,
        item.quantity,
        provenance.and_then(|p| p.confidence),
        policy,
    )
}

/// Multiple triggers are joined with `"; "` in price, confidence, quantity
/// order.
pub fn flag_reason(
    price: f64,
    quantity: f64,
    confidence: Option<f64>,
    policy: &FlagPolicy,
) -> Option<String> {
    let mut reasons: Vec<&str> = Vec::new();

    if price <= policy.min_price || price > policy.max_price {
        reasons.push(REASON_PRICE);
    }
    if confidence.is_some_and(|c| c < policy.min_confidence) {
        reasons.push(REASON_CONFIDENCE);
    }
    if quantity > policy.max_quantity {
        reasons.push(REASON_QUANTITY);
    }

    if reasons.is_empty() {
        None
    } else {
        Some(reasons.join("; "))
    }
}
