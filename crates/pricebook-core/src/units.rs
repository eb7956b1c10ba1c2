//! Unit-aware price comparison.
//!
//! Unit prices are only comparable when they are per the same thing. Weight
//! units convert to a per-pound price and volume units to a per-gallon
//! price; any other unit (`each`, `dozen`, `pack`, ...) is only compared
//! against observations recorded in that same unit.
//!
//! Units are expected in normalized form (see
//! [`normalize_unit_type`](crate::normalize::normalize_unit_type)). Plain
//! `oz` is a weight; fluid ounces are `fl oz`.

use crate::models::CatalogItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Weight,
    Volume,
}

impl Dimension {
    /// The unit every price in this dimension is converted to.
    pub fn base_unit(self) -> &'static str {
        match self {
            Dimension::Weight => "lb",
            Dimension::Volume => "gal",
        }
    }
}

/// How many of each unit make up one base unit.
const PER_BASE_UNIT: [(&str, Dimension, f64); 13] = [
    ("lb", Dimension::Weight, 1.0),
    ("oz", Dimension::Weight, 16.0),
    ("g", Dimension::Weight, 453.592_37),
    ("kg", Dimension::Weight, 0.453_592_37),
    ("gal", Dimension::Volume, 1.0),
    ("qt", Dimension::Volume, 4.0),
    ("pt", Dimension::Volume, 8.0),
    ("cup", Dimension::Volume, 16.0),
    ("fl oz", Dimension::Volume, 128.0),
    ("tbsp", Dimension::Volume, 256.0),
    ("tsp", Dimension::Volume, 768.0),
    ("l", Dimension::Volume, 3.785_41),
    ("ml", Dimension::Volume, 3_785.41),
];

fn lookup(unit: &str) -> Option<(Dimension, f64)> {
    PER_BASE_UNIT
        .iter()
        .find(|(name, _, _)| *name == unit)
        .map(|&(_, dim, factor)| (dim, factor))
}

/// What a unit price is "per" once converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceBasis {
    Dimension(Dimension),
    /// Not convertible; compared only against the same unit.
    Unit(String),
}

impl PriceBasis {
    pub fn unit(&self) -> &str {
        match self {
            PriceBasis::Dimension(dim) => dim.base_unit(),
            PriceBasis::Unit(unit) => unit,
        }
    }
}

pub fn dimension_of(unit: &str) -> Option<Dimension> {
    lookup(unit).map(|(dim, _)| dim)
}

/// Convert a price per `unit` to a price per the basis unit.
///
/// `$0.20/oz` becomes `$3.20/lb`; `$1.29/each` stays as it is.
pub fn comparable_unit_price(unit_price: f64, unit: &str) -> (PriceBasis, f64) {
    match lookup(unit) {
        Some((dim, factor)) => (PriceBasis::Dimension(dim), unit_price * factor),
        None => (PriceBasis::Unit(unit.to_string()), unit_price),
    }
}

/// The cheapest observation within one price basis.
#[derive(Debug, Clone, PartialEq)]
pub struct BestPrice {
    pub item: CatalogItem,
    pub basis: PriceBasis,
    /// Unit price converted to `basis.unit()`.
    pub price: f64,
}

impl BestPrice {
    /// Whether `price` differs from the unit the item was recorded in.
    pub fn is_converted(&self) -> bool {
        self.basis.unit() != self.item.unit_type
    }
}

/// Cheapest observation per price basis.
///
/// `items` is expected newest first. Groups come out in the order their
/// basis was first seen, so the basis of the most recent purchase leads;
/// within a group the newest row wins ties.
pub fn best_prices(items: &[CatalogItem]) -> Vec<BestPrice> {
    let mut best: Vec<BestPrice> = Vec::new();
    for item in items {
        let (basis, price) = comparable_unit_price(item.unit_price, &item.unit_type);
        match best.iter_mut().find(|b| b.basis == basis) {
            Some(current) => {
                if price < current.price {
                    current.item = item.clone();
                    current.price = price;
                }
            }
            None => best.push(BestPrice {
                item: item.clone(),
                basis,
                price,
            }),
        }
    }
    best
}
