//! Business-rule validation layered on top of [`normalize`](crate::normalize).
//!
//! Runs before any catalog lookup. The first failing rule wins and its
//! message is what the user sees.

use thiserror::Error;

use crate::models::IngestionInput;
use crate::normalize::{
    normalize_category, normalize_name, normalize_numeric_input, normalize_store_name,
    normalize_unit_type,
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_STORE_LEN: usize = 50;
pub const MAX_UNIT_LEN: usize = 20;

const KNOWN_UNITS: [&str; 21] = [
    "lb", "oz", "g", "kg", "l", "ml", "gal", "qt", "pt", "cup", "fl oz", "tbsp", "tsp", "each",
    "dozen", "pack", "bag", "box", "can", "bottle", "jar",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must be a valid number")]
    NotANumber(&'static str),
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
    #[error("Price can have at most 2 decimal places")]
    TooManyDecimals,
    #[error("Item name is required")]
    NameRequired,
    #[error("Item name must be 100 characters or less")]
    NameTooLong,
    #[error("Item name must contain at least one letter")]
    NameWithoutLetter,
    #[error("Store name is required")]
    StoreRequired,
    #[error("Store name must be 50 characters or less")]
    StoreTooLong,
    #[error("Unit type is required")]
    UnitRequired,
    #[error("Unit type must be 20 characters or less")]
    UnitTooLong,
    #[error("Category is required")]
    CategoryRequired,
    /// The record could not be decoded at all (missing field, wrong type,
    /// unparsable date).
    #[error("Malformed record: {0}")]
    Malformed(String),
}

/// Result of [`validate_for_ingestion`](crate::ingest::validate_for_ingestion).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(ValidationError),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    pub fn error(&self) -> Option<String> {
        match self {
            ValidationOutcome::Valid => None,
            ValidationOutcome::Invalid(e) => Some(e.to_string()),
        }
    }
}

impl<T> From<Result<T, ValidationError>> for ValidationOutcome {
    fn from(r: Result<T, ValidationError>) -> Self {
        match r {
            Ok(_) => ValidationOutcome::Valid,
            Err(e) => ValidationOutcome::Invalid(e),
        }
    }
}

/// Candidate after normalization, ready for validation and matching.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedInput {
    pub normalized_name: String,
    pub normalized_store: String,
    pub price: f64,
    pub quantity: f64,
    pub unit_type: Option<String>,
    pub category: Option<String>,
    pub target_price: Option<f64>,
}

impl NormalizedInput {
    pub fn unit_price(&self) -> f64 {
        self.price / self.quantity
    }
}

/// Normalize every field of `input`, then [`validate`] the result.
pub fn normalize_and_validate(input: &IngestionInput) -> Result<NormalizedInput, ValidationError> {
    let price = normalize_numeric_input(&input.price).ok_or(ValidationError::NotANumber("Price"))?;
    let quantity =
        normalize_numeric_input(&input.quantity).ok_or(ValidationError::NotANumber("Quantity"))?;
    let target_price = match &input.target_price {
        Some(raw) => Some(
            normalize_numeric_input(raw).ok_or(ValidationError::NotANumber("Target price"))?,
        ),
        None => None,
    };

    let normalized = NormalizedInput {
        normalized_name: normalize_name(&input.item_name),
        normalized_store: normalize_store_name(&input.store_name),
        price,
        quantity,
        unit_type: input.unit_type.as_deref().map(normalize_unit_type),
        category: input.category.as_deref().map(normalize_category),
        target_price,
    };

    validate(&normalized)?;
    Ok(normalized)
}

/// Enforce the field rules on an already-normalized candidate.
pub fn validate(candidate: &NormalizedInput) -> Result<(), ValidationError> {
    validate_item_name(&candidate.normalized_name)?;
    validate_price(candidate.price)?;
    validate_quantity(candidate.quantity)?;
    validate_store_name(&candidate.normalized_store)?;
    if let Some(unit) = &candidate.unit_type {
        validate_unit_type(unit)?;
    }
    if let Some(category) = &candidate.category {
        if category.trim().is_empty() {
            return Err(ValidationError::CategoryRequired);
        }
    }
    if let Some(target) = candidate.target_price {
        positive("Target price", target)?;
    }
    Ok(())
}

pub fn validate_item_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::NameRequired);
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong);
    }
    if !trimmed.chars().any(char::is_alphabetic) {
        return Err(ValidationError::NameWithoutLetter);
    }
    Ok(())
}

pub fn validate_price(price: f64) -> Result<(), ValidationError> {
    positive("Price", price)?;
    // f64 Display prints the shortest representation that round-trips.
    let decimals = price
        .to_string()
        .split_once('.')
        .map(|(_, frac)| frac.len())
        .unwrap_or(0);
    if decimals > 2 {
        return Err(ValidationError::TooManyDecimals);
    }
    Ok(())
}

pub fn validate_quantity(quantity: f64) -> Result<(), ValidationError> {
    positive("Quantity", quantity)
}

pub fn validate_store_name(store: &str) -> Result<(), ValidationError> {
    let trimmed = store.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::StoreRequired);
    }
    if trimmed.chars().count() > MAX_STORE_LEN {
        return Err(ValidationError::StoreTooLong);
    }
    Ok(())
}

pub fn validate_unit_type(unit: &str) -> Result<(), ValidationError> {
    let trimmed = unit.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::UnitRequired);
    }
    let known = KNOWN_UNITS.contains(&trimmed.to_lowercase().as_str());
    if !known && trimmed.chars().count() > MAX_UNIT_LEN {
        return Err(ValidationError::UnitTooLong);
    }
    Ok(())
}

fn positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotANumber(field));
    }
    if value <= 0.0 {
        return Err(ValidationError::NotPositive(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, price: f64, quantity: f64, store: &str) -> IngestionInput {
        IngestionInput::new(name, price, quantity, store)
    }

    #[test]
    fn test_valid_input_normalizes() {
        let n = normalize_and_validate(
            &input("  Whole   MILK ", 4.99, 1.0, " Acme ")
                .unit_type("Gallons")
                .category("dairy"),
        )
        .unwrap();
        assert_eq!(n.normalized_name, "whole milk");
        assert_eq!(n.normalized_store, "acme");
        assert_eq!(n.unit_type.as_deref(), Some("gal"));
        assert_eq!(n.category.as_deref(), Some("Dairy"));
        assert!((n.unit_price() - 4.99).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_non_positive_price_and_quantity() {
        assert_eq!(
            normalize_and_validate(&input("Milk", 0.0, 1.0, "Acme")),
            Err(ValidationError::NotPositive("Price"))
        );
        assert_eq!(
            normalize_and_validate(&input("Milk", -1.0, 1.0, "Acme")),
            Err(ValidationError::NotPositive("Price"))
        );
        assert_eq!(
            normalize_and_validate(&input("Milk", 4.99, 0.0, "Acme")),
            Err(ValidationError::NotPositive("Quantity"))
        );
    }

    #[test]
    fn test_rejects_empty_name_and_store() {
        assert_eq!(
            normalize_and_validate(&input("   ", 1.0, 1.0, "Acme")),
            Err(ValidationError::NameRequired)
        );
        assert_eq!(
            normalize_and_validate(&input("!!!", 1.0, 1.0, "Acme")),
            Err(ValidationError::NameRequired)
        );
        assert_eq!(
            normalize_and_validate(&input("Milk", 1.0, 1.0, "  ")),
            Err(ValidationError::StoreRequired)
        );
    }

    #[test]
    fn test_rejects_unparsable_numbers() {
        let bad = IngestionInput::new("Milk", "free", 1, "Acme");
        let err = normalize_and_validate(&bad).unwrap_err();
        assert_eq!(err.to_string(), "Price must be a valid number");
    }

    #[test]
    fn test_name_rules() {
        assert_eq!(validate_item_name("1234"), Err(ValidationError::NameWithoutLetter));
        assert_eq!(
            validate_item_name(&"a".repeat(MAX_NAME_LEN + 1)),
            Err(ValidationError::NameTooLong)
        );
        assert!(validate_item_name("7up").is_ok());
    }

    #[test]
    fn test_price_decimals() {
        assert!(validate_price(4.99).is_ok());
        assert!(validate_price(15000.0).is_ok());
        assert_eq!(validate_price(4.999), Err(ValidationError::TooManyDecimals));
    }

    #[test]
    fn test_unit_length() {
        assert!(validate_unit_type("bottle").is_ok());
        assert!(validate_unit_type("family size value pack").is_err());
        assert_eq!(validate_unit_type(" "), Err(ValidationError::UnitRequired));
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: ValidationOutcome = Ok::<(), ValidationError>(()).into();
        assert!(ok.is_valid());
        assert_eq!(ok.error(), None);
        let bad: ValidationOutcome = Err::<(), _>(ValidationError::StoreRequired).into();
        assert_eq!(bad.error().as_deref(), Some("Store name is required"));
    }
}
