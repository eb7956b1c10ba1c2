//! Canonicalization of free-text and numeric fields.
//!
//! Normalized forms are for comparison only. Callers keep the original text
//! for display.

use crate::models::NumericInput;

/// The fixed category set. Unknown categories pass through as given.
pub const CATEGORIES: [&str; 8] = [
    "Meat",
    "Seafood",
    "Dairy",
    "Produce",
    "Snacks",
    "Drinks",
    "Household",
    "Other",
];

pub const DEFAULT_CATEGORY: &str = "Other";
pub const DEFAULT_UNIT: &str = "each";

const UNIT_SYNONYMS: [(&str, &str); 34] = [
    ("lbs", "lb"),
    ("pounds", "lb"),
    ("pound", "lb"),
    ("ounces", "oz"),
    ("ounce", "oz"),
    ("grams", "g"),
    ("gram", "g"),
    ("kilograms", "kg"),
    ("kilogram", "kg"),
    ("liters", "l"),
    ("liter", "l"),
    ("milliliters", "ml"),
    ("milliliter", "ml"),
    ("gallons", "gal"),
    ("gallon", "gal"),
    ("quarts", "qt"),
    ("quart", "qt"),
    ("pints", "pt"),
    ("pint", "pt"),
    ("cups", "cup"),
    ("fluid ounces", "fl oz"),
    ("fluid ounce", "fl oz"),
    ("fl. oz", "fl oz"),
    ("floz", "fl oz"),
    ("tablespoons", "tbsp"),
    ("tablespoon", "tbsp"),
    ("tbs", "tbsp"),
    ("teaspoons", "tsp"),
    ("teaspoon", "tsp"),
    ("ltr", "l"),
    ("pieces", "each"),
    ("piece", "each"),
    ("units", "each"),
    ("unit", "each"),
];

const CATEGORY_SYNONYMS: [(&str, &str); 17] = [
    ("meat", "Meat"),
    ("meats", "Meat"),
    ("beef", "Meat"),
    ("pork", "Meat"),
    ("chicken", "Meat"),
    ("poultry", "Meat"),
    ("seafood", "Seafood"),
    ("fish", "Seafood"),
    ("dairy", "Dairy"),
    ("produce", "Produce"),
    ("fruits", "Produce"),
    ("vegetables", "Produce"),
    ("snacks", "Snacks"),
    ("drinks", "Drinks"),
    ("beverages", "Drinks"),
    ("household", "Household"),
    ("other", "Other"),
];

/// Trim and collapse internal whitespace runs to a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key for an item name.
///
/// Lowercases, drops everything except letters, digits, spaces, hyphens and
/// apostrophes, then collapses whitespace.
pub fn normalize_name(name: &str) -> String {
    let kept: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '\'')
        .collect();
    normalize_whitespace(&kept)
}

/// Comparison key for a store name.
pub fn normalize_store_name(store: &str) -> String {
    normalize_whitespace(&store.to_lowercase())
}

/// Fold common unit spellings (`lbs`, `ounces`, `pieces`, ...) to one form.
pub fn normalize_unit_type(unit: &str) -> String {
    let lowered = unit.trim().to_lowercase();
    UNIT_SYNONYMS
        .iter()
        .find(|(from, _)| *from == lowered)
        .map(|(_, to)| to.to_string())
        .unwrap_or(lowered)
}

/// Fold category spellings onto [`CATEGORIES`]; unknown values are kept.
pub fn normalize_category(category: &str) -> String {
    let trimmed = category.trim();
    let lowered = trimmed.to_lowercase();
    CATEGORY_SYNONYMS
        .iter()
        .find(|(from, _)| *from == lowered)
        .map(|(_, to)| to.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Parse a price or quantity. Returns `None` unless the result is finite.
///
/// Text input has currency symbols, thousands separators and spaces
/// stripped; a minus sign ahead of the first digit keeps the value negative
/// so that `"-1"` is rejected downstream rather than read as `1`.
pub fn normalize_numeric_input(input: &NumericInput) -> Option<f64> {
    let value = match input {
        NumericInput::Number(n) => *n,
        NumericInput::Text(s) => {
            let negative = s
                .chars()
                .take_while(|c| !c.is_ascii_digit())
                .any(|c| c == '-');
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            let parsed: f64 = cleaned.parse().ok()?;
            if negative {
                -parsed
            } else {
                parsed
            }
        }
    };
    value.is_finite().then_some(value)
}

pub fn format_price(price: f64) -> String {
    format!("${:.2}", price)
}

/// e.g. `$3.99/lb`
pub fn format_unit_price(price: f64, unit: &str) -> String {
    format!("{}/{}", format_price(price), unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Chicken   Breast "), "chicken breast");
        assert_eq!(normalize_name("Ben & Jerry's Ice-Cream!"), "ben jerry's ice-cream");
        assert_eq!(normalize_name("MILK\t2%"), "milk 2");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_normalize_store_name() {
        assert_eq!(normalize_store_name("  Trader   JOE'S "), "trader joe's");
    }

    #[test]
    fn test_normalize_unit_type() {
        assert_eq!(normalize_unit_type("LBS"), "lb");
        assert_eq!(normalize_unit_type(" Ounces "), "oz");
        assert_eq!(normalize_unit_type("pieces"), "each");
        assert_eq!(normalize_unit_type("dozen"), "dozen");
        assert_eq!(normalize_unit_type("Gallons"), "gal");
        assert_eq!(normalize_unit_type("Fluid Ounces"), "fl oz");
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category("poultry"), "Meat");
        assert_eq!(normalize_category(" Beverages "), "Drinks");
        assert_eq!(normalize_category("Bakery"), "Bakery");
    }

    #[test]
    fn test_normalize_numeric_input() {
        assert_eq!(normalize_numeric_input(&"$4.99".into()), Some(4.99));
        assert_eq!(normalize_numeric_input(&"1,299.00".into()), Some(1299.0));
        assert_eq!(normalize_numeric_input(&" 3 ".into()), Some(3.0));
        assert_eq!(normalize_numeric_input(&"-1".into()), Some(-1.0));
        assert_eq!(normalize_numeric_input(&"-$2.50".into()), Some(-2.5));
        assert_eq!(normalize_numeric_input(&"abc".into()), None);
        assert_eq!(normalize_numeric_input(&"1.2.3".into()), None);
        assert_eq!(normalize_numeric_input(&NumericInput::Number(f64::NAN)), None);
        assert_eq!(normalize_numeric_input(&NumericInput::Number(f64::INFINITY)), None);
        assert_eq!(normalize_numeric_input(&2.5.into()), Some(2.5));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(4.5), "$4.50");
        assert_eq!(format_unit_price(3.99, "lb"), "$3.99/lb");
    }
}
