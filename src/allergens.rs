//! Allergen detection from menu text.
//!
//! A keyword in the main text means the item contains the allergen. A keyword
//! that only shows up inside a "may contain ..." clause is a cross-contact
//! warning. Contains always outranks may-contain for the same allergen.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::{AllergenSeverity, AllergenType};

#[allow(clippy::expect_used)]
static MAY_CONTAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bmay\s+contain\b[^.;]*").expect("may-contain regex is valid")
});

/// Spreads named "butter" that carry no dairy.
#[allow(clippy::expect_used)]
static NON_DAIRY_BUTTER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(peanut|almond|cashew|cocoa|apple|sun\s?flower)\s+butter\b")
        .expect("non-dairy butter regex is valid")
});

#[allow(clippy::expect_used)]
static ALLERGEN_PATTERNS: LazyLock<Vec<(AllergenType, Regex)>> = LazyLock::new(|| {
    [
        (
            AllergenType::Milk,
            r"milk|cheese|cheeses|cheesy|butter|buttermilk|cream|creamy|yogurt|whey|queso|mozzarella|parmesan|cheddar|ricotta|ice cream|gelato|custard|alfredo",
        ),
        (
            AllergenType::Egg,
            r"eggs?|mayo|mayonnaise|aioli|meringue|custard|hollandaise",
        ),
        (
            AllergenType::Wheat,
            r"wheat|flour|breads?|breaded|buns?|rolls?|pasta|noodles?|macaroni|tortillas?|pretzels?|batter|battered|croissants?|waffles?|pancakes?|biscuits?|cakes?|cookies?|brownies?|churros?|pizzas?|crusts?|sandwich(?:es)?|wraps?|pitas?|bagels?|donuts?|doughnuts?|croutons?",
        ),
        (AllergenType::Soy, r"soy|soya|tofu|edamame|miso|tempeh|teriyaki"),
        (AllergenType::Peanut, r"peanuts?"),
        (
            AllergenType::TreeNut,
            r"almonds?|cashews?|pecans?|walnuts?|pistachios?|hazelnuts?|macadamias?|nutella|coconut|praline|tree nuts?",
        ),
        (
            AllergenType::Fish,
            r"fish|salmon|tuna|cod|tilapia|anchov(?:y|ies)|mahi(?:\s?mahi)?|halibut",
        ),
        (
            AllergenType::Shellfish,
            r"shellfish|shrimp|crab|lobster|clams?|oysters?|mussels?|scallops?|crawfish|prawns?",
        ),
        (AllergenType::Sesame, r"sesame|tahini|hummus"),
    ]
    .into_iter()
    .map(|(kind, words)| {
        let pattern = format!(r"(?i)\b(?:{words})\b");
        (
            kind,
            Regex::new(&pattern).expect("allergen keyword regex is valid"),
        )
    })
    .collect()
});

fn allergens_in(text: &str) -> Vec<AllergenType> {
    let text = NON_DAIRY_BUTTER_PATTERN.replace_all(text, "$1 spread");
    ALLERGEN_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(&text))
        .map(|(kind, _)| *kind)
        .collect()
}

/// Detects allergens in a menu item's name and description.
///
/// Returns one entry per allergen, sorted by allergen type.
#[must_use]
pub fn detect_allergens(
    name: &str,
    description: Option<&str>,
) -> Vec<(AllergenType, AllergenSeverity)> {
    let text = match description {
        Some(description) => format!("{name}. {description}"),
        None => name.to_string(),
    };

    let mut found: BTreeMap<AllergenType, AllergenSeverity> = BTreeMap::new();

    for clause in MAY_CONTAIN_PATTERN.find_iter(&text) {
        for kind in allergens_in(clause.as_str()) {
            found.entry(kind).or_insert(AllergenSeverity::MayContain);
        }
    }

    let main_text = MAY_CONTAIN_PATTERN.replace_all(&text, " ");
    for kind in allergens_in(&main_text) {
        found.insert(kind, AllergenSeverity::Contains);
    }

    found.into_iter().collect()
}
