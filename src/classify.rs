//! Keyword heuristics that assign a category and dietary flags to new menu items.
//!
//! Scraped menus rarely label categories, so new items are classified from
//! their name and description. Patterns are checked in a fixed order and the
//! name always wins over the description.

use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::Category;

#[allow(clippy::expect_used)]
static BEVERAGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:drinks?|beverages?|sodas?|coffees?|lattes?|cappuccinos?|espressos?|cold brew|teas?|lemonades?|juices?|smoothies?|milkshakes?|shakes?|floats?|slush(?:ies|y)?|beers?|ales?|lagers?|ciders?|wines?|cocktails?|margaritas?|sangrias?|mojitos?|water|frapp[eé]s?|colas?|icees?|butterbeer)\b",
    )
    .expect("beverage regex is valid")
});

#[allow(clippy::expect_used)]
static DESSERT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:desserts?|cakes?|cupcakes?|cheesecakes?|cookies?|brownies?|sundaes?|ice cream|gelato|sorbet|pies?|churros?|donuts?|doughnuts?|dole whip|puddings?|tarts?|macarons?|fudge|cand(?:y|ies)|cobblers?|beignets?|cinnamon rolls?|mousse|parfaits?|[eé]clairs?|cream puffs?)\b",
    )
    .expect("dessert regex is valid")
});

#[allow(clippy::expect_used)]
static SIDE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:sides?|fries|tots|tater tots|onion rings|cole ?slaw|slaw|mashed potatoes|fruit cups?|applesauce|baked beans|corn on the cob|hush ?puppies)\b",
    )
    .expect("side regex is valid")
});

#[allow(clippy::expect_used)]
static SNACK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:snacks?|pretzels?|popcorn|kettle corn|nachos|chips|peanuts|jerky|pickles?|trail mix|granola)\b",
    )
    .expect("snack regex is valid")
});

#[allow(clippy::expect_used)]
static FRIED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:fried|crispy|tempura|battered|fritters?|churros?|funnel cakes?|tots|fries|corn dogs?)\b",
    )
    .expect("fried regex is valid")
});

#[allow(clippy::expect_used)]
static VEGETARIAN_MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:vegetarian|vegan|plant[\s-]?based|meatless)\b")
        .expect("vegetarian marker regex is valid")
});

#[allow(clippy::expect_used)]
static MEAT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:beef|burgers?|hamburgers?|cheeseburgers?|chicken|pork|bacon|ham|sausages?|turkey|brisket|steaks?|ribs?|lamb|pepperoni|salami|prosciutto|hot dogs?|corn dogs?|meatballs?|chorizo|carnitas|duck|fish|salmon|tuna|cod|shrimp|crab|lobster|clams?|oysters?|mussels?|calamari)\b",
    )
    .expect("meat regex is valid")
});

/// Category and dietary flags inferred for a menu item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub is_fried: bool,
    pub is_vegetarian: bool,
}

/// Classifies a menu item from its name and optional description.
#[must_use]
pub fn classify(name: &str, description: Option<&str>) -> Classification {
    let category = classify_category(name, description);
    Classification {
        category,
        is_fried: is_fried(name, description),
        is_vegetarian: is_vegetarian(name, description, category),
    }
}

fn category_of(text: &str) -> Option<Category> {
    [
        (&*BEVERAGE_PATTERN, Category::Beverage),
        (&*DESSERT_PATTERN, Category::Dessert),
        (&*SIDE_PATTERN, Category::Side),
        (&*SNACK_PATTERN, Category::Snack),
    ]
    .into_iter()
    .find(|(pattern, _)| pattern.is_match(text))
    .map(|(_, category)| category)
}

/// Returns the item's category.
///
/// Patterns are tried beverage, dessert, side, snack against the name, then
/// against the description. No match means entree.
#[must_use]
pub fn classify_category(name: &str, description: Option<&str>) -> Category {
    category_of(name)
        .or_else(|| description.and_then(category_of))
        .unwrap_or(Category::Entree)
}

/// Returns `true` when the name or description mentions a fried preparation.
#[must_use]
pub fn is_fried(name: &str, description: Option<&str>) -> bool {
    FRIED_PATTERN.is_match(name) || description.is_some_and(|text| FRIED_PATTERN.is_match(text))
}

/// Decides whether an item is vegetarian.
///
/// An explicit marker wins, then any meat or seafood keyword rules it out.
/// Entrees without either are assumed to contain meat.
#[must_use]
pub fn is_vegetarian(name: &str, description: Option<&str>, category: Category) -> bool {
    let text = match description {
        Some(description) => format!("{name} {description}"),
        None => name.to_string(),
    };
    if VEGETARIAN_MARKER_PATTERN.is_match(&text) {
        return true;
    }
    if MEAT_PATTERN.is_match(&text) {
        return false;
    }
    category != Category::Entree
}
