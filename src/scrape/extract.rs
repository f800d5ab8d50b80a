//! HTML to [`ScrapedItem`] extraction driven by a profile's CSS selectors.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{ScrapeError, ScrapedItem, SelectorSet, SiteProfile};
use crate::catalog::NutritionFacts;

#[allow(clippy::expect_used)]
static PRICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s*(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d{1,2}))?").expect("price regex is valid")
});

#[allow(clippy::expect_used)]
static INTEGER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}(?:,\d{3})+|\d+").expect("integer regex is valid")
});

/// Parses the first `$12.49`-style amount in the text.
///
/// ```
/// use parkmenu_core::scrape::parse_price;
///
/// assert_eq!(parse_price("Combo meal $12.49 (plus tax)"), Some(12.49));
/// assert_eq!(parse_price("$7"), Some(7.0));
/// assert_eq!(parse_price("Market price"), None);
/// ```
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    let captures = PRICE_PATTERN.captures(text)?;
    let dollars = captures.get(1)?.as_str().replace(',', "");
    let amount = match captures.get(2) {
        Some(cents) => format!("{dollars}.{}", cents.as_str()),
        None => dollars,
    };
    amount.parse().ok()
}

/// Parses the first integer in the text as a calorie count.
///
/// ```
/// use parkmenu_core::scrape::parse_calories;
///
/// assert_eq!(parse_calories("1,120 cal"), Some(1120.0));
/// assert_eq!(parse_calories("Calories: 540"), Some(540.0));
/// assert_eq!(parse_calories("n/a"), None);
/// ```
#[must_use]
pub fn parse_calories(text: &str) -> Option<f64> {
    INTEGER_PATTERN
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
}

pub(crate) struct CompiledSelectors {
    restaurant: Selector,
    restaurant_name: Selector,
    land: Option<Selector>,
    item: Selector,
    item_name: Selector,
    description: Option<Selector>,
    price: Option<Selector>,
    photo: Option<Selector>,
    calories: Option<Selector>,
}

fn compile(field: &'static str, selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector {
        field,
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn compile_optional(
    field: &'static str,
    selector: Option<&String>,
) -> Result<Option<Selector>, ScrapeError> {
    selector.map(|s| compile(field, s)).transpose()
}

impl CompiledSelectors {
    pub(crate) fn compile(set: &SelectorSet) -> Result<Self, ScrapeError> {
        Ok(Self {
            restaurant: compile("restaurant", &set.restaurant)?,
            restaurant_name: compile("restaurant_name", &set.restaurant_name)?,
            land: compile_optional("land", set.land.as_ref())?,
            item: compile("item", &set.item)?,
            item_name: compile("item_name", &set.item_name)?,
            description: compile_optional("description", set.description.as_ref())?,
            price: compile_optional("price", set.price.as_ref())?,
            photo: compile_optional("photo", set.photo.as_ref())?,
            calories: compile_optional("calories", set.calories.as_ref())?,
        })
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(scope: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    let element = scope.select(selector?).next()?;
    let text = element_text(element);
    (!text.is_empty()).then_some(text)
}

fn resolve_photo(scope: ElementRef<'_>, selector: Option<&Selector>, base: Option<&Url>) -> Option<String> {
    let element = scope.select(selector?).next()?;
    let src = element
        .value()
        .attr("src")
        .or_else(|| element.value().attr("data-src"))?
        .trim();
    if src.is_empty() {
        return None;
    }
    match base {
        Some(base) => base.join(src).ok().map(String::from),
        None => Url::parse(src).ok().map(String::from),
    }
}

/// Extracts menu items from one page.
///
/// Restaurant blocks and items are walked in document order. Items with an
/// empty name and blocks with an empty restaurant name are skipped.
///
/// # Errors
///
/// Returns [`ScrapeError::Selector`] if a profile selector does not parse.
pub fn extract_items(
    html: &str,
    profile: &SiteProfile,
    page_url: &str,
) -> Result<Vec<ScrapedItem>, ScrapeError> {
    let selectors = CompiledSelectors::compile(&profile.selectors)?;
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let mut items = Vec::new();
    for block in document.select(&selectors.restaurant) {
        let Some(restaurant) = first_text(block, Some(&selectors.restaurant_name)) else {
            debug!(url = page_url, "restaurant block without a name, skipping");
            continue;
        };
        let land = first_text(block, selectors.land.as_ref());

        for entry in block.select(&selectors.item) {
            let Some(name) = first_text(entry, Some(&selectors.item_name)) else {
                continue;
            };

            let nutrition = first_text(entry, selectors.calories.as_ref())
                .and_then(|text| parse_calories(&text))
                .map(|calories| NutritionFacts {
                    calories: Some(calories),
                    ..NutritionFacts::default()
                });

            items.push(ScrapedItem {
                source_kind: profile.source_kind,
                source_name: profile.name.clone(),
                page_url: page_url.to_string(),
                park: profile.park.clone(),
                restaurant: restaurant.clone(),
                land: land.clone(),
                name,
                description: first_text(entry, selectors.description.as_ref()),
                price: first_text(entry, selectors.price.as_ref())
                    .and_then(|text| parse_price(&text)),
                photo_url: resolve_photo(entry, selectors.photo.as_ref(), base.as_ref()),
                nutrition,
            });
        }
    }

    Ok(items)
}
