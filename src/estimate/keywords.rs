//! Keyword extraction for neighbour lookup.

use std::collections::HashSet;
use std::sync::LazyLock;

use stop_words::{LANGUAGE, get};

use crate::normalize::tokens;

/// Shortest token kept as a keyword.
const MIN_KEYWORD_LEN: usize = 3;

static STOP_WORDS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    get(LANGUAGE::English)
        .into_iter()
        .map(|word| word.to_string())
        .collect()
});

/// Returns the distinctive tokens of an item's name and description.
///
/// Stop words, tokens shorter than three characters and numbers are dropped.
#[must_use]
pub fn keywords(name: &str, description: Option<&str>) -> HashSet<String> {
    let text = match description {
        Some(description) => format!("{name} {description}"),
        None => name.to_string(),
    };
    tokens(&text)
        .into_iter()
        .filter(|token| token.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .filter(|token| !STOP_WORDS.contains(token))
        .collect()
}
