//! Name normalization used as the matching key across all data sources.
//!
//! Menu sites spell the same dish differently ("Mickey's Pretzel & Cheese",
//! "Mickey Pretzel and Cheese™"). Every comparison in the pipeline goes
//! through [`normalize_name`] first so those variants collapse to one key.

/// Normalizes a display name into a matching key.
///
/// Steps:
/// 1. Lowercase
/// 2. `&` becomes ` and `
/// 3. Trademark symbols and apostrophes are dropped without a gap
/// 4. Any other non-alphanumeric character becomes a space
/// 5. Whitespace runs collapse to one space, ends trimmed
///
/// The result is idempotent and empty for punctuation-only input.
///
/// # Examples
///
/// ```
/// use parkmenu_core::normalize::normalize_name;
///
/// assert_eq!(normalize_name("Mickey's Pretzel & Cheese™"), "mickeys pretzel and cheese");
/// assert_eq!(normalize_name("  Dole-Whip  (Float) "), "dole whip float");
/// assert_eq!(normalize_name("!!!"), "");
/// ```
#[must_use]
pub fn normalize_name(input: &str) -> String {
    let mut spaced = String::with_capacity(input.len());
    for ch in input.to_lowercase().chars() {
        match ch {
            '&' => spaced.push_str(" and "),
            '\'' | '\u{2018}' | '\u{2019}' | '\u{2122}' | '\u{00ae}' | '\u{00a9}' => {}
            c if c.is_alphanumeric() => spaced.push(c),
            _ => spaced.push(' '),
        }
    }

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the normalized whitespace tokens of a name.
#[must_use]
pub fn tokens(input: &str) -> Vec<String> {
    normalize_name(input)
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_lowercases_and_collapses_whitespace() {
        assert_eq!(normalize_name("  Turkey   LEG "), "turkey leg");
    }

    #[test]
    fn test_normalize_name_maps_ampersand() {
        assert_eq!(normalize_name("Fish&Chips"), "fish and chips");
        assert_eq!(normalize_name("Fish & Chips"), "fish and chips");
    }

    #[test]
    fn test_normalize_name_drops_apostrophes_without_gap() {
        assert_eq!(normalize_name("Casey's Corner"), "caseys corner");
        assert_eq!(normalize_name("Casey\u{2019}s Corner"), "caseys corner");
    }

    #[test]
    fn test_normalize_name_drops_trademark_symbols() {
        assert_eq!(normalize_name("Dole Whip\u{00ae}"), "dole whip");
        assert_eq!(normalize_name("Butterbeer\u{2122}"), "butterbeer");
    }

    #[test]
    fn test_normalize_name_punctuation_becomes_space() {
        assert_eq!(normalize_name("Mac-n-Cheese/Bacon"), "mac n cheese bacon");
    }

    #[test]
    fn test_normalize_name_empty_for_punctuation_only() {
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name(" -- ! "), "");
    }

    #[test]
    fn test_normalize_name_is_idempotent() {
        for raw in [
            "Mickey's Pretzel & Cheese\u{2122}",
            "Ronto Wrap (Plant-Based)",
            "\u{0130}stanbul Kebab",
            "Caf\u{00e9} Br\u{00fb}l\u{00e9}e",
        ] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once, "not idempotent for {raw}");
        }
    }

    #[test]
    fn test_normalize_name_keeps_unicode_letters() {
        assert_eq!(normalize_name("Cr\u{00e8}me Br\u{00fb}l\u{00e9}e"), "cr\u{00e8}me br\u{00fb}l\u{00e9}e");
    }

    #[test]
    fn test_tokens_splits_normalized_name() {
        assert_eq!(tokens("Pork Belly Bao-Bun"), vec!["pork", "belly", "bao", "bun"]);
        assert!(tokens("***").is_empty());
    }
}
