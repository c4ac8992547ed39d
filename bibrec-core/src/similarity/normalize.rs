//! Text normalization shared by similarity scoring and field comparison
//!
//! - Unicode NFD decomposition with combining marks dropped (diacritic folding)
//! - Lowercase conversion
//! - Dots and apostrophes removed ("U.S.A." → "usa", "O'Neil" → "oneil")
//! - Other punctuation replaced by spaces, whitespace collapsed

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Remove diacritics: "Müller" → "Muller"
pub fn fold_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Trim and collapse internal whitespace runs to single spaces
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case- and diacritic-insensitive form used for lookups and comparisons
pub fn fold_text(s: &str) -> String {
    let folded = fold_diacritics(s);
    let mapped: String = folded
        .chars()
        .filter(|c| *c != '.' && *c != '\'' && *c != '’')
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&mapped)
}

/// Name tokens with initials removed: "John Q. Public" → ["john", "public"]
pub fn name_tokens(s: &str) -> Vec<String> {
    fold_text(s)
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Postal codes compare without spaces or hyphens, uppercase: "02139-4307" → "021394307"
pub fn normalize_postal(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_diacritics() {
        assert_eq!(fold_diacritics("Müller"), "Muller");
        assert_eq!(fold_diacritics("José Ñúñez"), "Jose Nunez");
    }

    #[test]
    fn test_fold_text() {
        assert_eq!(fold_text("  U.S.A. "), "usa");
        assert_eq!(fold_text("São   Paulo"), "sao paulo");
        assert_eq!(fold_text("Smith-Jones, Jr"), "smith jones jr");
    }

    #[test]
    fn test_name_tokens_drop_initials() {
        assert_eq!(name_tokens("John Q. Public"), vec!["john", "public"]);
        assert_eq!(name_tokens("O'Neil, J."), vec!["oneil"]);
    }

    #[test]
    fn test_normalize_postal() {
        assert_eq!(normalize_postal("02139-4307"), "021394307");
        assert_eq!(normalize_postal("sw1a 1aa"), "SW1A1AA");
    }
}
