//! Small text helpers shared by the segmenter and retrieval.

use once_cell::sync::Lazy;
use regex::Regex;

static BULLETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[●•·▪◦∙‣⁃■]").expect("valid pattern"));
static LONG_DASHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{2012}\u{2013}\u{2014}\u{2015}]").expect("valid pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid pattern"));

/// Fold bullet glyphs and long dashes to `-`, collapse whitespace runs, trim.
pub fn normalize_text(text: &str) -> String {
    let text = BULLETS.replace_all(text, "-");
    let text = LONG_DASHES.replace_all(&text, "-");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// First `max` characters of `text`, never splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_bullets_and_dashes() {
        assert_eq!(
            normalize_text("● First\n•  second — third – fourth"),
            "- First - second - third - fourth"
        );
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  a\n\n\tb   c  "), "a b c");
        assert_eq!(normalize_text(" \n "), "");
    }

    #[test]
    fn test_truncate_exact_at_cap() {
        let text = "x".repeat(50);
        assert_eq!(truncate_chars(&text, 10).chars().count(), 10);
        assert_eq!(truncate_chars(&text, 50), text);
        assert_eq!(truncate_chars(&text, 80), text);
        assert_eq!(truncate_chars(&text, 0), "");
    }

    #[test]
    fn test_truncate_is_char_boundary_safe() {
        let text = "सूर्य मेष राशि में";
        let cut = truncate_chars(text, 3);
        assert_eq!(cut.chars().count(), 3);
        assert!(text.starts_with(&cut));
    }
}
