//! Garbage filter for placement retrieval.
//!
//! Segmentation of a typeset book leaves behind chunks that are technically
//! text but carry no interpretation: index lines, running headers, bare page
//! numbers. A [`GarbageFilter`] is an ordered list of named predicates; a
//! chunk is garbage when any of them matches its trimmed content.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::KnowledgeChunk;

/// Chunks shorter than this are headings with nothing under them.
pub const MIN_USEFUL_CHARS: usize = 80;
/// Minimum share of ASCII letters in a useful chunk.
pub const MIN_ALPHA_RATIO: f64 = 0.3;

const PLANETS: &str = "Sun|Moon|Mars|Mercury|Jupiter|Venus|Saturn|Rahu|Ketu";

fn compile(pattern: String) -> Regex {
    Regex::new(&pattern).expect("built-in pattern must compile")
}

static INDEX_LINE: Lazy<Regex> =
    Lazy::new(|| compile(format!(r"(?i)^\s*({})[^a-z]*\d+$", PLANETS)));
static BARE_NAME: Lazy<Regex> =
    Lazy::new(|| compile(format!(r"(?i)^\s*({})[\s.\-:]+$", PLANETS)));
static SIGNIFICATIONS_HEADER: Lazy<Regex> = Lazy::new(|| {
    compile(format!(
        r"(?i)^\s*({})\s*[:.]\s*(Other|Significations|Signification|Rules|Rule)",
        PLANETS
    ))
});
static PUNCTUATION_ONLY: Lazy<Regex> = Lazy::new(|| compile(r"^[\s.\-:]+$".to_string()));
static PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| compile(r"^\d+$".to_string()));

/// One named garbage predicate over trimmed chunk content.
#[derive(Clone, Copy)]
pub struct GarbageRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
}

impl std::fmt::Debug for GarbageRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GarbageRule").field("name", &self.name).finish()
    }
}

fn too_short(content: &str) -> bool {
    content.chars().count() < MIN_USEFUL_CHARS
}

fn low_alpha(content: &str) -> bool {
    let total = content.chars().count();
    let alpha = content.chars().filter(char::is_ascii_alphabetic).count();
    (alpha as f64) < total as f64 * MIN_ALPHA_RATIO
}

/// The default rules, in evaluation order.
pub const DEFAULT_RULES: [GarbageRule; 7] = [
    GarbageRule {
        name: "too_short",
        matches: too_short,
    },
    GarbageRule {
        name: "index_line",
        matches: |c| INDEX_LINE.is_match(c),
    },
    GarbageRule {
        name: "bare_name",
        matches: |c| BARE_NAME.is_match(c),
    },
    GarbageRule {
        name: "significations_header",
        matches: |c| SIGNIFICATIONS_HEADER.is_match(c),
    },
    GarbageRule {
        name: "punctuation_only",
        matches: |c| PUNCTUATION_ONLY.is_match(c),
    },
    GarbageRule {
        name: "page_number",
        matches: |c| PAGE_NUMBER.is_match(c),
    },
    GarbageRule {
        name: "low_alpha",
        matches: low_alpha,
    },
];

#[derive(Debug, Clone)]
pub struct GarbageFilter {
    rules: Vec<GarbageRule>,
}

impl Default for GarbageFilter {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }
}

impl GarbageFilter {
    /// A filter with no rules; nothing is garbage.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule; it runs after the existing ones.
    pub fn push(&mut self, rule: GarbageRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[GarbageRule] {
        &self.rules
    }

    /// Name of the first rule that rejects `content`.
    pub fn reason(&self, content: &str) -> Option<&'static str> {
        let content = content.trim();
        self.rules
            .iter()
            .find(|rule| (rule.matches)(content))
            .map(|rule| rule.name)
    }

    pub fn is_garbage(&self, chunk: &KnowledgeChunk) -> bool {
        self.reason(&chunk.content).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USEFUL: &str = "Saturn in the tenth house brings slow but lasting success through \
                          patience, duty and long service to others.";

    #[test]
    fn test_useful_text_passes() {
        assert_eq!(GarbageFilter::default().reason(USEFUL), None);
    }

    #[test]
    fn test_index_line_is_garbage() {
        let filter = GarbageFilter::default();
        assert_eq!(filter.reason("Saturn .......... 81"), Some("too_short"));

        let long_index = format!("Saturn {} 81", ".".repeat(90));
        assert_eq!(filter.reason(&long_index), Some("index_line"));
    }

    #[test]
    fn test_each_rule_individually() {
        let rule = |name: &str| {
            DEFAULT_RULES
                .iter()
                .find(|r| r.name == name)
                .map(|r| r.matches)
                .unwrap()
        };
        assert!(rule("too_short")("short"));
        assert!(rule("bare_name")("Jupiter :-."));
        assert!(!rule("bare_name")("Jupiter rules"));
        assert!(rule("significations_header")("Moon: Other Significations of the Moon"));
        assert!(rule("punctuation_only")(". - . : ."));
        assert!(rule("page_number")("142"));
        assert!(rule("low_alpha")("12 34 56 78 90 ab"));
        assert!(!rule("low_alpha")(USEFUL));
    }

    #[test]
    fn test_push_extends_without_touching_defaults() {
        let mut filter = GarbageFilter::default();
        filter.push(GarbageRule {
            name: "mentions_errata",
            matches: |c| c.contains("errata"),
        });
        let errata = format!("{} See the errata.", USEFUL);
        assert_eq!(filter.reason(&errata), Some("mentions_errata"));
        assert_eq!(filter.rules().len(), DEFAULT_RULES.len() + 1);

        assert_eq!(GarbageFilter::empty().reason("42"), None);
    }
}
