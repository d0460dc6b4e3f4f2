//! Pattern library: recognizers for planets, signs, house phrases, noise
//! lines, and the heading matcher chain.
//!
//! Every recognizer either returns nothing or a canonical value. Planet and
//! sign names are matched against closed synonym tables (English names plus
//! the regional names used in the reference text), case-insensitively.
//!
//! # Heading matchers
//!
//! [`detect_heading`] runs [`HEADING_MATCHERS`] in order and returns the
//! first success:
//!
//! | # | Matcher | Shape |
//! |---|---------|-------|
//! | 1 | `sign_first` | `Aries (Sun exalted)` |
//! | 2 | `planet_first` | `Mars placed in Leo`, `Moon is in the sign of Cancer` |
//! | 3 | `bullet_rule` | `● Mars in Leo` |
//! | 4 | `conditional_house` | `If Saturn is in the 11th house` |
//! | 5 | `inline_house` | `Venus in the 2nd house` |
//! | 6 | `fallback` | any planet word, plus any sign / house phrase |

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownName;
use crate::models::Placement;

/// Lines outside this length range (in characters, after trimming) are never headings.
const MIN_HEADING_CHARS: usize = 5;
const MAX_HEADING_CHARS: usize = 200;

/// The nine grahas, in matcher priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Planet {
    Sun,
    Moon,
    Mars,
    Mercury,
    Jupiter,
    Venus,
    Saturn,
    Rahu,
    Ketu,
}

impl Planet {
    pub const ALL: [Planet; 9] = [
        Planet::Sun,
        Planet::Moon,
        Planet::Mars,
        Planet::Mercury,
        Planet::Jupiter,
        Planet::Venus,
        Planet::Saturn,
        Planet::Rahu,
        Planet::Ketu,
    ];

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        self.synonyms()[0]
    }

    /// All accepted names, canonical first.
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            Planet::Sun => &["sun", "surya"],
            Planet::Moon => &["moon", "chandra"],
            Planet::Mars => &["mars", "mangal", "kuja"],
            Planet::Mercury => &["mercury", "budh", "budha"],
            Planet::Jupiter => &["jupiter", "guru", "brihaspati"],
            Planet::Venus => &["venus", "shukra"],
            Planet::Saturn => &["saturn", "shani", "sani"],
            Planet::Rahu => &["rahu", "north node"],
            Planet::Ketu => &["ketu", "south node"],
        }
    }

    /// Resolve a whole name (any synonym, any case).
    pub fn from_name(name: &str) -> Option<Planet> {
        let needle = fold(name);
        Planet::ALL
            .into_iter()
            .find(|p| p.synonyms().contains(&needle.as_str()))
    }

    /// First planet (in priority order) with a synonym occurring as a whole
    /// word anywhere in `text`. `"Sunday"` does not name the Sun.
    pub fn find_in(text: &str) -> Option<Planet> {
        let found: Vec<Planet> = PLANET_WORD
            .captures_iter(text)
            .filter_map(|c| Planet::from_name(c.get(1)?.as_str()))
            .collect();
        Planet::ALL.into_iter().find(|p| found.contains(p))
    }
}

impl fmt::Display for Planet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Planet {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Planet::from_name(s).ok_or_else(|| UnknownName {
            kind: "planet",
            name: s.to_string(),
        })
    }
}

impl TryFrom<String> for Planet {
    type Error = UnknownName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Planet> for String {
    fn from(planet: Planet) -> Self {
        planet.as_str().to_string()
    }
}

/// The twelve rashis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Sign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl Sign {
    pub const ALL: [Sign; 12] = [
        Sign::Aries,
        Sign::Taurus,
        Sign::Gemini,
        Sign::Cancer,
        Sign::Leo,
        Sign::Virgo,
        Sign::Libra,
        Sign::Scorpio,
        Sign::Sagittarius,
        Sign::Capricorn,
        Sign::Aquarius,
        Sign::Pisces,
    ];

    pub fn as_str(self) -> &'static str {
        self.synonyms()[0]
    }

    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            Sign::Aries => &["aries", "mesha"],
            Sign::Taurus => &["taurus", "vrishabha", "vrishab"],
            Sign::Gemini => &["gemini", "mithuna", "mithun"],
            Sign::Cancer => &["cancer", "karka", "kark"],
            Sign::Leo => &["leo", "simha", "singh"],
            Sign::Virgo => &["virgo", "kanya"],
            Sign::Libra => &["libra", "tula"],
            Sign::Scorpio => &["scorpio", "vrischika", "vrishchik"],
            Sign::Sagittarius => &["sagittarius", "dhanus", "dhanu"],
            Sign::Capricorn => &["capricorn", "makara", "makar"],
            Sign::Aquarius => &["aquarius", "kumbha", "kumbh"],
            Sign::Pisces => &["pisces", "meena", "mina"],
        }
    }

    pub fn from_name(name: &str) -> Option<Sign> {
        let needle = fold(name);
        Sign::ALL
            .into_iter()
            .find(|s| s.synonyms().contains(&needle.as_str()))
    }

    /// Expand a free-form sign query into every spelling of the sign it names.
    ///
    /// A query names a sign when it equals, contains, or is contained in one
    /// of that sign's spellings. The result lists the canonical name first,
    /// then every synonym. Unrecognized queries expand to themselves.
    pub fn expand(query: &str) -> Vec<String> {
        let query = fold(query);
        if query.is_empty() {
            return Vec::new();
        }
        for sign in Sign::ALL {
            let names = sign.synonyms();
            if names
                .iter()
                .any(|v| *v == query || query.contains(v) || v.contains(query.as_str()))
            {
                return names.iter().map(|v| v.to_string()).collect();
            }
        }
        vec![query]
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sign {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sign::from_name(s).ok_or_else(|| UnknownName {
            kind: "sign",
            name: s.to_string(),
        })
    }
}

impl TryFrom<String> for Sign {
    type Error = UnknownName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Sign> for String {
    fn from(sign: Sign) -> Self {
        sign.as_str().to_string()
    }
}

/// Lowercase and collapse inner whitespace, so `"North  Node"` folds to `"north node"`.
fn fold(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Regex alternation over a set of names, longest first, spaces as `\s+`.
fn alternation<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let mut names: Vec<&str> = names.collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    names
        .iter()
        .map(|n| regex::escape(n).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

static PLANET_ALT: Lazy<String> =
    Lazy::new(|| alternation(Planet::ALL.iter().flat_map(|p| p.synonyms().iter().copied())));

static SIGN_ALT: Lazy<String> =
    Lazy::new(|| alternation(Sign::ALL.iter().flat_map(|s| s.synonyms().iter().copied())));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}

static PLANET_WORD: Lazy<Regex> = Lazy::new(|| compile(&format!(r"(?i)\b({})\b", *PLANET_ALT)));

static SIGN_WORD: Lazy<Regex> = Lazy::new(|| compile(&format!(r"(?i)\b({})\b", *SIGN_ALT)));

static HOUSE_PHRASE: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\b(1[0-2]|[1-9])(?:st|nd|rd|th)?\s+house\b"));

static HOUSE_WORD: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bhouse\b"));

static SIGN_FIRST: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)\b({})\b\s*[:\-(]?\s*\(([^)]+)\)",
        *SIGN_ALT
    ))
});

static PLANET_FIRST: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)\b({})\b.{{0,20}}?\b(?:is\s+placed\s+in|placed\s+in|situated\s+in|posited\s+in|occupies|is\s+in|in)\b.{{0,20}}?\b({})\b",
        *PLANET_ALT, *SIGN_ALT
    ))
});

static BULLET_RULE: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)^[●•▪◦*\-]\s*({})\s+in\s+({})\b",
        *PLANET_ALT, *SIGN_ALT
    ))
});

static CONDITIONAL_HOUSE: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)\bif\s+({})\s+(?:is\s+)?(?:placed\s+in|occupies|in)\s+(?:the\s+)?(\d{{1,2}})(?:st|nd|rd|th)?\s+house\b",
        *PLANET_ALT
    ))
});

static INLINE_HOUSE: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)\b({})\b.{{0,15}}?\b(?:placed\s+in|occupies|in)\s+(?:the\s+)?(\d{{1,2}})(?:st|nd|rd|th)?\s+house\b",
        *PLANET_ALT
    ))
});

/// Publisher boilerplate and decorative invocation lines.
static NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"गुरुर्ब्रह्मा",
        r"न अहं कता",
        r"(?i)notion press",
        r"(?i)\bisbn\b",
        r"(?i)\bpublisher\b",
        r"^\s*$",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

/// Whole-word planet mention anywhere in `text`.
pub fn planet_word(text: &str) -> Option<Planet> {
    PLANET_WORD
        .captures(text)
        .and_then(|c| Planet::from_name(c.get(1)?.as_str()))
}

/// First whole-word sign mention anywhere in `text`.
pub fn sign_word(text: &str) -> Option<Sign> {
    SIGN_WORD
        .captures(text)
        .and_then(|c| Sign::from_name(c.get(1)?.as_str()))
}

/// House number from a `"<n>th house"` phrase, if present.
pub fn house_phrase(text: &str) -> Option<u8> {
    HOUSE_PHRASE
        .captures(text)
        .and_then(|c| c.get(1)?.as_str().parse().ok())
}

/// True when `text` mentions the word "house".
pub fn mentions_house(text: &str) -> bool {
    HOUSE_WORD.is_match(text)
}

/// True for lines excluded from segmentation entirely (blank lines included).
pub fn is_noise(line: &str) -> bool {
    NOISE.iter().any(|re| re.is_match(line))
}

fn parse_house(digits: &str) -> Option<u8> {
    digits.parse().ok().filter(|h| (1..=12).contains(h))
}

/// One entry in the heading chain.
pub struct HeadingMatcher {
    pub name: &'static str,
    pub detect: fn(&str) -> Option<Placement>,
}

/// Heading matchers in priority order; the first success wins.
pub const HEADING_MATCHERS: [HeadingMatcher; 6] = [
    HeadingMatcher {
        name: "sign_first",
        detect: sign_first,
    },
    HeadingMatcher {
        name: "planet_first",
        detect: planet_first,
    },
    HeadingMatcher {
        name: "bullet_rule",
        detect: bullet_rule,
    },
    HeadingMatcher {
        name: "conditional_house",
        detect: conditional_house,
    },
    HeadingMatcher {
        name: "inline_house",
        detect: inline_house,
    },
    HeadingMatcher {
        name: "fallback",
        detect: fallback,
    },
];

/// `"Aries (Sun exalted)"`: the sign leads, the planet is named inside the parentheses.
pub fn sign_first(line: &str) -> Option<Placement> {
    let caps = SIGN_FIRST.captures(line)?;
    let sign = Sign::from_name(caps.get(1)?.as_str())?;
    let planet = Planet::find_in(caps.get(2)?.as_str())?;
    Some(Placement {
        planet,
        sign: Some(sign),
        house: house_phrase(line),
    })
}

/// `"Mars placed in Leo"`, with the connective and the sign each within 20 characters.
pub fn planet_first(line: &str) -> Option<Placement> {
    let caps = PLANET_FIRST.captures(line)?;
    Some(Placement {
        planet: Planet::from_name(caps.get(1)?.as_str())?,
        sign: Sign::from_name(caps.get(2)?.as_str()),
        house: house_phrase(line),
    })
}

/// `"● Mars in Leo"` at the start of a line.
pub fn bullet_rule(line: &str) -> Option<Placement> {
    let caps = BULLET_RULE.captures(line)?;
    Some(Placement {
        planet: Planet::from_name(caps.get(1)?.as_str())?,
        sign: Sign::from_name(caps.get(2)?.as_str()),
        house: None,
    })
}

/// `"If Saturn is in the 11th house"`.
pub fn conditional_house(line: &str) -> Option<Placement> {
    let caps = CONDITIONAL_HOUSE.captures(line)?;
    Some(Placement {
        planet: Planet::from_name(caps.get(1)?.as_str())?,
        sign: None,
        house: Some(parse_house(caps.get(2)?.as_str())?),
    })
}

/// `"Venus in the 2nd house"`, with the connective within 15 characters of the planet.
pub fn inline_house(line: &str) -> Option<Placement> {
    let caps = INLINE_HOUSE.captures(line)?;
    Some(Placement {
        planet: Planet::from_name(caps.get(1)?.as_str())?,
        sign: None,
        house: Some(parse_house(caps.get(2)?.as_str())?),
    })
}

/// Any planet word, with whatever sign and house phrase the line also carries.
pub fn fallback(line: &str) -> Option<Placement> {
    Some(Placement {
        planet: planet_word(line)?,
        sign: sign_word(line),
        house: house_phrase(line),
    })
}

/// Run the heading chain over one line.
pub fn detect_heading(line: &str) -> Option<Placement> {
    let trimmed = line.trim();
    let len = trimmed.chars().count();
    if !(MIN_HEADING_CHARS..=MAX_HEADING_CHARS).contains(&len) || is_noise(trimmed) {
        return None;
    }
    HEADING_MATCHERS
        .iter()
        .find_map(|matcher| (matcher.detect)(trimmed))
}
