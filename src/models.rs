//! Core data models used throughout the engine.
//!
//! These types represent the placements, sections, chunks, and rule records
//! that flow from segmentation into retrieval.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::patterns::{Planet, Sign};

/// A planet, optionally located in a sign and/or a house (1–12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub planet: Planet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign: Option<Sign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house: Option<u8>,
}

impl Placement {
    /// Keywords a chunk opened by this placement is seeded with:
    /// `planet`, `"sign {name}"`, `"house {n}"`.
    pub fn keywords(&self) -> Vec<String> {
        let mut keywords = vec![self.planet.as_str().to_string()];
        if let Some(sign) = self.sign {
            keywords.push(format!("sign {}", sign));
        }
        if let Some(house) = self.house {
            keywords.push(format!("house {}", house));
        }
        keywords
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.planet)?;
        if let Some(sign) = self.sign {
            write!(f, " in {}", sign)?;
        }
        if let Some(house) = self.house {
            write!(f, " (house {})", house)?;
        }
        Ok(())
    }
}

/// The seven topical buckets chunks are grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    PlanetaryRules,
    Combinations,
    Topics,
    TwoPlanetCombinations,
    TransitRules,
    ProfessionRules,
    RelationshipRules,
}

impl Section {
    /// All sections, in detection order.
    pub const ALL: [Section; 7] = [
        Section::PlanetaryRules,
        Section::Combinations,
        Section::Topics,
        Section::TwoPlanetCombinations,
        Section::TransitRules,
        Section::ProfessionRules,
        Section::RelationshipRules,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Section::PlanetaryRules => "planetary_rules",
            Section::Combinations => "combinations",
            Section::Topics => "topics",
            Section::TwoPlanetCombinations => "two_planet_combinations",
            Section::TransitRules => "transit_rules",
            Section::ProfessionRules => "profession_rules",
            Section::RelationshipRules => "relationship_rules",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Section::PlanetaryRules => "Planetary Rules",
            Section::Combinations => "Combinations",
            Section::Topics => "Life Topics",
            Section::TwoPlanetCombinations => "Two Planet Combinations",
            Section::TransitRules => "Transit Rules",
            Section::ProfessionRules => "Profession Rules",
            Section::RelationshipRules => "Relationship Rules",
        }
    }

    /// Words whose presence in an opening line places a chunk in this section.
    pub fn anchors(self) -> &'static [&'static str] {
        match self {
            Section::PlanetaryRules => &[
                "Sun", "Moon", "Mars", "Mercury", "Jupiter", "Venus", "Saturn", "Rahu", "Ketu",
            ],
            Section::Combinations => &["Combination", "Dual", "Pairing"],
            Section::Topics => &["Marriage", "Career", "Health", "Wealth", "Education"],
            Section::TwoPlanetCombinations => &["Two-Planet", "Dual Planet", "Synergy"],
            Section::TransitRules => &["Transit", "Gochar", "Movement"],
            Section::ProfessionRules => &["Profession", "Career Path", "Work"],
            Section::RelationshipRules => &["Relationship", "Marriage", "Compatibility"],
        }
    }

    /// Default keywords for chunks that were not opened by a heading.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Section::PlanetaryRules => &["planet", "placement", "interpretation"],
            Section::Combinations => &["combination", "pair", "alignment"],
            Section::Topics => &["topic", "aspect", "focus"],
            Section::TwoPlanetCombinations => &["two-planet", "interaction"],
            Section::TransitRules => &["transit", "movement", "current"],
            Section::ProfessionRules => &["profession", "career", "job"],
            Section::RelationshipRules => &["relationship", "marriage", "compatibility"],
        }
    }

    pub fn from_key(key: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.key() == key)
    }

    /// Classify a line by the first section with a matching anchor or keyword.
    /// Falls back to [`Section::PlanetaryRules`].
    pub fn detect(text: &str) -> Section {
        let lower = text.to_lowercase();
        Section::ALL
            .into_iter()
            .find(|section| {
                section
                    .anchors()
                    .iter()
                    .chain(section.keywords())
                    .any(|word| lower.contains(&word.to_lowercase()))
            })
            .unwrap_or(Section::PlanetaryRules)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A segmented, labeled unit of the reference text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeChunk {
    /// `chunk_{n}`, contiguous from 1 in document order.
    pub id: String,
    pub section: Section,
    pub label: &'static str,
    /// Normalized text: bullets and long dashes folded to `-`, whitespace collapsed.
    pub content: String,
    pub keywords: Vec<String>,
    /// Placement detected on the heading line that opened the chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    /// SHA-256 of `content`, hex encoded.
    pub hash: String,
}

impl KnowledgeChunk {
    /// `"{label} {content}"`, the text retrieval matches against.
    pub fn haystack(&self) -> String {
        format!("{} {}", self.label, self.content)
    }
}

/// One row of the rule mapping sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: String,
    pub category: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_pages: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_pages: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub planets: Vec<String>,
    #[serde(default)]
    pub houses: Vec<String>,
    #[serde(default)]
    pub transits: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_keywords() {
        let p = Placement {
            planet: Planet::Sun,
            sign: Some(Sign::Aries),
            house: Some(5),
        };
        assert_eq!(p.keywords(), vec!["sun", "sign aries", "house 5"]);
        assert_eq!(p.to_string(), "sun in aries (house 5)");

        let bare = Placement {
            planet: Planet::Ketu,
            sign: None,
            house: None,
        };
        assert_eq!(bare.keywords(), vec!["ketu"]);
    }

    #[test]
    fn test_section_detect() {
        assert_eq!(Section::detect("Marriage and family life"), Section::Topics);
        assert_eq!(Section::detect("Transit of slow movers"), Section::TransitRules);
        assert_eq!(
            Section::detect("Compatibility between partners"),
            Section::RelationshipRules
        );
        assert_eq!(Section::detect("Nothing specific"), Section::PlanetaryRules);
    }

    #[test]
    fn test_section_keys_round_trip() {
        for section in Section::ALL {
            assert_eq!(Section::from_key(section.key()), Some(section));
        }
        assert_eq!(Section::from_key("Career"), None);
        assert_eq!(
            serde_json::to_string(&Section::TwoPlanetCombinations).unwrap(),
            "\"two_planet_combinations\""
        );
    }

    #[test]
    fn test_placement_deserializes_synonyms() {
        let p: Placement =
            serde_json::from_str(r#"{"planet": "Shani", "sign": "Makara", "house": 10}"#).unwrap();
        assert_eq!(p.planet, Planet::Saturn);
        assert_eq!(p.sign, Some(Sign::Capricorn));
        assert_eq!(p.house, Some(10));
    }
}
