//! Placement retrieval: chunks that interpret one planet in a sign and house.
//!
//! Scoring works on the keywords the segmenter seeded from heading lines
//! (`"mars"`, `"sign leo"`, `"house 10"`), not on free text:
//!
//! | Signal | Points |
//! |--------|--------|
//! | chunk planet keyword contains, or is contained in, the queried planet | 100 |
//! | chunk sign keyword matches any spelling of the queried sign | 50 |
//! | chunk house keyword equals the queried house | 30 |
//!
//! Chunks scoring above [`STRONG_SCORE`] are returned best first, up to the
//! limit. Without any such chunk, the single best positive score is returned.
//! With no positive score at all, the first chunk carrying the planet name in
//! any keyword is returned.

use std::cmp::Reverse;
use tracing::debug;

use crate::garbage::GarbageFilter;
use crate::knowledge::KnowledgeBase;
use crate::models::{KnowledgeChunk, Placement, Section};
use crate::patterns::{Planet, Sign};
use crate::text::truncate_chars;

pub const PLANET_SCORE: u32 = 100;
pub const SIGN_SCORE: u32 = 50;
pub const HOUSE_SCORE: u32 = 30;
/// Scores above this count as a confident match.
pub const STRONG_SCORE: u32 = 50;

/// A normalized placement lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementQuery {
    /// Canonical planet name when the entity is a known synonym, otherwise
    /// the lowercased entity as given.
    pub planet: String,
    /// Every spelling of the queried sign, canonical first.
    pub sign_variants: Vec<String>,
    pub house: Option<u8>,
}

impl PlacementQuery {
    /// `None` when `entity` is empty.
    pub fn new(entity: &str, sign: Option<&str>, house: Option<u8>) -> Option<Self> {
        let entity = entity.trim();
        if entity.is_empty() {
            return None;
        }
        let planet = Planet::from_name(entity)
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| entity.to_lowercase());
        Some(Self {
            planet,
            sign_variants: sign.map(Sign::expand).unwrap_or_default(),
            house,
        })
    }

    pub fn from_placement(placement: &Placement) -> Self {
        Self {
            planet: placement.planet.as_str().to_string(),
            sign_variants: placement
                .sign
                .map(|s| Sign::expand(s.as_str()))
                .unwrap_or_default(),
            house: placement.house,
        }
    }
}

fn is_planet_keyword(keyword: &str) -> bool {
    Planet::ALL.iter().any(|p| p.as_str() == keyword)
}

/// Relevance of one chunk to a query.
pub fn score_chunk(chunk: &KnowledgeChunk, query: &PlacementQuery) -> u32 {
    let keywords: Vec<String> = chunk.keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut score = 0;

    if keywords
        .iter()
        .filter(|k| is_planet_keyword(k))
        .any(|k| k.contains(&query.planet) || query.planet.contains(k.as_str()))
    {
        score += PLANET_SCORE;
    }

    if !query.sign_variants.is_empty()
        && keywords
            .iter()
            .filter_map(|k| k.strip_prefix("sign "))
            .any(|cs| {
                query
                    .sign_variants
                    .iter()
                    .any(|sv| cs.contains(sv.as_str()) || sv.contains(cs))
            })
    {
        score += SIGN_SCORE;
    }

    if let Some(house) = query.house {
        let house = house.to_string();
        if keywords
            .iter()
            .filter_map(|k| k.strip_prefix("house "))
            .any(|h| h == house)
        {
            score += HOUSE_SCORE;
        }
    }

    score
}

/// Pick the chunks that best interpret `query`, garbage excluded.
pub fn select_chunks(
    kb: &KnowledgeBase,
    query: &PlacementQuery,
    limit: usize,
    garbage: &GarbageFilter,
) -> Vec<KnowledgeChunk> {
    let candidates: Vec<&KnowledgeChunk> = kb
        .section(Section::PlanetaryRules)
        .filter(|c| !garbage.is_garbage(c))
        .collect();

    let mut scored: Vec<(u32, &KnowledgeChunk)> = candidates
        .iter()
        .map(|c| (score_chunk(c, query), *c))
        .filter(|(score, _)| *score > 0)
        .collect();

    if scored.is_empty() {
        let fallback: Vec<KnowledgeChunk> = candidates
            .into_iter()
            .find(|c| {
                c.keywords
                    .iter()
                    .any(|k| k.to_lowercase().contains(&query.planet))
            })
            .cloned()
            .into_iter()
            .collect();
        debug!(planet = %query.planet, matches = fallback.len(), "placement fallback");
        return fallback;
    }

    // stable: equal scores keep document order
    scored.sort_by_key(|(score, _)| Reverse(*score));

    let strong: Vec<KnowledgeChunk> = scored
        .iter()
        .filter(|(score, _)| *score > STRONG_SCORE)
        .take(limit)
        .map(|(_, c)| (*c).clone())
        .collect();

    let selected = if strong.is_empty() {
        vec![scored[0].1.clone()]
    } else {
        strong
    };
    debug!(
        planet = %query.planet,
        scored = scored.len(),
        selected = selected.len(),
        "placement matches"
    );
    selected
}

/// One snippet per selected chunk, in placement order, joined by blank
/// lines and capped once at `max_chars`.
pub fn personality_context(
    kb: &KnowledgeBase,
    placements: &[Placement],
    limit: usize,
    snippet_chars: usize,
    max_chars: usize,
    garbage: &GarbageFilter,
) -> String {
    let snippets: Vec<String> = placements
        .iter()
        .flat_map(|placement| {
            let query = PlacementQuery::from_placement(placement);
            select_chunks(kb, &query, limit, garbage)
        })
        .map(|chunk| {
            format!(
                "{}: {}",
                chunk.label,
                truncate_chars(&chunk.content, snippet_chars)
            )
        })
        .collect();
    truncate_chars(&snippets.join("\n\n"), max_chars)
}
