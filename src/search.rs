use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashSet;

use crate::knowledge::KnowledgeBase;
use crate::models::{KnowledgeChunk, RuleRecord, Section};
use crate::patterns::Planet;
use crate::text::{normalize_text, truncate_chars};

/// Budgets and limits for every retrieval path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalParams {
    /// Chunks kept by rule-record retrieval.
    pub context_chunks: usize,
    /// Character budget of the rule-record context string.
    pub context_chars: usize,
    /// Character budget of the generic search context string.
    pub search_chars: usize,
    /// Chunks per placement.
    pub placement_limit: usize,
    /// Characters of each chunk quoted in the personality context.
    pub snippet_chars: usize,
    pub personality_chars: usize,
    /// Chunks returned by rule ranking.
    pub rule_limit: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            context_chunks: 12,
            context_chars: 5000,
            search_chars: 4000,
            placement_limit: 2,
            snippet_chars: 150,
            personality_chars: 1500,
            rule_limit: 8,
        }
    }
}

/// `"{label}: {content}"` per chunk, one per line.
fn labeled_lines(chunks: &[KnowledgeChunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("{}: {}", c.label, c.content))
        .collect::<Vec<_>>()
        .join("\n")
}

// ═══════════════════════════════════════════════════════════════════════
// Rule-record retrieval
// ═══════════════════════════════════════════════════════════════════════

/// Result of [`rule_context`].
#[derive(Debug, Clone, Serialize)]
pub struct RuleContext {
    /// The record resolved from the rule reference, if any.
    pub rule: Option<RuleRecord>,
    pub chunks: Vec<KnowledgeChunk>,
    pub text: String,
}

/// Tags taken straight from the rule sheet: planets, houses, transits and
/// page hints. Empty cells are dropped.
pub fn excel_keywords(rule: &RuleRecord) -> Vec<String> {
    rule.planets
        .iter()
        .chain(&rule.houses)
        .chain(&rule.transits)
        .chain(rule.primary_pages.iter())
        .chain(rule.secondary_pages.iter())
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Chunks for a category question, optionally anchored on a rule record.
///
/// Chunks containing a sheet tag come first, then chunks containing any
/// needle (sheet tags, keyword tags, category) or carrying a keyword equal
/// to one. A chunk that qualifies both ways appears twice. The list is cut
/// to `params.context_chunks` and the joined text to `params.context_chars`.
pub fn rule_context(
    kb: &KnowledgeBase,
    category: &str,
    rule: Option<&RuleRecord>,
    params: &RetrievalParams,
) -> RuleContext {
    let excel = rule.map(excel_keywords).unwrap_or_default();
    let needles: Vec<String> = excel
        .iter()
        .cloned()
        .chain(
            rule.into_iter()
                .flat_map(|r| r.keywords.iter())
                .map(|k| k.trim().to_lowercase()),
        )
        .chain(std::iter::once(category.trim().to_lowercase()))
        .filter(|k| !k.is_empty())
        .collect();

    let strong = kb.iter().filter(|chunk| {
        let hay = chunk.haystack().to_lowercase();
        excel.iter().any(|k| hay.contains(k.as_str()))
    });
    let weak = kb.iter().filter(|chunk| {
        let hay = chunk.haystack().to_lowercase();
        needles.iter().any(|n| hay.contains(n.as_str()))
            || chunk
                .keywords
                .iter()
                .any(|k| needles.contains(&k.to_lowercase()))
    });

    let chunks: Vec<KnowledgeChunk> = strong
        .chain(weak)
        .take(params.context_chunks)
        .cloned()
        .collect();
    let text = truncate_chars(&labeled_lines(&chunks), params.context_chars);

    RuleContext {
        rule: rule.cloned(),
        chunks,
        text,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Generic search
// ═══════════════════════════════════════════════════════════════════════

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").expect("valid pattern"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid pattern"));

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub category: Option<String>,
    pub rule_ref: Option<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub sections: Vec<Section>,
    pub chunks: Vec<KnowledgeChunk>,
    pub text: String,
}

/// Lowercase, replace anything but `[a-z0-9]` and whitespace with a space,
/// collapse spaces.
pub fn normalize_needle(value: &str) -> String {
    let lower = value.to_lowercase();
    let cleaned = NON_ALNUM.replace_all(&lower, " ");
    SPACES.replace_all(&cleaned, " ").trim().to_string()
}

/// Normalized needles plus each of their words, deduplicated in first-seen order.
pub fn expand_needles<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for needle in values.into_iter().map(normalize_needle) {
        if needle.is_empty() {
            continue;
        }
        let tokens: Vec<String> = needle.split(' ').map(str::to_string).collect();
        for candidate in std::iter::once(needle).chain(tokens) {
            if !candidate.is_empty() && seen.insert(candidate.clone()) {
                out.push(candidate);
            }
        }
    }
    out
}

/// Sections a category should search.
///
/// No category searches everything. A section key selects that section.
/// Otherwise a section qualifies when its label contains the category, or
/// one of its anchors or keywords contains or is contained in it. When
/// nothing qualifies, everything is searched.
pub fn resolve_sections(category: Option<&str>) -> Vec<Section> {
    let Some(category) = category.filter(|c| !c.is_empty()) else {
        return Section::ALL.to_vec();
    };
    if let Some(section) = Section::from_key(category) {
        return vec![section];
    }
    let wanted = normalize_needle(category);
    if wanted.is_empty() {
        return Section::ALL.to_vec();
    }

    let related = |word: &&str| {
        let word = normalize_needle(word);
        word.contains(&wanted) || wanted.contains(&word)
    };
    let matches: Vec<Section> = Section::ALL
        .into_iter()
        .filter(|s| {
            s.label().to_lowercase().contains(&wanted)
                || s.anchors().iter().any(related)
                || s.keywords().iter().any(related)
        })
        .collect();

    if matches.is_empty() {
        Section::ALL.to_vec()
    } else {
        matches
    }
}

/// Keyword search over the resolved sections, section by section.
pub fn search(kb: &KnowledgeBase, request: &SearchRequest, max_chars: usize) -> SearchOutcome {
    let needles = expand_needles(
        request
            .keywords
            .iter()
            .map(String::as_str)
            .chain(request.category.as_deref())
            .chain(request.rule_ref.as_deref()),
    );
    let sections = resolve_sections(request.category.as_deref());

    let chunks: Vec<KnowledgeChunk> = sections
        .iter()
        .flat_map(|&section| kb.section(section))
        .filter(|chunk| {
            if needles.is_empty() {
                return true;
            }
            let hay = normalize_needle(&chunk.haystack());
            needles.iter().any(|n| hay.contains(n.as_str()))
                || chunk
                    .keywords
                    .iter()
                    .any(|k| needles.contains(&normalize_needle(k)))
        })
        .cloned()
        .collect();

    let text = truncate_chars(&normalize_text(&labeled_lines(&chunks)), max_chars);
    SearchOutcome {
        sections,
        chunks,
        text,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Rule ranking
// ═══════════════════════════════════════════════════════════════════════

pub const RULE_PLANET_SCORE: u32 = 100;
pub const RULE_HOUSE_SCORE: u32 = 30;
pub const RULE_KEYWORD_SCORE: u32 = 5;

/// Score one chunk against a rule's planet, house and keyword tags.
pub fn rule_score(rule: &RuleRecord, chunk: &KnowledgeChunk) -> u32 {
    let keywords: Vec<String> = chunk.keywords.iter().map(|k| k.to_lowercase()).collect();
    let chunk_planets: Vec<&str> = keywords
        .iter()
        .map(String::as_str)
        .filter(|k| Planet::ALL.iter().any(|p| p.as_str() == *k))
        .collect();
    let chunk_houses: Vec<&str> = keywords
        .iter()
        .filter_map(|k| k.strip_prefix("house "))
        .collect();

    let mut score = 0;
    for planet in rule.planets.iter().map(|p| p.trim().to_lowercase()) {
        if !planet.is_empty()
            && chunk_planets
                .iter()
                .any(|cp| cp.contains(planet.as_str()) || planet.contains(cp))
        {
            score += RULE_PLANET_SCORE;
        }
    }
    for house in &rule.houses {
        let digits: String = house.chars().filter(char::is_ascii_digit).collect();
        if chunk_houses.contains(&digits.as_str()) {
            score += RULE_HOUSE_SCORE;
        }
    }
    let rule_keywords: HashSet<String> = rule.keywords.iter().map(|k| k.to_lowercase()).collect();
    let chunk_tokens: HashSet<&String> = keywords.iter().collect();
    for keyword in &rule_keywords {
        if chunk_tokens.contains(keyword) {
            score += RULE_KEYWORD_SCORE;
        }
    }
    score
}

/// Best chunks for a rule, highest score first (document order on ties).
/// When nothing scores, the first `limit` chunks of the document.
pub fn rank_rule_chunks(kb: &KnowledgeBase, rule: &RuleRecord, limit: usize) -> Vec<KnowledgeChunk> {
    let mut scored: Vec<(u32, &KnowledgeChunk)> = kb
        .iter()
        .map(|c| (rule_score(rule, c), c))
        .filter(|(score, _)| *score > 0)
        .collect();

    if scored.is_empty() {
        return kb.iter().take(limit).cloned().collect();
    }
    scored.sort_by_key(|(score, _)| Reverse(*score));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, c)| c.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, section: Section, keywords: &[&str], content: &str) -> KnowledgeChunk {
        KnowledgeChunk {
            id: id.to_string(),
            section,
            label: section.label(),
            content: content.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            placement: None,
            hash: String::new(),
        }
    }

    fn rule(id: &str) -> RuleRecord {
        RuleRecord {
            id: id.to_string(),
            category: "Career".to_string(),
            question: "When will my career rise?".to_string(),
            rule_ref: Some(format!("R-{}", id)),
            pdf_page: None,
            primary_pages: None,
            secondary_pages: None,
            keywords: Vec::new(),
            planets: Vec::new(),
            houses: Vec::new(),
            transits: Vec::new(),
        }
    }

    fn kb() -> KnowledgeBase {
        KnowledgeBase::from_chunks(vec![
            chunk(
                "chunk_1",
                Section::PlanetaryRules,
                &["saturn", "house 10"],
                "Saturn in the tenth house rewards patient effort.",
            ),
            chunk(
                "chunk_2",
                Section::Topics,
                &["topic", "aspect", "focus"],
                "Career growth depends on the tenth lord.",
            ),
            chunk(
                "chunk_3",
                Section::RelationshipRules,
                &["relationship", "marriage", "compatibility"],
                "Venus shapes marriage and harmony.",
            ),
        ])
    }

    #[test]
    fn test_weak_match_on_category_only() {
        let ctx = rule_context(&kb(), "Career", None, &RetrievalParams::default());
        assert!(ctx.rule.is_none());
        let ids: Vec<&str> = ctx.chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["chunk_2"]);
        assert_eq!(ctx.text, "Life Topics: Career growth depends on the tenth lord.");
    }

    #[test]
    fn test_strong_then_weak_without_dedup() {
        let mut r = rule("1");
        r.planets = vec!["Saturn".to_string()];
        let ctx = rule_context(&kb(), "Career", Some(&r), &RetrievalParams::default());
        let ids: Vec<&str> = ctx.chunks.iter().map(|c| c.id.as_str()).collect();
        // chunk_1 is strong (saturn) and weak (saturn is also a needle)
        assert_eq!(ids, vec!["chunk_1", "chunk_1", "chunk_2"]);
        assert_eq!(ctx.rule.as_ref().map(|r| r.id.as_str()), Some("1"));
    }

    #[test]
    fn test_weak_match_on_chunk_keyword() {
        let mut r = rule("2");
        r.keywords = vec!["Compatibility".to_string()];
        r.category = "Relationships".to_string();
        let ctx = rule_context(&kb(), "Relationships", Some(&r), &RetrievalParams::default());
        let ids: Vec<&str> = ctx.chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["chunk_3"]);
    }

    #[test]
    fn test_rule_context_budgets() {
        let chunks: Vec<KnowledgeChunk> = (1..=20)
            .map(|i| {
                chunk(
                    &format!("chunk_{}", i),
                    Section::Topics,
                    &["topic"],
                    &format!("career paragraph {} {}", i, "x".repeat(600)),
                )
            })
            .collect();
        let kb = KnowledgeBase::from_chunks(chunks);
        let ctx = rule_context(&kb, "career", None, &RetrievalParams::default());
        assert_eq!(ctx.chunks.len(), 12);
        assert_eq!(ctx.text.chars().count(), 5000);
    }

    #[test]
    fn test_normalize_and_expand_needles() {
        assert_eq!(normalize_needle("  Sun-in ARIES!! "), "sun in aries");
        assert_eq!(
            expand_needles(["10th house", "House", ""]),
            vec!["10th house", "10th", "house"]
        );
    }

    #[test]
    fn test_resolve_sections() {
        assert_eq!(resolve_sections(None), Section::ALL.to_vec());
        assert_eq!(
            resolve_sections(Some("transit_rules")),
            vec![Section::TransitRules]
        );
        assert_eq!(
            resolve_sections(Some("Marriage")),
            vec![Section::Topics, Section::RelationshipRules]
        );
        assert_eq!(resolve_sections(Some("zzz")), Section::ALL.to_vec());
    }

    #[test]
    fn test_search_by_keyword_and_category() {
        let kb = kb();
        let outcome = search(
            &kb,
            &SearchRequest {
                keywords: vec!["tenth".to_string()],
                ..Default::default()
            },
            4000,
        );
        let ids: Vec<&str> = outcome.chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["chunk_1", "chunk_2"]);

        let outcome = search(
            &kb,
            &SearchRequest {
                category: Some("relationship_rules".to_string()),
                ..Default::default()
            },
            4000,
        );
        assert_eq!(outcome.sections, vec![Section::RelationshipRules]);
        assert_eq!(outcome.chunks.len(), 1);

        let all = search(&kb, &SearchRequest::default(), 4000);
        assert_eq!(all.chunks.len(), 3);
        assert!(!all.text.contains('\n'));
        assert!(search(&kb, &SearchRequest::default(), 10).text.chars().count() <= 10);
    }

    #[test]
    fn test_rank_rule_chunks() {
        let kb = kb();
        let mut r = rule("3");
        r.planets = vec!["Saturn".to_string()];
        r.houses = vec!["10th".to_string()];
        assert_eq!(rule_score(&r, kb.get("chunk_1").unwrap()), 130);

        r.keywords = vec!["Marriage".to_string()];
        let ranked = rank_rule_chunks(&kb, &r, 8);
        let ids: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["chunk_1", "chunk_3"]);

        let nothing = rank_rule_chunks(&kb, &rule("4"), 2);
        assert_eq!(nothing.len(), 2);
        assert_eq!(nothing[0].id, "chunk_1");
    }
}
