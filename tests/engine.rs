use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use astro_context::garbage::GarbageFilter;
use astro_context::knowledge::KnowledgeBase;
use astro_context::models::{KnowledgeChunk, Placement, RuleRecord, Section};
use astro_context::patterns::{Planet, Sign};
use astro_context::placement::{select_chunks, PlacementQuery};
use astro_context::search::{RetrievalParams, SearchRequest};
use astro_context::sources::{RuleSource, StaticRules, StaticText, TextSource};
use astro_context::{Engine, Error};

const PROSE: &str = "The native is energetic and proud, eager to lead, quick to defend friends, \
                     and fond of public recognition for honest effort.";

fn engine(text: &str) -> Engine {
    Engine::new(
        Arc::new(StaticText(text.to_string())),
        Arc::new(StaticRules::default()),
    )
}

fn engine_with_rules(text: &str, rules: Vec<RuleRecord>) -> Engine {
    Engine::new(Arc::new(StaticText(text.to_string())), Arc::new(StaticRules(rules)))
}

fn rule(id: &str, rule_ref: &str) -> RuleRecord {
    RuleRecord {
        id: id.to_string(),
        category: "Career".to_string(),
        question: "When will my career rise?".to_string(),
        rule_ref: Some(rule_ref.to_string()),
        pdf_page: None,
        primary_pages: None,
        secondary_pages: None,
        keywords: Vec::new(),
        planets: Vec::new(),
        houses: Vec::new(),
        transits: Vec::new(),
    }
}

/// A text source that counts loads and can fail the first N of them.
struct FlakySource {
    text: String,
    failures: usize,
    loads: AtomicUsize,
}

#[async_trait]
impl TextSource for FlakySource {
    fn name(&self) -> &str {
        "document"
    }

    async fn load_text(&self) -> astro_context::Result<String> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if attempt < self.failures {
            return Err(Error::unavailable("document", "disk went away"));
        }
        Ok(self.text.clone())
    }
}

struct CountingRules {
    loads: AtomicUsize,
}

#[async_trait]
impl RuleSource for CountingRules {
    fn name(&self) -> &str {
        "rules"
    }

    async fn load_rules(&self) -> astro_context::Result<Vec<RuleRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(vec![rule("1", "R-1")])
    }
}

#[tokio::test]
async fn test_mars_and_venus_segment_into_two_chunks() {
    let text = format!("\nMars in Leo\n{}\n\nVenus in Libra\n{}\n", PROSE, PROSE);
    assert!(PROSE.len() >= 120);

    let kb = engine(&text).knowledge_base().await.unwrap();
    assert_eq!(kb.len(), 2);

    let first = &kb.chunks()[0];
    assert_eq!(first.placement.map(|p| p.planet), Some(Planet::Mars));
    assert_eq!(first.placement.and_then(|p| p.sign), Some(Sign::Leo));
    assert!(first.keywords.contains(&"mars".to_string()));
    assert!(first.keywords.contains(&"sign leo".to_string()));

    let second = &kb.chunks()[1];
    assert_eq!(second.placement.map(|p| p.planet), Some(Planet::Venus));
    assert!(second.keywords.contains(&"sign libra".to_string()));
}

#[tokio::test]
async fn test_build_is_idempotent_and_normalized() {
    let text = format!(
        "Saturn in Capricorn\n●  steady — patient\n{}\n\nMoon in Cancer\n•  {}\n\n\nCareer and work\n{}",
        PROSE, PROSE, PROSE
    );
    let a = KnowledgeBase::from_text(&text);
    let b = KnowledgeBase::from_text(&text);
    assert_eq!(a.chunks(), b.chunks());
    assert!(!a.is_empty());
    for chunk in a.iter() {
        assert!(chunk.content.trim().chars().count() > 20);
        assert!(!chunk.content.contains('●'));
        assert!(!chunk.content.contains('•'));
        assert!(!chunk.content.contains('—'));
        assert!(!chunk.content.contains("  "));
    }
}

#[tokio::test]
async fn test_full_placement_match_ranks_first() {
    let text = format!(
        "Sun in Leo\n{}\n\nSun in Aries in the 5th house\n{}\n",
        PROSE, PROSE
    );
    let engine = engine(&text);
    let kb = engine.knowledge_base().await.unwrap();
    let aries = kb
        .iter()
        .find(|c| c.keywords == vec!["sun", "sign aries", "house 5"])
        .unwrap();
    let query = PlacementQuery::new("sun", Some("aries"), Some(5)).unwrap();
    assert_eq!(astro_context::placement::score_chunk(aries, &query), 180);

    let chunks = engine
        .resolve_placement_context("sun", Some("aries"), Some(5))
        .await
        .unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].id, aries.id);
}

#[tokio::test]
async fn test_sign_synonym_matches() {
    let text = format!("Sun in Aries\n{}\n", PROSE);
    let chunks = engine(&text)
        .resolve_placement_context("Surya", Some("mesha"), None)
        .await
        .unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].keywords.contains(&"sign aries".to_string()));
}

#[tokio::test]
async fn test_index_line_never_returned() {
    let text = format!("Jupiter in Pisces\n{}\n\nSaturn ............... 81", PROSE);
    let engine = engine(&text);
    let kb = engine.knowledge_base().await.unwrap();
    assert!(kb.iter().any(|c| c.content.starts_with("Saturn ....")));

    let chunks = engine.resolve_placement_context("saturn", None, None).await.unwrap();
    assert!(chunks.is_empty());

    // also as a hand-built chunk tagged exactly like a placement heading
    let garbage = KnowledgeChunk {
        id: "chunk_1".to_string(),
        section: Section::PlanetaryRules,
        label: Section::PlanetaryRules.label(),
        content: "Saturn .......... 81".to_string(),
        keywords: vec!["saturn".to_string()],
        placement: None,
        hash: String::new(),
    };
    let kb = KnowledgeBase::from_chunks(vec![garbage]);
    let query = PlacementQuery::new("saturn", None, None).unwrap();
    assert!(select_chunks(&kb, &query, 2, &GarbageFilter::default()).is_empty());
}

#[tokio::test]
async fn test_empty_entity_yields_nothing() {
    let text = format!("Sun in Aries\n{}\n", PROSE);
    let chunks = engine(&text)
        .resolve_placement_context("  ", Some("aries"), Some(1))
        .await
        .unwrap();
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn test_career_weak_match() {
    let text = "Career prospects\nSteady career growth follows patient effort and study.\n";
    let engine = engine(text);
    let kb = engine.knowledge_base().await.unwrap();
    assert_eq!(kb.count(Section::Topics), 1);

    let context = engine.resolve_context("Career", None).await.unwrap();
    assert!(context.rule.is_none());
    assert_eq!(context.chunks.len(), 1);
    assert_eq!(context.chunks[0].label, "Life Topics");
    assert!(context.text.starts_with("Life Topics: Career prospects"));
}

#[tokio::test]
async fn test_rule_reference_drives_strong_matches() {
    let text = format!(
        "Saturn in Capricorn\n{}\nRemedies:\nCareer prospects\nSteady career growth follows patient effort and study.\n",
        PROSE
    );
    let mut r = rule("7", "R-7");
    r.planets = vec!["Saturn".to_string()];
    let engine = engine_with_rules(&text, vec![r]);

    let context = engine.resolve_context("Career", Some("r-7")).await.unwrap();
    assert_eq!(context.rule.as_ref().map(|r| r.id.as_str()), Some("7"));
    let ids: Vec<&str> = context.chunks.iter().map(|c| c.id.as_str()).collect();
    // strong: saturn chunk; weak: saturn chunk again, then the career chunk
    assert_eq!(ids, vec!["chunk_1", "chunk_1", "chunk_2"]);
}

#[tokio::test]
async fn test_truncation_is_exact_and_char_safe() {
    let line = "career सूर्य मेष राशि में बलवान होता है and brings recognition at work";
    let text = (0..30)
        .map(|i| format!("Remedies:\n{} {}", line, i))
        .collect::<Vec<_>>()
        .join("\n");
    let params = RetrievalParams {
        context_chars: 333,
        ..RetrievalParams::default()
    };
    let engine = engine(&text).with_params(params);
    let context = engine.resolve_context("career", None).await.unwrap();
    assert!(context.chunks.len() <= 12);
    assert_eq!(context.text.chars().count(), 333);

    let outcome = engine
        .search(&SearchRequest {
            keywords: vec!["career".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(outcome.text.chars().count() <= 4000);
}

#[tokio::test]
async fn test_personality_context_bounded() {
    let text = format!(
        "Sun in Aries\n{}\n\nMoon in Cancer\n{}\n\nMars in Leo\n{}\n",
        PROSE.repeat(3),
        PROSE.repeat(3),
        PROSE.repeat(3)
    );
    let placements = [
        Placement {
            planet: Planet::Sun,
            sign: Some(Sign::Aries),
            house: None,
        },
        Placement {
            planet: Planet::Moon,
            sign: Some(Sign::Cancer),
            house: Some(4),
        },
    ];
    let engine = engine(&text);
    let context = engine.build_personality_context(&placements).await.unwrap();
    assert!(context.chars().count() <= 1500);
    let parts: Vec<&str> = context.split("\n\n").collect();
    assert_eq!(parts.len(), 2);
    assert!(parts[0].starts_with("Planetary Rules: Sun in Aries"));
    assert!(parts[1].starts_with("Planetary Rules: Moon in Cancer"));

    let tight = engine.with_params(RetrievalParams {
        personality_chars: 200,
        ..RetrievalParams::default()
    });
    let context = tight.build_personality_context(&placements).await.unwrap();
    assert_eq!(context.chars().count(), 200);
}

#[tokio::test]
async fn test_concurrent_callers_load_document_once() {
    let source = Arc::new(FlakySource {
        text: format!("Sun in Aries\n{}\n", PROSE),
        failures: 0,
        loads: AtomicUsize::new(0),
    });
    let engine = Engine::new(source.clone(), Arc::new(StaticRules::default()));

    let calls = (0..10).map(|_| engine.resolve_placement_context("sun", Some("aries"), None));
    let results = futures::future::join_all(calls).await;
    assert!(results.iter().all(|r| r.as_ref().map(Vec::len).unwrap_or(0) == 1));
    assert_eq!(source.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_load_surfaces_then_retries() {
    let source = Arc::new(FlakySource {
        text: format!("Sun in Aries\n{}\n", PROSE),
        failures: 1,
        loads: AtomicUsize::new(0),
    });
    let engine = Engine::new(source.clone(), Arc::new(StaticRules::default()));

    let (a, b) = tokio::join!(engine.knowledge_base(), engine.knowledge_base());
    let expected = Error::unavailable("document", "disk went away");
    assert_eq!(a.unwrap_err(), expected);
    assert_eq!(b.unwrap_err(), expected);

    let kb = engine.knowledge_base().await.unwrap();
    assert_eq!(kb.len(), 1);
    assert_eq!(source.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rule_store_loaded_only_when_needed() {
    let rules = Arc::new(CountingRules {
        loads: AtomicUsize::new(0),
    });
    let text = format!("Sun in Aries\n{}\n", PROSE);
    let mut engine = Engine::new(Arc::new(StaticText(text)), rules.clone());

    engine.resolve_context("Career", None).await.unwrap();
    engine.resolve_placement_context("sun", None, None).await.unwrap();
    assert_eq!(rules.loads.load(Ordering::SeqCst), 0);

    engine.resolve_context("Career", Some("R-1")).await.unwrap();
    assert_eq!(engine.category_questions("career").await.unwrap().len(), 1);
    assert_eq!(rules.loads.load(Ordering::SeqCst), 1);

    engine.reset();
    assert!(engine.find_rule_by_id("1").await.unwrap().is_some());
    assert_eq!(rules.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rank_rule_chunks_through_engine() {
    let text = format!(
        "Saturn in the 10th house\n{}\n\nVenus in Libra\n{}\n",
        PROSE, PROSE
    );
    let mut r = rule("3", "R-3");
    r.planets = vec!["Saturn".to_string()];
    r.houses = vec!["10th".to_string()];
    let engine = engine_with_rules(&text, vec![r]);

    let ranked = engine.rank_rule_chunks("3", None).await.unwrap();
    assert_eq!(ranked[0].keywords, vec!["saturn", "house 10"]);
    assert!(engine.rank_rule_chunks("missing", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_document_is_an_error_not_an_empty_base() {
    let err = engine("   \n").knowledge_base().await.unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable { .. }));
}
