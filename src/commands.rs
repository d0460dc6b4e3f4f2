//! CLI entry points for the `actx` subcommands.
//!
//! Each `run_*` function calls one [`Engine`] operation and prints the result
//! to stdout, either as plain text or, with `--json`, as pretty JSON.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::Engine;
use crate::models::{KnowledgeChunk, Placement, RuleRecord, Section};
use crate::patterns::{Planet, Sign};
use crate::search::SearchRequest;
use crate::text::truncate_chars;

const PREVIEW_CHARS: usize = 160;

/// A chart as supplied to `actx personality --profile`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
    pub planets: Vec<Placement>,
}

pub fn load_profile(path: &Path) -> Result<Profile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse profile: {}", path.display()))
}

/// Parse `planet[:sign[:house]]`, e.g. `sun:aries:5`, `moon::4`, `kuja`.
pub fn parse_placement(spec: &str) -> Result<Placement> {
    let mut parts = spec.split(':').map(str::trim);
    let planet: Planet = parts.next().unwrap_or_default().parse()?;
    let sign = match parts.next().filter(|s| !s.is_empty()) {
        Some(s) => Some(s.parse::<Sign>()?),
        None => None,
    };
    let house = match parts.next().filter(|s| !s.is_empty()) {
        Some(h) => {
            let house: u8 = h
                .parse()
                .with_context(|| format!("invalid house '{}' in '{}'", h, spec))?;
            if !(1..=12).contains(&house) {
                bail!("house must be 1-12, got {} in '{}'", house, spec);
            }
            Some(house)
        }
        None => None,
    };
    if parts.next().is_some() {
        bail!("expected planet[:sign[:house]], got '{}'", spec);
    }
    Ok(Placement {
        planet,
        sign,
        house,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_chunks(chunks: &[KnowledgeChunk]) {
    for chunk in chunks {
        println!("[{}] {} ({})", chunk.id, chunk.label, chunk.keywords.join(", "));
        println!("    {}", truncate_chars(&chunk.content, PREVIEW_CHARS));
    }
}

fn print_rule(rule: &RuleRecord) {
    println!("--- Rule ---");
    println!("id:        {}", rule.id);
    println!("category:  {}", rule.category);
    println!("question:  {}", rule.question);
    if let Some(ref r) = rule.rule_ref {
        println!("rule_ref:  {}", r);
    }
    if !rule.planets.is_empty() {
        println!("planets:   {}", rule.planets.join(", "));
    }
    if !rule.houses.is_empty() {
        println!("houses:    {}", rule.houses.join(", "));
    }
    if !rule.transits.is_empty() {
        println!("transits:  {}", rule.transits.join(", "));
    }
    if !rule.keywords.is_empty() {
        println!("keywords:  {}", rule.keywords.join(", "));
    }
    println!();
}

pub async fn run_chunks(engine: &Engine, section: Option<&str>, json: bool) -> Result<()> {
    let kb = engine.knowledge_base().await?;
    let chunks: Vec<KnowledgeChunk> = match section {
        Some(key) => {
            let Some(section) = Section::from_key(key) else {
                let known: Vec<&str> = Section::ALL.iter().map(|s| s.key()).collect();
                bail!("Unknown section: {}. Use one of: {}", key, known.join(", "));
            };
            kb.section(section).cloned().collect()
        }
        None => kb.iter().cloned().collect(),
    };

    if json {
        return print_json(&chunks);
    }
    if chunks.is_empty() {
        println!("No chunks.");
        return Ok(());
    }
    print_chunks(&chunks);
    Ok(())
}

pub async fn run_context(
    engine: &Engine,
    category: &str,
    rule_ref: Option<&str>,
    json: bool,
) -> Result<()> {
    let context = engine.resolve_context(category, rule_ref).await?;
    if json {
        return print_json(&context);
    }

    if let Some(ref rule) = context.rule {
        print_rule(rule);
    } else if let Some(r) = rule_ref {
        println!("No rule record for reference '{}'.", r);
        println!();
    }

    if context.chunks.is_empty() {
        println!("No results.");
        return Ok(());
    }
    println!("--- Chunks ({}) ---", context.chunks.len());
    print_chunks(&context.chunks);
    println!();
    println!("--- Context ({} chars) ---", context.text.chars().count());
    println!("{}", context.text);
    Ok(())
}

pub async fn run_placement(
    engine: &Engine,
    planet: &str,
    sign: Option<&str>,
    house: Option<u8>,
    json: bool,
) -> Result<()> {
    let chunks = engine.resolve_placement_context(planet, sign, house).await?;
    if json {
        return print_json(&chunks);
    }
    if chunks.is_empty() {
        println!("No results.");
        return Ok(());
    }
    print_chunks(&chunks);
    Ok(())
}

pub async fn run_personality(
    engine: &Engine,
    specs: &[String],
    profile: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut placements = match profile {
        Some(path) => load_profile(path)?.planets,
        None => Vec::new(),
    };
    for spec in specs {
        placements.push(parse_placement(spec)?);
    }
    if placements.is_empty() {
        bail!("No placements given. Pass planet:sign:house arguments or --profile <json>.");
    }

    let text = engine.build_personality_context(&placements).await?;
    if json {
        return print_json(&serde_json::json!({
            "placements": placements,
            "text": text,
        }));
    }
    if text.is_empty() {
        println!("No results.");
    } else {
        println!("{}", text);
    }
    Ok(())
}

pub async fn run_questions(engine: &Engine, category: Option<&str>, json: bool) -> Result<()> {
    let records = engine.category_questions(category.unwrap_or_default()).await?;
    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No questions.");
        return Ok(());
    }
    for record in &records {
        println!("{:>5}  [{}] {}", record.id, record.category, record.question);
    }
    Ok(())
}

pub async fn run_search(engine: &Engine, request: &SearchRequest, json: bool) -> Result<()> {
    let outcome = engine.search(request).await?;
    if json {
        return print_json(&outcome);
    }
    let sections: Vec<&str> = outcome.sections.iter().map(|s| s.key()).collect();
    println!("sections: {}", sections.join(", "));
    if outcome.chunks.is_empty() {
        println!("No results.");
        return Ok(());
    }
    println!("--- Chunks ({}) ---", outcome.chunks.len());
    print_chunks(&outcome.chunks);
    println!();
    println!("--- Context ({} chars) ---", outcome.text.chars().count());
    println!("{}", outcome.text);
    Ok(())
}

pub async fn run_rule(engine: &Engine, id: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let Some(rule) = engine.find_rule_by_id(id).await? else {
        bail!("rule not found: {}", id);
    };
    let chunks = engine.rank_rule_chunks(id, limit).await?;
    if json {
        return print_json(&serde_json::json!({
            "rule": rule,
            "chunks": chunks,
        }));
    }
    print_rule(&rule);
    println!("--- Chunks ({}) ---", chunks.len());
    print_chunks(&chunks);
    Ok(())
}
