//! Knowledge base statistics.
//!
//! Gives a quick summary of what the segmenter produced: where the document
//! came from, how many chunks landed in each section, and how many rule
//! records were loaded. Used by `actx stats` to check that a new edition of
//! the reference text still segments the way it should.

use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;
use crate::engine::Engine;
use crate::knowledge::KnowledgeBase;

/// Run the stats command: build the knowledge base and rule store, then
/// print a summary.
pub async fn run_stats(config: &Config, engine: &Engine) -> Result<()> {
    let kb = engine.knowledge_base().await?;
    let rules = engine.rule_store().await?;

    let document = resolved_document(config);
    let size = document
        .as_ref()
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Astro Context - Knowledge Base Stats");
    println!("====================================");
    println!();
    match &document {
        Some(path) => println!("  Document:    {}", path.display()),
        None => println!("  Document:    (none)"),
    }
    println!("  Size:        {}", format_bytes(size));
    println!("  Fingerprint: {}", short_hash(&kb.fingerprint()));
    println!();
    println!("  Chunks:      {}", kb.len());
    println!("  Avg length:  {} chars", average_chars(&kb));
    println!("  Rules:       {}", rules.len());
    if !rules.is_empty() {
        println!("  Categories:  {}", rules.categories().join(", "));
    }

    println!();
    println!("  By section:");
    println!("  {:<26} {:<26} {:>6}", "SECTION", "LABEL", "CHUNKS");
    println!("  {}", "-".repeat(60));
    for (section, count) in kb.section_counts() {
        println!("  {:<26} {:<26} {:>6}", section.key(), section.label(), count);
    }
    println!();

    Ok(())
}

/// The document candidate the file source would read.
fn resolved_document(config: &Config) -> Option<PathBuf> {
    config
        .sources
        .document_candidates()
        .into_iter()
        .find(|p| p.is_file())
}

fn average_chars(kb: &KnowledgeBase) -> usize {
    if kb.is_empty() {
        return 0;
    }
    kb.iter().map(|c| c.content.chars().count()).sum::<usize>() / kb.len()
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
