//! The knowledge base: segmenter output grouped by section.
//!
//! Chunks are kept once, in document order. Each section holds indices into
//! that list, so a per-section view and the document-order view never drift.
//! All seven sections are always present, possibly empty.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::chunk::chunk_document;
use crate::models::{KnowledgeChunk, Section};
use crate::text::truncate_chars;

const PREVIEW_CHARS: usize = 80;
const PREVIEW_COUNT: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    chunks: Vec<KnowledgeChunk>,
    sections: BTreeMap<Section, Vec<usize>>,
}

impl KnowledgeBase {
    /// Segment `text` and group the result.
    pub fn from_text(text: &str) -> Self {
        let kb = Self::from_chunks(chunk_document(text));
        info!(
            chunks = kb.len(),
            planetary_rules = kb.count(Section::PlanetaryRules),
            combinations = kb.count(Section::Combinations),
            topics = kb.count(Section::Topics),
            two_planet_combinations = kb.count(Section::TwoPlanetCombinations),
            transit_rules = kb.count(Section::TransitRules),
            profession_rules = kb.count(Section::ProfessionRules),
            relationship_rules = kb.count(Section::RelationshipRules),
            "knowledge base built"
        );
        for chunk in kb.chunks.iter().take(PREVIEW_COUNT) {
            debug!(
                id = %chunk.id,
                section = %chunk.section,
                preview = %truncate_chars(&chunk.content, PREVIEW_CHARS),
                "chunk preview"
            );
        }
        kb
    }

    pub fn from_chunks(chunks: Vec<KnowledgeChunk>) -> Self {
        let mut sections: BTreeMap<Section, Vec<usize>> =
            Section::ALL.into_iter().map(|s| (s, Vec::new())).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            sections.entry(chunk.section).or_default().push(i);
        }
        Self { chunks, sections }
    }

    /// Chunks of one section, in document order.
    pub fn section(&self, section: Section) -> impl Iterator<Item = &KnowledgeChunk> + '_ {
        self.sections
            .get(&section)
            .into_iter()
            .flatten()
            .map(move |&i| &self.chunks[i])
    }

    /// Every chunk, in document order.
    pub fn iter(&self) -> std::slice::Iter<'_, KnowledgeChunk> {
        self.chunks.iter()
    }

    pub fn chunks(&self) -> &[KnowledgeChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&KnowledgeChunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    pub fn count(&self, section: Section) -> usize {
        self.sections.get(&section).map_or(0, Vec::len)
    }

    /// `(section, chunk count)` for all seven sections, in section order.
    pub fn section_counts(&self) -> Vec<(Section, usize)> {
        Section::ALL
            .into_iter()
            .map(|s| (s, self.count(s)))
            .collect()
    }

    /// SHA-256 over the chunk hashes in order. Identical input text gives an
    /// identical fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for chunk in &self.chunks {
            hasher.update(chunk.id.as_bytes());
            hasher.update(chunk.hash.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl<'a> IntoIterator for &'a KnowledgeBase {
    type Item = &'a KnowledgeChunk;
    type IntoIter = std::slice::Iter<'a, KnowledgeChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}
