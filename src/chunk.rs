//! Heuristic segmenter: reference text → ordered [`KnowledgeChunk`]s.
//!
//! The segmenter walks trimmed lines with one line of lookahead. Noise lines
//! (publisher boilerplate, decorative invocations) are dropped before the
//! walk, so they never contribute content and never act as lookahead.
//!
//! Two pure functions drive the walk:
//!
//! - [`classify_line`] decides what a line *is* (blank, heading, text).
//! - [`is_boundary`] decides whether a text line ends the chunk being built.
//!
//! # State machine
//!
//! ```text
//!                 heading / text
//! NoActiveChunk ─────────────────▶ BuildingChunk
//!       ▲                              │  heading → emit (>20), reopen
//!       │  blank before heading (>50)  │  boundary (>50) → emit
//!       └──────────────────────────────┤  >1000 chars → emit
//!                                      │  text → append
//! ```
//!
//! Each emitted chunk gets the next `chunk_{n}` id, its section label, a
//! normalized copy of the accumulated text, and a SHA-256 hash of that copy.

use sha2::{Digest, Sha256};

use crate::models::{KnowledgeChunk, Placement, Section};
use crate::patterns;
use crate::text::normalize_text;

/// Chunks closed by a heading, or at end of input, must exceed this many characters.
pub const HEADING_CLOSE_MIN_CHARS: usize = 20;
/// Chunks closed by a boundary heuristic must exceed this many characters.
pub const BOUNDARY_CLOSE_MIN_CHARS: usize = 50;
/// Chunks are force-closed once their raw content passes this size.
pub const MAX_CHUNK_CHARS: usize = 1000;

/// What a single trimmed line is, independent of its neighbours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    Blank,
    Noise,
    Heading(Placement),
    Text,
}

/// Classify one line.
pub fn classify_line(line: &str) -> LineClass {
    let line = line.trim();
    if line.is_empty() {
        LineClass::Blank
    } else if patterns::is_noise(line) {
        LineClass::Noise
    } else {
        match patterns::detect_heading(line) {
            Some(placement) => LineClass::Heading(placement),
            None => LineClass::Text,
        }
    }
}

fn is_heading(line: &str) -> bool {
    matches!(classify_line(line), LineClass::Heading(_))
}

fn starts_uppercase(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// A bullet or dash marker followed by whitespace.
pub fn starts_with_bullet(line: &str) -> bool {
    let mut chars = line.chars();
    matches!(chars.next(), Some('●' | '•' | '▪' | '◦' | '-' | '*'))
        && chars.next().is_some_and(char::is_whitespace)
}

/// `"Career:"`, `"Note -"`: a single capitalized word followed by `:` or `-`.
fn is_short_label(line: &str) -> bool {
    if line.chars().count() >= 30 {
        return false;
    }
    let mut chars = line.chars().peekable();
    if !chars.next().is_some_and(|c| c.is_ascii_uppercase()) {
        return false;
    }
    let mut lowercase = 0;
    while chars.peek().is_some_and(|c| c.is_ascii_lowercase()) {
        chars.next();
        lowercase += 1;
    }
    if lowercase == 0 {
        return false;
    }
    chars
        .find(|c| !c.is_whitespace())
        .is_some_and(|c| c == ':' || c == '-')
}

/// Whether `line` marks the end of the chunk being built, given the next line.
///
/// Boundaries are: a blank line before a capitalized heading, a bullet or
/// dash line, a line ending in `:` that names a planet or a house, a line
/// followed by a capitalized heading, or a short `"Word:"` label.
///
/// [`Segmenter`] only calls this for text lines. Blank lines are handled by
/// the segmenter itself, which closes on a blank line before any heading,
/// capitalized or not.
pub fn is_boundary(line: &str, next: Option<&str>) -> bool {
    let next_is_heading = next.is_some_and(|n| starts_uppercase(n) && is_heading(n));
    let line = line.trim();

    if line.is_empty() {
        return next_is_heading;
    }
    if starts_with_bullet(line) {
        return true;
    }
    if line.ends_with(':')
        && (patterns::planet_word(line).is_some() || patterns::mentions_house(line))
    {
        return true;
    }
    next_is_heading || is_short_label(line)
}

/// A chunk under construction.
struct OpenChunk {
    section: Section,
    placement: Option<Placement>,
    keywords: Vec<String>,
    content: String,
}

impl OpenChunk {
    fn from_heading(line: &str, placement: Placement) -> Self {
        Self {
            section: Section::PlanetaryRules,
            placement: Some(placement),
            keywords: placement.keywords(),
            content: format!("{}\n", line),
        }
    }

    fn from_text(line: &str) -> Self {
        let section = Section::detect(line);
        Self {
            section,
            placement: None,
            keywords: section.keywords().iter().map(|k| k.to_string()).collect(),
            content: format!("{}\n", line),
        }
    }

    fn push_line(&mut self, line: &str) {
        self.content.push_str(line);
        self.content.push('\n');
    }

    fn trimmed_chars(&self) -> usize {
        self.content.trim().chars().count()
    }

    fn raw_chars(&self) -> usize {
        self.content.chars().count()
    }
}

enum State {
    NoActiveChunk,
    BuildingChunk(OpenChunk),
}

/// Incremental segmenter. Feed lines with [`Segmenter::feed`], then call
/// [`Segmenter::finish`]. Most callers want [`chunk_document`].
pub struct Segmenter {
    state: State,
    chunks: Vec<KnowledgeChunk>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            state: State::NoActiveChunk,
            chunks: Vec::new(),
        }
    }

    /// Process one trimmed line; `next` is the following non-noise line.
    pub fn feed(&mut self, line: &str, next: Option<&str>) {
        let class = classify_line(line);
        let state = std::mem::replace(&mut self.state, State::NoActiveChunk);

        self.state = match state {
            State::NoActiveChunk => match class {
                LineClass::Blank | LineClass::Noise => State::NoActiveChunk,
                LineClass::Heading(placement) => {
                    State::BuildingChunk(OpenChunk::from_heading(line, placement))
                }
                LineClass::Text => State::BuildingChunk(OpenChunk::from_text(line)),
            },
            State::BuildingChunk(current) => self.advance(current, line, class, next),
        };
    }

    fn advance(
        &mut self,
        mut current: OpenChunk,
        line: &str,
        class: LineClass,
        next: Option<&str>,
    ) -> State {
        match class {
            LineClass::Heading(placement) => {
                self.emit(current, HEADING_CLOSE_MIN_CHARS);
                State::BuildingChunk(OpenChunk::from_heading(line, placement))
            }
            LineClass::Blank if next.is_some_and(is_heading) => {
                self.emit(current, BOUNDARY_CLOSE_MIN_CHARS);
                State::NoActiveChunk
            }
            LineClass::Blank | LineClass::Noise => State::BuildingChunk(current),
            LineClass::Text => {
                if current.trimmed_chars() > BOUNDARY_CLOSE_MIN_CHARS && is_boundary(line, next) {
                    self.emit(current, BOUNDARY_CLOSE_MIN_CHARS);
                    return State::NoActiveChunk;
                }
                current.push_line(line);
                if current.raw_chars() > MAX_CHUNK_CHARS {
                    self.emit(current, HEADING_CLOSE_MIN_CHARS);
                    State::NoActiveChunk
                } else {
                    State::BuildingChunk(current)
                }
            }
        }
    }

    /// Close any open chunk and return everything emitted, in document order.
    pub fn finish(mut self) -> Vec<KnowledgeChunk> {
        if let State::BuildingChunk(current) =
            std::mem::replace(&mut self.state, State::NoActiveChunk)
        {
            self.emit(current, HEADING_CLOSE_MIN_CHARS);
        }
        self.chunks
    }

    fn emit(&mut self, chunk: OpenChunk, min_chars: usize) {
        let content = normalize_text(&chunk.content);
        if content.chars().count() <= min_chars {
            return;
        }
        let index = self.chunks.len() + 1;
        self.chunks.push(make_chunk(index, chunk, content));
    }
}

fn make_chunk(index: usize, chunk: OpenChunk, content: String) -> KnowledgeChunk {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    KnowledgeChunk {
        id: format!("chunk_{}", index),
        section: chunk.section,
        label: chunk.section.label(),
        content,
        keywords: chunk.keywords,
        placement: chunk.placement,
        hash,
    }
}

/// Segment a whole document.
pub fn chunk_document(text: &str) -> Vec<KnowledgeChunk> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| line.is_empty() || !patterns::is_noise(line))
        .collect();

    let mut segmenter = Segmenter::new();
    for (i, line) in lines.iter().enumerate() {
        segmenter.feed(line, lines.get(i + 1).copied());
    }
    segmenter.finish()
}
