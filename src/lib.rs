//! # Astro Context
//!
//! A deterministic compiler from a reference text to a labeled knowledge base,
//! and a retrieval engine that selects bounded context from it.
//!
//! The reference text (an astrology handbook, extracted from PDF) is split
//! into chunks by heuristic heading and boundary detection. Each chunk gets a
//! section, a label, and keywords seeded from the placement its heading named.
//! Retrieval then answers three kinds of request:
//!
//! - a category question, optionally tied to a rule record from the rule sheet;
//! - a single planet placement (planet, sign, house);
//! - a whole chart, condensed into one bounded personality context.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌────────────────┐
//! │ TextSource │──▶│ Segmenter │──▶│ KnowledgeBase  │──┐
//! │ (PDF/txt)  │   │  (chunk)  │   │ (cached once)  │  │   ┌───────────┐
//! └────────────┘   └───────────┘   └────────────────┘  ├──▶│ Retrieval │──▶ context
//! ┌────────────┐                   ┌────────────────┐  │   └───────────┘
//! │ RuleSource │──────────────────▶│   RuleStore    │──┘
//! │   (JSON)   │                   │ (cached once)  │
//! └────────────┘                   └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! actx stats                               # segment the document, show counts
//! actx placement sun --sign aries --house 5
//! actx personality sun:aries:5 moon:cancer:4
//! actx context Career --rule-ref R-12
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`patterns`] | Planet, sign, house and noise recognizers; heading matcher chain |
//! | [`chunk`] | Line classification, boundary detection, segmenter state machine |
//! | [`knowledge`] | Chunks grouped by section |
//! | [`rules`] | Rule row normalization and the rule store |
//! | [`placement`] | Placement scoring and personality context |
//! | [`garbage`] | Named predicates rejecting index lines and other debris |
//! | [`search`] | Rule-record retrieval, keyword search, rule ranking |
//! | [`cache`] | Build-once cache with a shared in-flight build |
//! | [`sources`] | Document and rule sources |
//! | [`engine`] | Facade owning the caches |
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Library error type |

pub mod cache;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod garbage;
pub mod knowledge;
pub mod models;
pub mod patterns;
pub mod placement;
pub mod rules;
pub mod search;
pub mod sources;
pub mod stats;
pub mod text;

pub use engine::Engine;
pub use error::{Error, Result};
