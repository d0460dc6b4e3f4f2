//! Input sources for the engine.
//!
//! The engine never reads files itself. It asks a [`TextSource`] for the full
//! reference text and a [`RuleSource`] for the rule records, once each, from
//! inside its build-once caches. Both traits are async so that the file
//! implementations can move blocking work (PDF extraction) off the runtime.
//!
//! # Provided implementations
//!
//! | Source | Produces |
//! |--------|----------|
//! | [`FileTextSource`] | first existing path among candidates; `.pdf` is run through text extraction, anything else is read as UTF-8 |
//! | [`StaticText`] | an in-memory string |
//! | [`JsonRuleSource`] | a JSON array of spreadsheet rows, normalized by [`crate::rules::records_from_rows`] |
//! | [`StaticRules`] | an in-memory record list |

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::RuleRecord;
use crate::rules::records_from_rows;

// ═══════════════════════════════════════════════════════════════════════
// Traits
// ═══════════════════════════════════════════════════════════════════════

/// Supplies the extracted text of the reference document.
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Short label used in errors and logs (e.g. `"document"`).
    fn name(&self) -> &str;

    /// Load the whole document as one string.
    ///
    /// An empty or whitespace-only document is an error: an empty knowledge
    /// base would silently turn every lookup into a miss.
    async fn load_text(&self) -> Result<String>;
}

/// Supplies the flat list of rule records.
#[async_trait]
pub trait RuleSource: Send + Sync {
    fn name(&self) -> &str;

    async fn load_rules(&self) -> Result<Vec<RuleRecord>>;
}

// ═══════════════════════════════════════════════════════════════════════
// Document text
// ═══════════════════════════════════════════════════════════════════════

/// Reads the first candidate path that exists.
#[derive(Debug, Clone)]
pub struct FileTextSource {
    candidates: Vec<PathBuf>,
}

impl FileTextSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            candidates: vec![path.into()],
        }
    }

    /// Try each path in order; the first that exists is used.
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    fn resolve(&self) -> Result<&Path> {
        for path in &self.candidates {
            if path.is_file() {
                return Ok(path);
            }
            debug!(path = %path.display(), "document candidate not found");
        }
        let tried = self
            .candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::unavailable(
            self.name(),
            format!("no document found (tried: {})", tried),
        ))
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

#[async_trait]
impl TextSource for FileTextSource {
    fn name(&self) -> &str {
        "document"
    }

    async fn load_text(&self) -> Result<String> {
        let path = self.resolve()?.to_path_buf();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::unavailable(self.name(), format!("{}: {}", path.display(), e)))?;

        let text = if is_pdf(&path) {
            let name = self.name().to_string();
            tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem(&bytes)
                    .map_err(|e| Error::unavailable(name, format!("PDF extraction failed: {}", e)))
            })
            .await
            .map_err(|e| Error::unavailable(self.name(), e))??
        } else {
            String::from_utf8(bytes).map_err(|e| {
                Error::invalid(self.name(), format!("{}: {}", path.display(), e))
            })?
        };

        if text.trim().is_empty() {
            warn!(path = %path.display(), "document contains no text");
            return Err(Error::unavailable(
                self.name(),
                format!("{} contains no text", path.display()),
            ));
        }
        info!(path = %path.display(), chars = text.chars().count(), "document loaded");
        Ok(text)
    }
}

/// In-memory document text.
#[derive(Debug, Clone)]
pub struct StaticText(pub String);

#[async_trait]
impl TextSource for StaticText {
    fn name(&self) -> &str {
        "document"
    }

    async fn load_text(&self) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(Error::unavailable(self.name(), "document is empty"));
        }
        Ok(self.0.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Rule records
// ═══════════════════════════════════════════════════════════════════════

/// A JSON export of the rule sheet: an array of row objects keyed by
/// column header.
#[derive(Debug, Clone)]
pub struct JsonRuleSource {
    path: PathBuf,
}

impl JsonRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RuleSource for JsonRuleSource {
    fn name(&self) -> &str {
        "rules"
    }

    async fn load_rules(&self) -> Result<Vec<RuleRecord>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::unavailable(self.name(), format!("{}: {}", self.path.display(), e))
        })?;
        let value: Value = serde_json::from_str(&raw).map_err(|e| {
            Error::invalid(self.name(), format!("{}: {}", self.path.display(), e))
        })?;
        let rows = value
            .as_array()
            .ok_or_else(|| Error::invalid(self.name(), "expected a JSON array of rows"))?;

        let rows: Vec<_> = rows.iter().filter_map(Value::as_object).cloned().collect();
        let records = records_from_rows(&rows);
        info!(path = %self.path.display(), rows = rows.len(), records = records.len(), "rules loaded");
        Ok(records)
    }
}

/// In-memory rule records.
#[derive(Debug, Clone, Default)]
pub struct StaticRules(pub Vec<RuleRecord>);

#[async_trait]
impl RuleSource for StaticRules {
    fn name(&self) -> &str {
        "rules"
    }

    async fn load_rules(&self) -> Result<Vec<RuleRecord>> {
        Ok(self.0.clone())
    }
}
