use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::search::RetrievalParams;

/// Environment variable that replaces `sources.document`.
pub const DOCUMENT_ENV: &str = "ACTX_DOCUMENT";
/// Environment variable that replaces `sources.rules`.
pub const RULES_ENV: &str = "ACTX_RULES";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sources: SourcesConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    /// Reference document, `.pdf` or plain text.
    pub document: PathBuf,
    /// Tried in order when `document` does not exist.
    #[serde(default)]
    pub document_fallbacks: Vec<PathBuf>,
    /// JSON export of the rule sheet. Without it the rule store is empty.
    #[serde(default)]
    pub rules: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_context_chunks")]
    pub context_chunks: usize,
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
    #[serde(default = "default_search_chars")]
    pub search_chars: usize,
    #[serde(default = "default_placement_limit")]
    pub placement_limit: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default = "default_personality_chars")]
    pub personality_chars: usize,
    #[serde(default = "default_rule_limit")]
    pub rule_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            context_chunks: default_context_chunks(),
            context_chars: default_context_chars(),
            search_chars: default_search_chars(),
            placement_limit: default_placement_limit(),
            snippet_chars: default_snippet_chars(),
            personality_chars: default_personality_chars(),
            rule_limit: default_rule_limit(),
        }
    }
}

fn default_context_chunks() -> usize {
    12
}
fn default_context_chars() -> usize {
    5000
}
fn default_search_chars() -> usize {
    4000
}
fn default_placement_limit() -> usize {
    2
}
fn default_snippet_chars() -> usize {
    150
}
fn default_personality_chars() -> usize {
    1500
}
fn default_rule_limit() -> usize {
    8
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            context_chunks: self.context_chunks,
            context_chars: self.context_chars,
            search_chars: self.search_chars,
            placement_limit: self.placement_limit,
            snippet_chars: self.snippet_chars,
            personality_chars: self.personality_chars,
            rule_limit: self.rule_limit,
        }
    }
}

impl SourcesConfig {
    /// `document` followed by the fallbacks, in the order they are tried.
    pub fn document_candidates(&self) -> Vec<PathBuf> {
        std::iter::once(self.document.clone())
            .chain(self.document_fallbacks.iter().cloned())
            .collect()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Replace source paths from `lookup` (the process environment in
/// [`load_config`]). Empty values are ignored.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(document) = lookup(DOCUMENT_ENV).filter(|v| !v.trim().is_empty()) {
        config.sources.document = PathBuf::from(document);
    }
    if let Some(rules) = lookup(RULES_ENV).filter(|v| !v.trim().is_empty()) {
        config.sources.rules = Some(PathBuf::from(rules));
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.sources.document.as_os_str().is_empty() {
        anyhow::bail!("sources.document must not be empty");
    }

    let retrieval = &config.retrieval;
    for (name, value) in [
        ("context_chunks", retrieval.context_chunks),
        ("context_chars", retrieval.context_chars),
        ("search_chars", retrieval.search_chars),
        ("placement_limit", retrieval.placement_limit),
        ("snippet_chars", retrieval.snippet_chars),
        ("personality_chars", retrieval.personality_chars),
        ("rule_limit", retrieval.rule_limit),
    ] {
        if value == 0 {
            anyhow::bail!("retrieval.{} must be > 0", name);
        }
    }

    if retrieval.snippet_chars > retrieval.personality_chars {
        anyhow::bail!(
            "retrieval.snippet_chars ({}) must not exceed retrieval.personality_chars ({})",
            retrieval.snippet_chars,
            retrieval.personality_chars
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("actx.toml");
        fs::write(&path, content).unwrap();
        (tmp, path)
    }

    fn parse(content: &str) -> Config {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[sources]\ndocument = \"book.pdf\"\n");
        assert_eq!(config.retrieval.params(), RetrievalParams::default());
        assert!(config.sources.rules.is_none());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_candidates_in_order() {
        let config = parse(
            "[sources]\ndocument = \"a.pdf\"\ndocument_fallbacks = [\"data/a.pdf\", \"../a.pdf\"]\n",
        );
        assert_eq!(
            config.sources.document_candidates(),
            vec![
                PathBuf::from("a.pdf"),
                PathBuf::from("data/a.pdf"),
                PathBuf::from("../a.pdf")
            ]
        );
    }

    #[test]
    fn test_overrides_replace_paths() {
        let mut config = parse("[sources]\ndocument = \"a.pdf\"\nrules = \"r.json\"\n");
        apply_overrides(&mut config, |key| match key {
            DOCUMENT_ENV => Some("/srv/book.txt".to_string()),
            RULES_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.sources.document, PathBuf::from("/srv/book.txt"));
        assert_eq!(config.sources.rules, Some(PathBuf::from("r.json")));
    }

    #[test]
    fn test_snippet_larger_than_budget_rejected() {
        let config = parse(
            "[sources]\ndocument = \"a.pdf\"\n\n[retrieval]\nsnippet_chars = 2000\n",
        );
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("snippet_chars"));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let (_tmp, path) =
            write_config("[sources]\ndocument = \"a.pdf\"\n\n[retrieval]\ncontext_chunks = 0\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("retrieval.context_chunks"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/actx.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
