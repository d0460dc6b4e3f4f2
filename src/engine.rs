//! Engine facade: the two build-once caches plus every retrieval call.
//!
//! ```text
//! TextSource ──▶ Cache<KnowledgeBase> ──┐
//!                                       ├──▶ resolve_context / placement / search
//! RuleSource ──▶ Cache<RuleStore> ──────┘
//! ```
//!
//! Nothing is loaded on construction. The knowledge base is built on the
//! first call that needs it, the rule store on the first call that needs a
//! record. Retrieval calls take `&self` and may run concurrently; only
//! [`Engine::reset`] needs exclusive access.

use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::Cache;
use crate::config::Config;
use crate::error::Result;
use crate::garbage::GarbageFilter;
use crate::knowledge::KnowledgeBase;
use crate::models::{KnowledgeChunk, Placement, RuleRecord};
use crate::placement::{personality_context, select_chunks, PlacementQuery};
use crate::rules::RuleStore;
use crate::search::{self, RetrievalParams, RuleContext, SearchOutcome, SearchRequest};
use crate::sources::{FileTextSource, JsonRuleSource, RuleSource, StaticRules, TextSource};

pub struct Engine {
    knowledge: Cache<KnowledgeBase>,
    rules: Cache<RuleStore>,
    params: RetrievalParams,
    garbage: GarbageFilter,
}

impl Engine {
    pub fn new(text: Arc<dyn TextSource>, rules: Arc<dyn RuleSource>) -> Self {
        let knowledge = Cache::new("knowledge_base", move || {
            let text = Arc::clone(&text);
            async move {
                let raw = text.load_text().await?;
                Ok(KnowledgeBase::from_text(&raw))
            }
        });
        let rules = Cache::new("rule_store", move || {
            let rules = Arc::clone(&rules);
            async move {
                let records = rules.load_rules().await?;
                info!(records = records.len(), "rule store built");
                Ok(RuleStore::new(records))
            }
        });
        Self {
            knowledge,
            rules,
            params: RetrievalParams::default(),
            garbage: GarbageFilter::default(),
        }
    }

    /// File-backed engine: the configured document (and its fallbacks) and
    /// the rule JSON when one is configured.
    pub fn from_config(config: &Config) -> Self {
        let text: Arc<dyn TextSource> = Arc::new(FileTextSource::with_candidates(
            config.sources.document_candidates(),
        ));
        let rules: Arc<dyn RuleSource> = match &config.sources.rules {
            Some(path) => Arc::new(JsonRuleSource::new(path)),
            None => Arc::new(StaticRules::default()),
        };
        Self::new(text, rules).with_params(config.retrieval.params())
    }

    pub fn with_params(mut self, params: RetrievalParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_garbage_filter(mut self, garbage: GarbageFilter) -> Self {
        self.garbage = garbage;
        self
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    pub async fn knowledge_base(&self) -> Result<Arc<KnowledgeBase>> {
        self.knowledge.get().await
    }

    pub async fn rule_store(&self) -> Result<Arc<RuleStore>> {
        self.rules.get().await
    }

    /// Context for a category question. The rule store is only consulted
    /// when a non-empty reference is given.
    pub async fn resolve_context(&self, category: &str, rule_ref: Option<&str>) -> Result<RuleContext> {
        let store = match rule_ref.filter(|r| !r.trim().is_empty()) {
            Some(_) => Some(self.rule_store().await?),
            None => None,
        };
        let rule = store
            .as_deref()
            .zip(rule_ref)
            .and_then(|(store, r)| store.find_by_ref(r));
        if rule_ref.is_some() && rule.is_none() {
            debug!(rule_ref = ?rule_ref, "no rule record for reference");
        }

        let kb = self.knowledge_base().await?;
        let context = search::rule_context(&kb, category, rule, &self.params);
        debug!(
            category,
            chunks = context.chunks.len(),
            chars = context.text.chars().count(),
            "rule context resolved"
        );
        Ok(context)
    }

    /// Chunks interpreting one placement. An empty entity yields nothing.
    pub async fn resolve_placement_context(
        &self,
        entity: &str,
        sign: Option<&str>,
        house: Option<u8>,
    ) -> Result<Vec<KnowledgeChunk>> {
        let Some(query) = PlacementQuery::new(entity, sign, house) else {
            return Ok(Vec::new());
        };
        let kb = self.knowledge_base().await?;
        Ok(select_chunks(
            &kb,
            &query,
            self.params.placement_limit,
            &self.garbage,
        ))
    }

    /// Snippets for a whole chart, bounded by `personality_chars`.
    pub async fn build_personality_context(&self, placements: &[Placement]) -> Result<String> {
        let kb = self.knowledge_base().await?;
        let text = personality_context(
            &kb,
            placements,
            self.params.placement_limit,
            self.params.snippet_chars,
            self.params.personality_chars,
            &self.garbage,
        );
        debug!(
            placements = placements.len(),
            chars = text.chars().count(),
            "personality context built"
        );
        Ok(text)
    }

    pub async fn category_questions(&self, category: &str) -> Result<Vec<RuleRecord>> {
        Ok(self.rule_store().await?.by_category(category))
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        let kb = self.knowledge_base().await?;
        Ok(search::search(&kb, request, self.params.search_chars))
    }

    /// Best chunks for the rule with `rule_id`; empty when no such rule.
    pub async fn rank_rule_chunks(
        &self,
        rule_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<KnowledgeChunk>> {
        let store = self.rule_store().await?;
        let Some(rule) = store.find_by_id(rule_id) else {
            debug!(rule_id, "no rule record for id");
            return Ok(Vec::new());
        };
        let kb = self.knowledge_base().await?;
        Ok(search::rank_rule_chunks(
            &kb,
            rule,
            limit.unwrap_or(self.params.rule_limit),
        ))
    }

    pub async fn find_rule_by_id(&self, rule_id: &str) -> Result<Option<RuleRecord>> {
        Ok(self.rule_store().await?.find_by_id(rule_id).cloned())
    }

    /// Drop both cached values; the next call rebuilds from the sources.
    pub fn reset(&mut self) {
        self.knowledge.reset();
        self.rules.reset();
    }
}
