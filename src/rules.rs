//! Rule records: row normalization and the in-memory rule store.
//!
//! Rule rows arrive as loosely-typed maps keyed by whatever header the sheet
//! used. [`records_from_rows`] maps the known header aliases onto
//! [`RuleRecord`] fields, splits list cells, and settles the category.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::models::RuleRecord;

/// A JSON object standing in for one spreadsheet row.
pub type Row = Map<String, Value>;

static LIST_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;/&]+").expect("valid pattern"));

const ID: &[&str] = &["id", "ID", "q_no.", "q_no"];
const QUESTION: &[&str] = &["question", "Question", "Question Text", "q"];
const RULE_REF: &[&str] = &["rule_ref", "ruleRef", "Rule", "rule"];
const PDF_PAGE: &[&str] = &["pdf_page", "Page", "primary_pages"];
const PRIMARY_PAGES: &[&str] = &["primary_pages", "PrimaryPages", "Primary Pages", "primary pages", "primary"];
const SECONDARY_PAGES: &[&str] = &[
    "secondary_pages",
    "SecondaryPages",
    "Secondary Pages",
    "secondary pages",
    "secondary",
];
const PLANETS: &[&str] = &["planets", "Planets", "Planet", "planet(s)"];
const HOUSES: &[&str] = &["houses", "Houses", "House"];
const TRANSITS: &[&str] = &["transits", "Transits"];
const KEYWORDS: &[&str] = &["keywords", "Tags", "tags"];
const CATEGORY: &[&str] = &["category", "Category", "section", "Section"];

/// Category buckets, checked in order against a lowercased category cell.
const CATEGORY_BUCKETS: &[(&str, &[&str])] = &[
    ("Relationships", &["relationship", "marriage", "compat"]),
    ("Career", &["career", "profession", "job", "work"]),
    ("Money", &["money", "wealth", "finance"]),
    ("Health", &["health", "wellness", "illness"]),
];

/// Buckets used when the category has to be inferred from the question.
const QUESTION_BUCKETS: &[(&str, &[&str])] = &[
    ("Money", &["money", "wealth", "finance"]),
    ("Career", &["job", "career", "work", "profession"]),
    ("Health", &["health", "illness", "wellness"]),
    ("Relationships", &["marriage", "spouse", "relationship", "partner"]),
];

const GENERAL: &str = "General";

/// First non-null cell under any of `aliases`.
fn cell<'a>(row: &'a Row, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| row.get(*key))
        .find(|v| !v.is_null())
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn text_cell(row: &Row, aliases: &[&str]) -> Option<String> {
    cell(row, aliases)
        .map(scalar)
        .filter(|s| !s.is_empty())
}

/// Split a list cell on `,` `;` `/` `&`. Array cells are taken element-wise.
pub fn normalize_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(scalar)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(other) => LIST_SEPARATORS
            .split(&scalar(other))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn bucket(text: &str, buckets: &[(&'static str, &[&str])]) -> Option<&'static str> {
    buckets
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(name, _)| *name)
}

/// Settle a row's category from its category column, or from the question
/// when the column is missing or empty.
pub fn detect_category(category: Option<&str>, question: &str) -> String {
    match category {
        Some(raw) if !raw.is_empty() => {
            let value = raw.trim().to_lowercase();
            if value.is_empty() {
                return GENERAL.to_string();
            }
            if let Some(name) = bucket(&value, CATEGORY_BUCKETS) {
                return name.to_string();
            }
            let mut chars = value.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => GENERAL.to_string(),
            }
        }
        _ => bucket(&question.to_lowercase(), QUESTION_BUCKETS)
            .unwrap_or(GENERAL)
            .to_string(),
    }
}

/// Normalize raw rows into records. Rows without a question are dropped;
/// a row whose id repeats an earlier one is skipped.
pub fn records_from_rows(rows: &[Row]) -> Vec<RuleRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let id = text_cell(row, ID).unwrap_or_else(|| (index + 1).to_string());
        let question = text_cell(row, QUESTION).unwrap_or_default();
        if question.is_empty() {
            debug!(row = index + 1, id = %id, "skipping rule row without a question");
            continue;
        }
        if !seen.insert(id.clone()) {
            warn!(row = index + 1, id = %id, "skipping rule row with duplicate id");
            continue;
        }

        let category_cell = cell(row, CATEGORY).and_then(Value::as_str);
        let category = detect_category(category_cell, &question);

        records.push(RuleRecord {
            id,
            category,
            rule_ref: text_cell(row, RULE_REF),
            pdf_page: text_cell(row, PDF_PAGE),
            primary_pages: text_cell(row, PRIMARY_PAGES),
            secondary_pages: text_cell(row, SECONDARY_PAGES),
            keywords: normalize_list(cell(row, KEYWORDS)),
            planets: normalize_list(cell(row, PLANETS)),
            houses: normalize_list(cell(row, HOUSES)),
            transits: normalize_list(cell(row, TRANSITS)),
            question,
        });
    }
    records
}

/// The loaded rule records, in load order.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    records: Vec<RuleRecord>,
}

impl RuleStore {
    pub fn new(records: Vec<RuleRecord>) -> Self {
        Self { records }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&RuleRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Case-insensitive exact match on the rule reference. An empty
    /// reference never matches.
    pub fn find_by_ref(&self, rule_ref: &str) -> Option<&RuleRecord> {
        let needle = rule_ref.trim();
        if needle.is_empty() {
            return None;
        }
        self.records.iter().find(|r| {
            r.rule_ref
                .as_deref()
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(needle))
        })
    }

    /// Records whose category equals `category` ignoring case; every record
    /// when `category` is empty.
    pub fn by_category(&self, category: &str) -> Vec<RuleRecord> {
        let category = category.trim();
        if category.is_empty() {
            return self.records.clone();
        }
        let category = category.to_lowercase();
        self.records
            .iter()
            .filter(|r| r.category.to_lowercase() == category)
            .cloned()
            .collect()
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|r| r.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RuleRecord> {
        self.records.iter()
    }
}
