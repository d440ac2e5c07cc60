//! Allowlist configuration: suppress known-benign matches without
//! deleting the evidence.
//!
//! An entry names a rule id or a category, plus a context pattern run
//! against the hit's snippet. Matching hits keep their place in the
//! Verdict but are flagged `suppressed` and excluded from the score.

use crate::types::{Category, Hit};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building an [`Allowlist`].
#[derive(Debug, Error)]
pub enum AllowlistError {
    #[error("allowlist entry {index}: names neither a rule nor a category")]
    EmptySelector { index: usize },
    #[error("allowlist entry {index}: invalid context pattern: {source}")]
    BadContext {
        index: usize,
        #[source]
        source: regex::Error,
    },
    #[error("failed to parse allowlist file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Declarative allowlist entry, as found in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowSpec {
    /// Rule id this entry applies to.
    #[serde(default)]
    pub rule: Option<String>,
    /// Category this entry applies to.
    #[serde(default)]
    pub category: Option<Category>,
    /// Regex run against the hit snippet; the entry only suppresses
    /// hits whose context matches.
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AllowFile {
    #[serde(default)]
    allow: Vec<AllowSpec>,
}

#[derive(Debug)]
struct AllowEntry {
    rule: Option<String>,
    category: Option<Category>,
    context: Regex,
}

/// Compiled suppression rules. Immutable after construction; read-only
/// during scans.
#[derive(Debug, Default)]
pub struct Allowlist {
    entries: Vec<AllowEntry>,
}

impl Allowlist {
    /// An allowlist that suppresses nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate and compile `specs`.
    pub fn new(specs: Vec<AllowSpec>) -> Result<Self, AllowlistError> {
        let mut entries = Vec::with_capacity(specs.len());
        for (index, spec) in specs.into_iter().enumerate() {
            if spec.rule.is_none() && spec.category.is_none() {
                return Err(AllowlistError::EmptySelector { index });
            }
            let context = Regex::new(&spec.context)
                .map_err(|source| AllowlistError::BadContext { index, source })?;
            entries.push(AllowEntry {
                rule: spec.rule,
                category: spec.category,
                context,
            });
        }
        Ok(Self { entries })
    }

    /// Parse a TOML allowlist document:
    ///
    /// ```toml
    /// [[allow]]
    /// rule = "net-unlisted-outbound"
    /// context = "internal\\.example"
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, AllowlistError> {
        let file: AllowFile = toml::from_str(s)?;
        Self::new(file.allow)
    }

    /// Whether any entry covers `hit`: the selector (rule id or
    /// category) applies and the context pattern matches the snippet.
    pub fn suppresses(&self, hit: &Hit) -> bool {
        self.entries.iter().any(|entry| {
            let selector_applies = match (&entry.rule, entry.category) {
                (Some(rule), _) if *rule == hit.rule_id => true,
                (None, Some(category)) if category == hit.category => true,
                (Some(_), Some(category)) if category == hit.category => true,
                _ => false,
            };
            selector_applies && entry.context.is_match(&hit.snippet)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
