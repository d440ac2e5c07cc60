//! Detection rules and the immutable registry that holds them.

pub mod hosts;
pub mod patterns;

use crate::decode::Transform;
use crate::types::Category;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while building a [`Registry`]. Any of these is fatal
/// to the load; scanning cannot proceed without a valid registry.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("duplicate rule id: {0}")]
    DuplicateId(String),
    #[error("rule {id}: invalid pattern: {source}")]
    BadPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule {id}: severity {severity} outside 1-10")]
    BadSeverity { id: String, severity: u8 },
}

/// Host classification applied by `UrlHost` rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostCheck {
    /// Any URL whose host typosquats a registry domain.
    Typosquat,
    /// Outbound call sites whose host is not on the known-hosts list.
    UnlistedOutbound,
}

/// How a rule inspects a variant, in declarative form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MatcherSpec {
    /// Plain regex over the variant text.
    Pattern { pattern: String },
    /// Tokenizer-driven: an identifier (or string key) matching `name`,
    /// an assignment operator, then a string literal matching `value`.
    KeyAssignment { name: String, value: String },
    /// URL host classification.
    UrlHost { check: HostCheck },
    /// Satisfied when the named decoding transform produces a variant;
    /// the pipeline emits the hit against the decoded text.
    Decoded { transform: Transform },
}

/// Declarative rule definition, validated and compiled by
/// [`Registry::load`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    pub category: Category,
    /// 1 (informational) to 10 (certain compromise).
    pub severity: u8,
    pub description: String,
    #[serde(flatten)]
    pub matcher: MatcherSpec,
}

/// Compiled matcher, ready to run.
#[derive(Debug)]
pub enum CompiledMatcher {
    Pattern(Regex),
    KeyAssignment { name: Regex, value: Regex },
    UrlHost(HostCheck),
    Decoded(Transform),
}

/// An immutable, validated rule.
#[derive(Debug)]
pub struct Rule {
    pub id: String,
    pub category: Category,
    pub severity: u8,
    pub description: String,
    pub matcher: CompiledMatcher,
}

/// The full rule set for a scan. Built once through [`Registry::load`],
/// never mutated afterwards; shared freely across scanning threads.
#[derive(Debug)]
pub struct Registry {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    by_transform: HashMap<Transform, usize>,
}

impl Registry {
    /// Validate and compile `specs` into a registry. Registration order
    /// is preserved and defines match ordering.
    pub fn load(specs: Vec<RuleSpec>) -> Result<Self, RuleError> {
        let mut rules = Vec::with_capacity(specs.len());
        let mut index = HashMap::with_capacity(specs.len());
        let mut by_transform = HashMap::new();

        for spec in specs {
            if !(1..=10).contains(&spec.severity) {
                return Err(RuleError::BadSeverity {
                    id: spec.id,
                    severity: spec.severity,
                });
            }
            if index.contains_key(&spec.id) {
                return Err(RuleError::DuplicateId(spec.id));
            }

            let matcher = match spec.matcher {
                MatcherSpec::Pattern { pattern } => {
                    CompiledMatcher::Pattern(compile(&spec.id, &pattern)?)
                }
                MatcherSpec::KeyAssignment { name, value } => CompiledMatcher::KeyAssignment {
                    name: compile(&spec.id, &name)?,
                    value: compile(&spec.id, &value)?,
                },
                MatcherSpec::UrlHost { check } => CompiledMatcher::UrlHost(check),
                MatcherSpec::Decoded { transform } => CompiledMatcher::Decoded(transform),
            };

            let rule_idx = rules.len();
            index.insert(spec.id.clone(), rule_idx);
            if let CompiledMatcher::Decoded(transform) = &matcher {
                by_transform.entry(*transform).or_insert(rule_idx);
            }
            rules.push(Rule {
                id: spec.id,
                category: spec.category,
                severity: spec.severity,
                description: spec.description,
                matcher,
            });
        }

        Ok(Self {
            rules,
            index,
            by_transform,
        })
    }

    /// Load the built-in rule catalog.
    pub fn builtin() -> Result<Self, RuleError> {
        Self::load(patterns::builtin_rules())
    }

    /// Look up a rule by id.
    pub fn lookup(&self, id: &str) -> Option<&Rule> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    /// All rules, in registration order.
    pub fn all(&self) -> &[Rule] {
        &self.rules
    }

    /// The rule credited when `transform` successfully peels a layer.
    pub fn rule_for_transform(&self, transform: Transform) -> Option<&Rule> {
        self.by_transform.get(&transform).map(|&i| &self.rules[i])
    }
}

fn compile(id: &str, pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::BadPattern {
        id: id.to_string(),
        source,
    })
}
