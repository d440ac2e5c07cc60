//! Core type definitions for the veilscan risk scanner.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category of a detection rule and of the hits it produces.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Cryptocurrency wallet addresses (bech32, base58, Ethereum hex).
    CryptoWallet,
    /// Private key material (WIF, PEM blocks, hex secrets bound to key-like names).
    PrivateKey,
    /// Obfuscated code constructs (char-code reconstruction, escape runs, concat chains).
    Obfuscation,
    /// Runtime compilation/execution of strings as code.
    DynamicExec,
    /// Outbound traffic to typosquat hosts, raw IPs, or unlisted hosts.
    SuspiciousNetwork,
    /// Encoded blobs that decode to further matchable content.
    Encoding,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::CryptoWallet => write!(f, "crypto-wallet"),
            Category::PrivateKey => write!(f, "private-key"),
            Category::Obfuscation => write!(f, "obfuscation"),
            Category::DynamicExec => write!(f, "dynamic-exec"),
            Category::SuspiciousNetwork => write!(f, "suspicious-network"),
            Category::Encoding => write!(f, "encoding"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crypto-wallet" | "crypto_wallet" | "wallet" => Ok(Category::CryptoWallet),
            "private-key" | "private_key" | "key" => Ok(Category::PrivateKey),
            "obfuscation" => Ok(Category::Obfuscation),
            "dynamic-exec" | "dynamic_exec" | "exec" => Ok(Category::DynamicExec),
            "suspicious-network" | "suspicious_network" | "network" => {
                Ok(Category::SuspiciousNetwork)
            }
            "encoding" => Ok(Category::Encoding),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// A single rule match at a specific location in a specific variant.
///
/// Hits carry the rule id as a back-reference plus copies of the rule's
/// category and severity so a Verdict remains self-describing after the
/// registry goes out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hit {
    /// Id of the rule that matched.
    pub rule_id: String,
    /// Category copied from the rule.
    pub category: Category,
    /// Severity copied from the rule (1-10).
    pub severity: u8,
    /// Byte offset of the match in the variant text it was found in.
    pub offset: usize,
    /// Byte length of the match.
    pub length: usize,
    /// Decoding depth of the variant (0 = original text).
    pub depth: usize,
    /// Bounded excerpt of the matched content.
    pub snippet: String,
    /// Set by the aggregator when an allowlist entry covers this hit.
    pub suppressed: bool,
}

/// Per-category counts in a Verdict. Suppressed hits are tallied
/// separately so an auditor can see what was filtered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTally {
    /// Non-suppressed hits in this category.
    pub count: usize,
    /// Hits suppressed by the allowlist.
    pub suppressed_count: usize,
}

/// The aggregated, scored result for one scanned unit.
///
/// Immutable once returned; owned by the caller. Serializes to the
/// report shape consumed by the reporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Sum of non-suppressed severities with the per-category
    /// diminishing-returns cap applied.
    pub score: f64,
    /// Category breakdown. BTreeMap keeps serialization order stable.
    pub categories: BTreeMap<Category, CategoryTally>,
    /// All hits, suppressed ones included, ordered by severity
    /// descending then offset ascending.
    pub hits: Vec<Hit>,
    /// True when decoding stopped at a depth or variant cap with
    /// decodable content still unexplored.
    pub limit_reached: bool,
    /// SHA-256 of the original unit text.
    pub content_hash: String,
}

impl Verdict {
    /// Non-suppressed hits only.
    pub fn active_hits(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter().filter(|h| !h.suppressed)
    }

    pub fn has_hits(&self) -> bool {
        !self.hits.is_empty()
    }

    /// Highest severity among non-suppressed hits.
    pub fn max_severity(&self) -> Option<u8> {
        self.active_hits().map(|h| h.severity).max()
    }

    /// Hits in a given category (suppressed included).
    pub fn hits_in(&self, category: Category) -> Vec<&Hit> {
        self.hits.iter().filter(|h| h.category == category).collect()
    }
}

/// Truncate a string to a maximum number of characters (UTF-8 safe).
/// Appends "..." if truncated.
pub fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for cat in [
            Category::CryptoWallet,
            Category::PrivateKey,
            Category::Obfuscation,
            Category::DynamicExec,
            Category::SuspiciousNetwork,
            Category::Encoding,
        ] {
            let parsed: Category = cat.to_string().parse().unwrap();
            assert_eq!(parsed, cat);
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("hello world", 5), "hello...");
    }

    #[test]
    fn test_verdict_max_severity_skips_suppressed() {
        let hit = |sev: u8, suppressed: bool| Hit {
            rule_id: "r".into(),
            category: Category::DynamicExec,
            severity: sev,
            offset: 0,
            length: 1,
            depth: 0,
            snippet: String::new(),
            suppressed,
        };
        let verdict = Verdict {
            score: 0.0,
            categories: BTreeMap::new(),
            hits: vec![hit(9, true), hit(4, false)],
            limit_reached: false,
            content_hash: String::new(),
        };
        assert_eq!(verdict.max_severity(), Some(4));
    }
}
