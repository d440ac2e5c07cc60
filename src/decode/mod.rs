//! Decoding of obfuscation layers into candidate text variants.
//!
//! Malicious payloads are routinely hidden behind base64, char-code
//! arrays, or escape sequences. This module expands a unit of text into
//! a bounded set of decoded variants so the matcher can re-scan each
//! layer. Expansion is iterative and capped by depth and variant count;
//! adversarially nested encodings terminate with a limit signal instead
//! of exhausting resources.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// A decoding transform the expander knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transform {
    Base64,
    HexString,
    CharCode,
    HexEscape,
    UnicodeEscape,
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transform::Base64 => write!(f, "base64"),
            Transform::HexString => write!(f, "hex-string"),
            Transform::CharCode => write!(f, "charcode"),
            Transform::HexEscape => write!(f, "hex-escape"),
            Transform::UnicodeEscape => write!(f, "unicode-escape"),
        }
    }
}

/// Fixed application order, so expansion is deterministic.
const TRANSFORMS: &[Transform] = &[
    Transform::Base64,
    Transform::HexString,
    Transform::CharCode,
    Transform::HexEscape,
    Transform::UnicodeEscape,
];

// Candidate regions per transform. Quoting requirements keep the base64
// and hex patterns from firing on arbitrary identifiers.
static BASE64_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"`]([A-Za-z0-9+/]{12,}={0,2})['"`]"#).expect("base64 regex")
});
static HEX_STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"`]([0-9a-fA-F]{16,})['"`]"#).expect("hex regex"));
static CHARCODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"fromCharCode\s*\(\s*((?:\d{1,3}\s*,\s*){2,}\d{1,3})\s*\)")
        .expect("charcode regex")
});
static HEX_ESCAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"((?:\\x[0-9a-fA-F]{2}){4,})").expect("hex escape regex"));
static UNICODE_ESCAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"((?:\\u[0-9a-fA-F]{4}){4,})").expect("unicode escape regex"));

/// One candidate text: the original unit at depth 0, or the result of
/// applying the transform chain to an encoded region of its parent.
#[derive(Debug, Clone)]
pub struct Variant {
    pub text: String,
    pub depth: usize,
    /// Transforms applied, outermost first. Empty at depth 0.
    pub chain: Vec<Transform>,
}

impl Variant {
    /// The transform that produced this variant, if any.
    pub fn produced_by(&self) -> Option<Transform> {
        self.chain.last().copied()
    }
}

/// The full set of variants for one unit, plus the limit signal.
#[derive(Debug)]
pub struct Expansion {
    /// Depth-0 original first, then decoded variants in discovery order.
    pub variants: Vec<Variant>,
    /// True when a depth or variant cap stopped expansion while
    /// decodable content remained.
    pub limit_reached: bool,
}

/// Expansion bounds. Both caps are required for termination against
/// adversarial nesting.
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    pub max_depth: usize,
    pub max_variants: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_variants: 50,
        }
    }
}

/// Expands a unit of text into decoded variants.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    limits: DecodeLimits,
}

impl Decoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    /// Expand `text` into variants. The original is always present at
    /// depth 0 and is never mutated. A region that fails to decode
    /// contributes nothing; that is the expected negative case, not an
    /// error.
    pub fn expand(&self, text: &str) -> Expansion {
        let mut variants = vec![Variant {
            text: text.to_string(),
            depth: 0,
            chain: Vec::new(),
        }];
        // Texts already produced, so cycles (a blob decoding to itself
        // or to an earlier layer) cannot loop.
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(text.to_string());

        let mut limit_reached = false;
        let mut frontier: Vec<usize> = vec![0];

        for depth in 1..=self.limits.max_depth {
            let mut next_frontier = Vec::new();

            'frontier: for &idx in &frontier {
                let (parent_text, parent_chain) =
                    (variants[idx].text.clone(), variants[idx].chain.clone());

                for (transform, decoded) in decode_regions(&parent_text) {
                    if !seen.insert(decoded.clone()) {
                        continue;
                    }
                    if variants.len() >= self.limits.max_variants {
                        tracing::debug!(
                            max_variants = self.limits.max_variants,
                            "variant cap reached, stopping expansion"
                        );
                        limit_reached = true;
                        break 'frontier;
                    }
                    let mut chain = parent_chain.clone();
                    chain.push(transform);
                    next_frontier.push(variants.len());
                    variants.push(Variant {
                        text: decoded,
                        depth,
                        chain,
                    });
                }
            }

            if limit_reached || next_frontier.is_empty() {
                frontier = next_frontier;
                break;
            }
            frontier = next_frontier;
        }

        // Depth cap hit while the deepest layer still decodes further.
        if !limit_reached
            && frontier
                .iter()
                .any(|&idx| variants[idx].depth == self.limits.max_depth)
            && frontier.iter().any(|&idx| {
                decode_regions(&variants[idx].text)
                    .iter()
                    .any(|(_, d)| !seen.contains(d))
            })
        {
            tracing::debug!(
                max_depth = self.limits.max_depth,
                "depth cap reached with decodable content remaining"
            );
            limit_reached = true;
        }

        Expansion {
            variants,
            limit_reached,
        }
    }
}

/// Find every region of `text` that a transform successfully decodes.
/// Order: transform order, then leftmost match.
fn decode_regions(text: &str) -> Vec<(Transform, String)> {
    let mut out = Vec::new();
    for &transform in TRANSFORMS {
        match transform {
            Transform::Base64 => {
                for cap in BASE64_RE.captures_iter(text) {
                    if let Some(decoded) = cap.get(1).and_then(|m| try_base64(m.as_str())) {
                        out.push((transform, decoded));
                    }
                }
            }
            Transform::HexString => {
                for cap in HEX_STRING_RE.captures_iter(text) {
                    if let Some(decoded) = cap.get(1).and_then(|m| try_hex(m.as_str())) {
                        out.push((transform, decoded));
                    }
                }
            }
            Transform::CharCode => {
                for cap in CHARCODE_RE.captures_iter(text) {
                    if let Some(decoded) = cap.get(1).and_then(|m| try_charcode(m.as_str())) {
                        out.push((transform, decoded));
                    }
                }
            }
            Transform::HexEscape => {
                for cap in HEX_ESCAPE_RE.captures_iter(text) {
                    if let Some(decoded) = cap.get(1).and_then(|m| try_hex_escape(m.as_str())) {
                        out.push((transform, decoded));
                    }
                }
            }
            Transform::UnicodeEscape => {
                for cap in UNICODE_ESCAPE_RE.captures_iter(text) {
                    if let Some(decoded) =
                        cap.get(1).and_then(|m| try_unicode_escape(m.as_str()))
                    {
                        out.push((transform, decoded));
                    }
                }
            }
        }
    }
    out
}

fn try_base64(s: &str) -> Option<String> {
    use base64::Engine;

    let standard = base64::engine::general_purpose::STANDARD;
    if let Ok(bytes) = standard.decode(s) {
        if let Ok(decoded) = String::from_utf8(bytes) {
            if is_printable_text(&decoded) {
                return Some(decoded);
            }
        }
    }

    let url_safe = base64::engine::general_purpose::URL_SAFE;
    if let Ok(bytes) = url_safe.decode(s) {
        if let Ok(decoded) = String::from_utf8(bytes) {
            if is_printable_text(&decoded) {
                return Some(decoded);
            }
        }
    }

    None
}

fn try_hex(s: &str) -> Option<String> {
    if s.is_empty() || s.len() % 2 != 0 {
        return None;
    }

    let mut bytes = Vec::with_capacity(s.len() / 2);
    let mut i = 0;
    while i + 2 <= s.len() {
        match u8::from_str_radix(&s[i..i + 2], 16) {
            Ok(byte) => bytes.push(byte),
            Err(_) => return None,
        }
        i += 2;
    }

    String::from_utf8(bytes)
        .ok()
        .filter(|d| is_printable_text(d))
}

fn try_charcode(s: &str) -> Option<String> {
    let result: String = s
        .split(',')
        .filter_map(|n| n.trim().parse::<u32>().ok())
        .filter_map(char::from_u32)
        .collect();

    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

fn try_hex_escape(s: &str) -> Option<String> {
    let mut bytes = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'x') {
            chars.next();
            let hex: String = chars.by_ref().take(2).collect();
            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                bytes.push(byte);
            }
        }
    }

    if bytes.is_empty() {
        None
    } else {
        String::from_utf8(bytes).ok()
    }
}

fn try_unicode_escape(s: &str) -> Option<String> {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'u') {
            chars.next();
            let hex: String = chars.by_ref().take(4).collect();
            if let Ok(code) = u32::from_str_radix(&hex, 16) {
                if let Some(decoded_char) = char::from_u32(code) {
                    result.push(decoded_char);
                }
            }
        }
    }

    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

/// Check if a string appears to be human-readable text.
fn is_printable_text(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }

    let printable_count = s
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || c.is_ascii_punctuation())
        .count();

    let ratio = printable_count as f64 / s.chars().count() as f64;
    ratio > 0.7
}
