//! Built-in detection rules.

use super::{HostCheck, MatcherSpec, RuleSpec};
use crate::decode::Transform;
use crate::types::Category;

fn pattern(
    id: &str,
    category: Category,
    severity: u8,
    description: &str,
    pattern: &str,
) -> RuleSpec {
    RuleSpec {
        id: id.to_string(),
        category,
        severity,
        description: description.to_string(),
        matcher: MatcherSpec::Pattern {
            pattern: pattern.to_string(),
        },
    }
}

/// The default rule catalog.
pub fn builtin_rules() -> Vec<RuleSpec> {
    let mut rules = Vec::new();

    // ==================== CRYPTO WALLETS ====================

    rules.push(pattern(
        "wallet-btc-bech32",
        Category::CryptoWallet,
        6,
        "Bitcoin bech32 (segwit) address literal.",
        r"\bbc1[a-z0-9]{25,59}\b",
    ));

    rules.push(pattern(
        "wallet-btc-base58",
        Category::CryptoWallet,
        4,
        "Bitcoin legacy base58 address literal.",
        r"\b[13][1-9A-HJ-NP-Za-km-z]{25,34}\b",
    ));

    rules.push(pattern(
        "wallet-eth-address",
        Category::CryptoWallet,
        6,
        "Ethereum address literal (0x + 40 hex chars).",
        r"\b0x[a-fA-F0-9]{40}\b",
    ));

    // ==================== PRIVATE KEYS ====================

    rules.push(pattern(
        "key-wif",
        Category::PrivateKey,
        9,
        "Bitcoin private key in Wallet Import Format.",
        r"\b[5KL][1-9A-HJ-NP-Za-km-z]{50,51}\b",
    ));

    rules.push(pattern(
        "key-pem-block",
        Category::PrivateKey,
        10,
        "PEM private key header embedded in source.",
        r"-----BEGIN [A-Z ]*PRIVATE KEY-----",
    ));

    rules.push(RuleSpec {
        id: "key-hex-assignment".to_string(),
        category: Category::PrivateKey,
        severity: 8,
        description: "Key-like identifier assigned a 64-hex-char literal.".to_string(),
        matcher: MatcherSpec::KeyAssignment {
            name: r"(?i)^(priv(ate)?[_-]?key|secret([_-]?key)?|api[_-]?key|auth[_-]?token|seed)$"
                .to_string(),
            value: r"^[0-9a-fA-F]{64}$".to_string(),
        },
    });

    // ==================== DYNAMIC EXECUTION ====================

    rules.push(pattern(
        "exec-eval",
        Category::DynamicExec,
        8,
        "eval() compiles and runs a string as code.",
        r"\beval\s*\(",
    ));

    rules.push(pattern(
        "exec-function-constructor",
        Category::DynamicExec,
        8,
        "new Function() builds executable code from strings.",
        r"\bnew\s+Function\s*\(",
    ));

    rules.push(pattern(
        "exec-exec-call",
        Category::DynamicExec,
        7,
        "exec() runs a string as code.",
        r"\bexec\s*\(",
    ));

    // ==================== OBFUSCATION ====================

    rules.push(pattern(
        "obf-charcode-call",
        Category::Obfuscation,
        5,
        "String reconstruction from a char-code array.",
        r"\bfromCharCode\s*\(",
    ));

    rules.push(pattern(
        "obf-atob",
        Category::Obfuscation,
        4,
        "atob() decodes base64 at runtime.",
        r"\batob\s*\(",
    ));

    rules.push(pattern(
        "obf-escape-run",
        Category::Obfuscation,
        4,
        "Dense run of hex or unicode escapes in a literal.",
        r"(?:\\x[0-9a-fA-F]{2}){6,}|(?:\\u[0-9a-fA-F]{4}){4,}",
    ));

    rules.push(pattern(
        "obf-concat-chain",
        Category::Obfuscation,
        4,
        "String assembled from chained single-char concatenations.",
        r#"(?:['"][^'"]{1,3}['"]\s*\+\s*){4,}['"]"#,
    ));

    // ==================== SUSPICIOUS NETWORK ====================

    rules.push(pattern(
        "net-ip-literal",
        Category::SuspiciousNetwork,
        6,
        "URL addressing a raw IP literal.",
        r"https?://(?:\d{1,3}\.){3}\d{1,3}",
    ));

    rules.push(RuleSpec {
        id: "net-registry-typosquat".to_string(),
        category: Category::SuspiciousNetwork,
        severity: 8,
        description: "URL host typosquats a well-known package registry domain.".to_string(),
        matcher: MatcherSpec::UrlHost {
            check: HostCheck::Typosquat,
        },
    });

    rules.push(RuleSpec {
        id: "net-unlisted-outbound".to_string(),
        category: Category::SuspiciousNetwork,
        severity: 5,
        description: "Outbound call to a host absent from the known-hosts list.".to_string(),
        matcher: MatcherSpec::UrlHost {
            check: HostCheck::UnlistedOutbound,
        },
    });

    // ==================== ENCODED PAYLOADS ====================
    // Satisfied when the decoder peels the corresponding layer; the hit
    // carries the decoded snippet at the produced variant's depth.

    rules.push(RuleSpec {
        id: "enc-base64-payload".to_string(),
        category: Category::Encoding,
        severity: 4,
        description: "Base64 blob that decodes to readable content.".to_string(),
        matcher: MatcherSpec::Decoded {
            transform: Transform::Base64,
        },
    });

    rules.push(RuleSpec {
        id: "enc-hex-payload".to_string(),
        category: Category::Encoding,
        severity: 3,
        description: "Hex blob that decodes to readable content.".to_string(),
        matcher: MatcherSpec::Decoded {
            transform: Transform::HexString,
        },
    });

    rules.push(RuleSpec {
        id: "obf-charcode-payload".to_string(),
        category: Category::Obfuscation,
        severity: 5,
        description: "Content reconstructed from a char-code array.".to_string(),
        matcher: MatcherSpec::Decoded {
            transform: Transform::CharCode,
        },
    });

    rules.push(RuleSpec {
        id: "obf-hex-escape-payload".to_string(),
        category: Category::Obfuscation,
        severity: 4,
        description: "Content hidden behind a hex escape run.".to_string(),
        matcher: MatcherSpec::Decoded {
            transform: Transform::HexEscape,
        },
    });

    rules.push(RuleSpec {
        id: "obf-unicode-escape-payload".to_string(),
        category: Category::Obfuscation,
        severity: 4,
        description: "Content hidden behind a unicode escape run.".to_string(),
        matcher: MatcherSpec::Decoded {
            transform: Transform::UnicodeEscape,
        },
    });

    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Registry;

    #[test]
    fn test_builtin_rules_load() {
        let registry = Registry::load(builtin_rules()).unwrap();
        assert!(registry.all().len() >= 15);
    }

    #[test]
    fn test_builtin_ids_unique() {
        let rules = builtin_rules();
        let mut ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), rules.len());
    }

    #[test]
    fn test_every_category_seeded() {
        use crate::types::Category::*;
        let rules = builtin_rules();
        for cat in [
            CryptoWallet,
            PrivateKey,
            Obfuscation,
            DynamicExec,
            SuspiciousNetwork,
            Encoding,
        ] {
            assert!(
                rules.iter().any(|r| r.category == cat),
                "no builtin rule for {}",
                cat
            );
        }
    }
}
