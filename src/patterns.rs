//! Shared regex patterns for skill content analysis.
//!
//! This module consolidates the pre-compiled patterns used by the security
//! scorer: the four permission-risk categories and absolute-URL extraction
//! with a benign-host allow-list.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

// ---------------------------------------------------------------------------
// Permission-risk categories
// ---------------------------------------------------------------------------

/// Shell/process execution patterns
pub static SHELL_EXEC_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bexec\b").unwrap(),
        Regex::new(r"(?i)\bspawn\b").unwrap(),
        Regex::new(r"(?i)\bsystem\b").unwrap(),
        Regex::new(r"(?i)child_process").unwrap(),
        Regex::new(r"(?i)\bsubprocess\b").unwrap(),
        Regex::new(r"(?i)os\.system").unwrap(),
        Regex::new(r"(?i)\beval\b").unwrap(),
    ]
});

/// File-write patterns
pub static FILE_WRITE_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bwriteFile\b").unwrap(),
        Regex::new(r"(?i)\bwrite_file\b").unwrap(),
        Regex::new(r"(?i)fs\.write").unwrap(),
        Regex::new(r#"(?i)open\(.+['"][wa]['"]\)"#).unwrap(),
    ]
});

/// Outbound network call patterns
pub static NETWORK_CALL_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bfetch\b").unwrap(),
        Regex::new(r"(?i)\baxios\b").unwrap(),
        Regex::new(r"(?i)http\.get").unwrap(),
        Regex::new(r"(?i)\burllib\b").unwrap(),
        Regex::new(r"(?i)requests\.get").unwrap(),
        Regex::new(r"(?i)\bcurl\b").unwrap(),
    ]
});

/// Credential/secret vocabulary patterns
pub static CREDENTIAL_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bpassword\b").unwrap(),
        Regex::new(r"(?i)\bsecret\b").unwrap(),
        Regex::new(r"(?i)\btoken\b").unwrap(),
        Regex::new(r"(?i)api[_-]?key").unwrap(),
        Regex::new(r"(?i)\bcredential\b").unwrap(),
        Regex::new(r"(?i)private[_-]?key").unwrap(),
    ]
});

// ---------------------------------------------------------------------------
// URL extraction
// ---------------------------------------------------------------------------

/// Absolute URL pattern. Terminates on whitespace, quotes, and angle brackets
/// so markdown links and inline HTML don't bleed into the match.
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>)\]]+"#).unwrap());

/// Hosts considered benign for the network-risk dimension: code hosting,
/// package registries, and the platform's own domains.
const ALLOWED_HOSTS: &[&str] = &[
    "github.com",
    "npmjs.com",
    "pypi.org",
    "clawhub.ai",
    "clawhub.com",
];

fn host_is_allowed(host: &str) -> bool {
    ALLOWED_HOSTS
        .iter()
        .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")))
}

/// Extract all absolute URLs whose host is outside the allow-list.
///
/// Unparseable URLs count as suspicious: a URL the parser rejects is not one
/// we can vouch for.
pub fn suspicious_urls(text: &str) -> Vec<String> {
    URL_RE
        .find_iter(text)
        .filter_map(|m| {
            let raw = m.as_str().trim_end_matches(['.', ',', ';']);
            match Url::parse(raw) {
                Ok(url) => match url.host_str() {
                    Some(host) if host_is_allowed(host) => None,
                    _ => Some(raw.to_string()),
                },
                Err(_) => Some(raw.to_string()),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Check if any pattern matches
pub fn any_match(text: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}
