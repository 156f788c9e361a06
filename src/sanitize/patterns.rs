//! Ordered secret-detection patterns
//!
//! Each pattern either redacts its whole match or only the capture group that
//! holds the secret value, keeping the surrounding assignment readable. None of
//! the patterns can match [`REDACTION_MARKER`], so redaction is idempotent.

use regex::bytes::{Captures, Regex};
use std::sync::LazyLock;

/// Placeholder substituted for every detected secret
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// A single named secret detector
#[derive(Debug)]
pub struct SecretPattern {
    /// Stable identifier used in logs
    pub name: &'static str,
    regex: Regex,
    /// Capture group holding the secret, `None` redacts the whole match
    secret_group: Option<usize>,
}

impl SecretPattern {
    fn whole(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: compile(name, pattern),
            secret_group: None,
        }
    }

    fn group(name: &'static str, pattern: &str, group: usize) -> Self {
        Self {
            name,
            regex: compile(name, pattern),
            secret_group: Some(group),
        }
    }

    /// Returns true if the input contains at least one match
    pub fn is_match(&self, input: &[u8]) -> bool {
        self.regex.is_match(input)
    }

    /// Number of non-overlapping matches in the input
    pub fn count_matches(&self, input: &[u8]) -> usize {
        self.regex.find_iter(input).count()
    }

    /// Replaces every match with the redaction marker, returning the rewritten
    /// bytes and the number of replacements made.
    pub fn redact(&self, input: &[u8]) -> (Vec<u8>, usize) {
        let mut replaced = 0usize;
        let output = self.regex.replace_all(input, |caps: &Captures<'_>| {
            replaced += 1;
            let secret = self.secret_group.and_then(|g| caps.get(g));
            match (caps.get(0), secret) {
                (Some(whole), Some(secret)) => {
                    let mut buf = Vec::with_capacity(whole.len());
                    buf.extend_from_slice(&input[whole.start()..secret.start()]);
                    buf.extend_from_slice(REDACTION_MARKER.as_bytes());
                    buf.extend_from_slice(&input[secret.end()..whole.end()]);
                    buf
                }
                _ => REDACTION_MARKER.as_bytes().to_vec(),
            }
        });
        (output.into_owned(), replaced)
    }
}

fn compile(name: &str, pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        // Patterns are compile-time constants covered by unit tests.
        Err(e) => panic!("invalid built-in secret pattern {name}: {e}"),
    }
}

static PATTERNS: LazyLock<Vec<SecretPattern>> = LazyLock::new(|| {
    vec![
        SecretPattern::whole(
            "private_key_block",
            r"-----BEGIN (?:[A-Z0-9]+ )*PRIVATE KEY-----(?s:.*?)-----END (?:[A-Z0-9]+ )*PRIVATE KEY-----",
        ),
        SecretPattern::whole(
            "aws_access_key_id",
            r"\b(?:AKIA|ASIA|AGPA|AIDA|AROA)[0-9A-Z]{16}\b",
        ),
        SecretPattern::group(
            "aws_secret_access_key",
            r#"(?i)aws_?secret_?access_?key\s*[:=]\s*['"]?([A-Za-z0-9/+=]{40})['"]?"#,
            1,
        ),
        SecretPattern::whole("google_api_key", r"\bAIza[0-9A-Za-z_\-]{35}\b"),
        SecretPattern::whole("github_token", r"\bgh[pousr]_[A-Za-z0-9]{36,255}\b"),
        SecretPattern::whole("slack_token", r"\bxox[abposr]-[A-Za-z0-9\-]{10,}\b"),
        SecretPattern::whole("stripe_key", r"\b(?:sk|rk)_(?:live|test)_[A-Za-z0-9]{16,}\b"),
        SecretPattern::whole("openai_key", r"\bsk-(?:proj-)?[A-Za-z0-9_\-]{20,}\b"),
        SecretPattern::group(
            "secret_assignment",
            r#"(?i)\b[a-z0-9_.\-]*(?:api[_\-]?key|secret|token|access[_\-]?key)[a-z0-9_.\-]*['"]?\s*[:=]\s*['"]([A-Za-z0-9_\-/+=.]{16,})['"]"#,
            1,
        ),
        SecretPattern::group(
            "connection_string_credentials",
            r#"\b[a-zA-Z][a-zA-Z0-9+.\-]*://[^\s:/@'"]+:([^\s:/@'"\[\]]+)@"#,
            1,
        ),
        SecretPattern::group(
            "password_assignment",
            r#"(?i)\b(?:password|passwd|pwd)['"]?\s*[:=]\s*['"]([^'"\s\[\]]{4,})['"]"#,
            1,
        ),
    ]
});

/// The built-in pattern set, in application order
pub fn builtin_patterns() -> &'static [SecretPattern] {
    &PATTERNS
}

/// Applies every pattern in order, returning the rewritten bytes and the total
/// number of replacements.
pub fn redact_bytes(input: &[u8]) -> (Vec<u8>, usize) {
    let mut current = input.to_vec();
    let mut total = 0;
    for pattern in builtin_patterns() {
        if !pattern.is_match(&current) {
            continue;
        }
        let (next, replaced) = pattern.redact(&current);
        total += replaced;
        current = next;
    }
    (current, total)
}

/// Redacts secrets from text that is about to leave the process (diagnostics,
/// log excerpts, prompt context).
pub fn redact_text(input: &str) -> String {
    let (bytes, _) = redact_bytes(input.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}
