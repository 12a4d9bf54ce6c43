//! Secret scrubbing applied to every entry before persistence.
//!
//! A fixed ordered list of named patterns is compiled once at startup into
//! an immutable `Scrubber`. Entries whose raw payload declares upstream
//! redaction (`logging_strategy` of `redacted` or `partial`) pass through
//! unchanged.

use crate::domain::LogEntry;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

const REDACTED: &str = "[REDACTED]";

/// Built-in secret patterns, applied in order. The bearer pattern keeps its
/// captured `Bearer ` prefix and replaces only the token.
const BUILTIN_PATTERNS: &[(&str, &str, bool)] = &[
    ("openai_key", r"sk-[A-Za-z0-9]{20,}", false),
    ("stripe_key", r"sk_(live|test)_[A-Za-z0-9]{20,}", false),
    ("github_token", r"gh[pousr]_[A-Za-z0-9_]{36,}", false),
    ("slack_token", r"xox[baprs]-[A-Za-z0-9\-]{10,}", false),
    ("bearer_token", r"(?i)(Bearer\s+)[A-Za-z0-9_\-.]{20,}", true),
    (
        "jwt",
        r"eyJ[A-Za-z0-9_-]+\.eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+",
        false,
    ),
    (
        "connection_string",
        r#"(?i)(postgres|mysql|mongodb|redis|amqp)://[^\s"']{10,}"#,
        false,
    ),
    (
        "api_key_assignment",
        r#"(?i)(?:api[_-]?key|apikey)\s*[:=]\s*['"]?[A-Za-z0-9_\-]{20,}['"]?"#,
        false,
    ),
    (
        "password_assignment",
        r#"(?i)(?:password|passwd|pwd)\s*[:=]\s*['"]?[^\s'"]{8,}['"]?"#,
        false,
    ),
    (
        "secret_assignment",
        r#"(?i)(?:secret|token)\s*[:=]\s*['"]?[A-Za-z0-9_\-]{20,}['"]?"#,
        false,
    ),
    ("aws_access_key", r"AKIA[0-9A-Z]{16}", false),
    ("private_key", r"-----BEGIN\s+(RSA\s+)?PRIVATE\s+KEY-----", false),
];

struct ScrubPattern {
    name: String,
    regex: Regex,
    keep_prefix: bool,
}

/// Deterministic secret redactor: identical input and pattern set always
/// produce identical output.
pub struct Scrubber {
    patterns: Vec<ScrubPattern>,
}

impl Scrubber {
    /// Compile the built-in pattern set plus comma-separated user patterns.
    /// Invalid user patterns are logged once and skipped.
    #[must_use]
    pub fn new(extra_patterns: &str) -> Self {
        let mut patterns: Vec<ScrubPattern> = BUILTIN_PATTERNS
            .iter()
            .map(|(name, pattern, keep_prefix)| ScrubPattern {
                name: (*name).to_string(),
                regex: Regex::new(pattern).expect("built-in scrub pattern must compile"),
                keep_prefix: *keep_prefix,
            })
            .collect();

        for (i, raw) in extra_patterns.split(',').enumerate() {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            match Regex::new(raw) {
                Ok(regex) => patterns.push(ScrubPattern {
                    name: format!("custom_{i}"),
                    regex,
                    keep_prefix: false,
                }),
                Err(e) => warn!(pattern = raw, error = %e, "invalid scrub pattern, skipping"),
            }
        }

        Self { patterns }
    }

    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Replace every match of every active pattern with `[REDACTED]`.
    #[must_use]
    pub fn scrub_text(&self, text: &str) -> String {
        let mut result = text.to_string();
        for pattern in &self.patterns {
            if !pattern.regex.is_match(&result) {
                continue;
            }
            result = if pattern.keep_prefix {
                pattern
                    .regex
                    .replace_all(&result, "${1}[REDACTED]")
                    .into_owned()
            } else {
                pattern.regex.replace_all(&result, REDACTED).into_owned()
            };
            tracing::trace!(pattern = %pattern.name, "secret scrubbed");
        }
        result
    }

    /// Scrub the `message` and `raw` fields of an entry, honoring the
    /// upstream redaction opt-out declared in `raw`.
    #[must_use]
    pub fn scrub_entry(&self, mut entry: LogEntry) -> LogEntry {
        if upstream_redacted(&entry.raw) {
            return entry;
        }
        entry.message = self.scrub_text(&entry.message);
        entry.raw = self.scrub_text(&entry.raw);
        entry
    }
}

/// True when the raw payload is a JSON object whose `logging_strategy` is
/// `redacted` or `partial` (the producer already scrubbed it).
fn upstream_redacted(raw: &str) -> bool {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(data)) => matches!(
            data.get("logging_strategy"),
            Some(Value::String(s)) if s == "redacted" || s == "partial"
        ),
        _ => false,
    }
}
