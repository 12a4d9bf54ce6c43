//! Log-level vocabulary.
//!
//! Levels are stored as lowercased strings rather than a closed enum: the
//! producers emit both `warn` and `warning` and both are kept as-is.

pub const DEFAULT_LEVEL: &str = "info";

/// Map a Pino numeric level to its string form. Unknown integers fall back
/// to `info`.
#[must_use]
pub fn from_pino(level: i64) -> &'static str {
    match level {
        10 => "trace",
        20 => "debug",
        30 => "info",
        40 => "warn",
        50 => "error",
        60 => "fatal",
        _ => DEFAULT_LEVEL,
    }
}

/// Best-effort level detection for free-form text lines.
///
/// Case-insensitive substring match over the whole line; first hit wins.
#[must_use]
pub fn detect_from_text(line: &str) -> &'static str {
    let lower = line.to_lowercase();
    if lower.contains("traceback") || lower.contains("exception") || lower.contains("error") {
        "error"
    } else if lower.contains("warn") {
        "warn"
    } else if lower.contains("debug") {
        "debug"
    } else {
        DEFAULT_LEVEL
    }
}
