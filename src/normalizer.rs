//! Schema-detecting log line normalizer.
//!
//! Handles three producer formats plus free text:
//! - structlog-style: `event` field, `log_level` string, ISO `timestamp`
//! - Pino-style: `msg` field, numeric `level` (10-60), Unix-ms `time`
//! - stdlib-style: `levelname` string
//!
//! The normalizer is pure and cannot fail: malformed JSON falls through to
//! the free-text path.

use crate::domain::{LogEntry, level};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Normalizer output: the entry plus whether its timestamp fell through to
/// wall-clock, so the tailer can substitute the runtime-provided timestamp.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub entry: LogEntry,
    pub wallclock_fallback: bool,
}

/// Current wall-clock as ISO-8601 UTC with microsecond precision and offset.
#[must_use]
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Parse one raw line into a canonical entry for `service`.
#[must_use]
pub fn normalize_line(raw_line: &str, service: &str) -> Normalized {
    let line = raw_line.trim();

    if line.is_empty() {
        return Normalized {
            entry: LogEntry {
                service: service.to_string(),
                level: level::DEFAULT_LEVEL.to_string(),
                timestamp: now_iso(),
                trace_id: None,
                message: String::new(),
                raw: line.to_string(),
            },
            wallclock_fallback: true,
        };
    }

    if let Ok(Value::Object(data)) = serde_json::from_str::<Value>(line) {
        let (timestamp, wallclock_fallback) = extract_timestamp(&data);
        return Normalized {
            entry: LogEntry {
                service: service.to_string(),
                level: extract_level(&data),
                timestamp,
                trace_id: extract_trace_id(&data),
                message: extract_message(&data),
                raw: line.to_string(),
            },
            wallclock_fallback,
        };
    }

    Normalized {
        entry: LogEntry {
            service: service.to_string(),
            level: level::detect_from_text(line).to_string(),
            timestamp: now_iso(),
            trace_id: None,
            message: line.to_string(),
            raw: line.to_string(),
        },
        wallclock_fallback: true,
    }
}

/// Extract and normalize the level from the known schemas, in order:
/// `log_level` string, `level` integer (Pino), `level` string, `levelname`.
fn extract_level(data: &Map<String, Value>) -> String {
    if let Some(Value::String(s)) = data.get("log_level") {
        return s.to_lowercase();
    }

    match data.get("level") {
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => {
            return level::from_pino(n.as_i64().unwrap_or(0)).to_string();
        }
        Some(Value::String(s)) => return s.to_lowercase(),
        _ => {}
    }

    if let Some(Value::String(s)) = data.get("levelname") {
        return s.to_lowercase();
    }

    level::DEFAULT_LEVEL.to_string()
}

/// Extract the timestamp: `timestamp` string verbatim, else `time` as Unix
/// milliseconds, else wall-clock. The bool is true on the wall-clock path.
fn extract_timestamp(data: &Map<String, Value>) -> (String, bool) {
    if let Some(Value::String(s)) = data.get("timestamp") {
        return (s.clone(), false);
    }

    if let Some(Value::Number(n)) = data.get("time") {
        if let Some(iso) = unix_ms_to_iso(n) {
            return (iso, false);
        }
    }

    (now_iso(), true)
}

/// Convert a Unix-milliseconds number to ISO-8601 UTC. Out-of-range values
/// yield `None` and the caller falls back to wall-clock.
#[allow(clippy::cast_possible_truncation)]
fn unix_ms_to_iso(n: &serde_json::Number) -> Option<String> {
    let dt = if let Some(ms) = n.as_i64() {
        DateTime::<Utc>::from_timestamp_millis(ms)?
    } else {
        let micros = (n.as_f64()? * 1000.0).round();
        if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
            return None;
        }
        DateTime::<Utc>::from_timestamp_micros(micros as i64)?
    };
    Some(dt.to_rfc3339_opts(SecondsFormat::Micros, false))
}

/// First truthy value among the known trace-id aliases, coerced to string.
fn extract_trace_id(data: &Map<String, Value>) -> Option<String> {
    for key in ["trace_id", "traceId", "request_id", "requestId", "x_trace_id"] {
        match data.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) if n.as_f64() != Some(0.0) => return Some(n.to_string()),
            Some(Value::Bool(true)) => return Some("true".to_string()),
            _ => {}
        }
    }
    None
}

/// First non-empty value among `event`, `msg`, `message`; else the
/// re-serialized object.
fn extract_message(data: &Map<String, Value>) -> String {
    for key in ["event", "msg", "message"] {
        match data.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Number(n)) if n.as_f64() != Some(0.0) => return n.to_string(),
            Some(Value::Bool(true)) => return "true".to_string(),
            _ => {}
        }
    }
    serde_json::to_string(data).unwrap_or_default()
}
