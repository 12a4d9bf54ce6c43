use serde::{Deserialize, Serialize};

/// A normalized, scrubbed log entry that has not been persisted yet.
///
/// This is the pipeline's working type: the normalizer produces it, the
/// scrubber rewrites it, and the store consumes it in batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub service: String,
    pub level: String,
    /// ISO-8601 UTC timestamp with offset; lexicographically sortable.
    pub timestamp: String,
    #[serde(default)]
    pub trace_id: Option<String>,
    pub message: String,
    /// The original line as received, after trimming.
    pub raw: String,
}

/// The canonical persisted record. `id` is assigned by the store on insert
/// and is strictly increasing over the store's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub service: String,
    pub level: String,
    pub timestamp: String,
    #[serde(default)]
    pub trace_id: Option<String>,
    pub message: String,
    pub raw: String,
}

impl LogRecord {
    #[must_use]
    pub fn from_entry(id: i64, entry: LogEntry) -> Self {
        Self {
            id,
            service: entry.service,
            level: entry.level,
            timestamp: entry.timestamp,
            trace_id: entry.trace_id,
            message: entry.message,
            raw: entry.raw,
        }
    }
}
