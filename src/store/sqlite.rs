use super::StoreError;
use crate::domain::{LogEntry, LogRecord};
use parking_lot::Mutex;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params, params_from_iter};
use std::path::{Path, PathBuf};
use tracing::info;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS logs (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    service    TEXT    NOT NULL,
    level      TEXT    NOT NULL DEFAULT 'info',
    timestamp  TEXT    NOT NULL,
    trace_id   TEXT,
    message    TEXT    NOT NULL,
    raw        TEXT
);

CREATE INDEX IF NOT EXISTS idx_logs_service   ON logs(service);
CREATE INDEX IF NOT EXISTS idx_logs_level     ON logs(level);
CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp);
CREATE INDEX IF NOT EXISTS idx_logs_trace_id  ON logs(trace_id);

CREATE VIRTUAL TABLE IF NOT EXISTS logs_fts USING fts5(
    message,
    content=logs,
    content_rowid=id
);

CREATE TRIGGER IF NOT EXISTS logs_ai AFTER INSERT ON logs BEGIN
    INSERT INTO logs_fts(rowid, message) VALUES (new.id, new.message);
END;

CREATE TRIGGER IF NOT EXISTS logs_ad AFTER DELETE ON logs BEGIN
    INSERT INTO logs_fts(logs_fts, rowid, message) VALUES ('delete', old.id, old.message);
END;
";

const SELECT_COLUMNS: &str = "SELECT id, service, level, timestamp, trace_id, message, raw FROM logs";

const INSERT_SQL: &str = "INSERT INTO logs (service, level, timestamp, trace_id, message, raw) \
                          VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

/// Filters for `LogStore::search`. All clauses are conjunctive; empty
/// strings count as absent. `limit` and `offset` are validated upstream
/// (1..=1000 and >= 0).
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub service: Option<String>,
    pub level: Option<String>,
    pub from_ts: Option<String>,
    pub to_ts: Option<String>,
    pub trace_id: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Single-file SQLite store with WAL journaling, NORMAL synchronous mode,
/// and a 5 s busy timeout. Writes are serialized through one writer mutex;
/// reads run concurrently through the pool.
pub struct LogStore {
    pool: Pool<SqliteConnectionManager>,
    write_lock: Mutex<()>,
    path: PathBuf,
}

impl LogStore {
    /// Open (creating if necessary) the database at `path` and apply the
    /// schema. The parent directory is auto-created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA busy_timeout=5000;",
            )
        });
        let pool = Pool::builder().max_size(8).build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch(SCHEMA)?;
        drop(conn);

        info!(path = %path.display(), "database initialized");

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
            path: path.to_path_buf(),
        })
    }

    /// Insert a single entry and return it with its assigned id.
    pub fn insert(&self, entry: LogEntry) -> Result<LogRecord, StoreError> {
        let _guard = self.write_lock.lock();
        let conn = self.pool.get()?;
        conn.execute(
            INSERT_SQL,
            params![
                entry.service,
                entry.level,
                entry.timestamp,
                entry.trace_id,
                entry.message,
                entry.raw
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(LogRecord::from_entry(id, entry))
    }

    /// Insert a batch in one transaction and return the stored records with
    /// their assigned ids, in input order.
    pub fn insert_batch(&self, entries: Vec<LogEntry>) -> Result<Vec<LogRecord>, StoreError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.write_lock.lock();
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let mut ids = Vec::with_capacity(entries.len());
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL)?;
            for entry in &entries {
                stmt.execute(params![
                    entry.service,
                    entry.level,
                    entry.timestamp,
                    entry.trace_id,
                    entry.message,
                    entry.raw
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;

        Ok(ids
            .into_iter()
            .zip(entries)
            .map(|(id, entry)| LogRecord::from_entry(id, entry))
            .collect())
    }

    /// Search with optional full-text query and filters, most recent first
    /// (`timestamp DESC, id DESC`).
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<LogRecord>, StoreError> {
        let conn = self.pool.get()?;

        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(q) = non_empty(&query.q) {
            conditions.push("logs.id IN (SELECT rowid FROM logs_fts WHERE logs_fts MATCH ?)");
            values.push(q.to_string());
        }
        if let Some(service) = non_empty(&query.service) {
            conditions.push("logs.service = ?");
            values.push(service.to_string());
        }
        if let Some(level) = non_empty(&query.level) {
            conditions.push("logs.level = ?");
            values.push(level.to_string());
        }
        if let Some(from_ts) = non_empty(&query.from_ts) {
            conditions.push("logs.timestamp >= ?");
            values.push(from_ts.to_string());
        }
        if let Some(to_ts) = non_empty(&query.to_ts) {
            conditions.push("logs.timestamp <= ?");
            values.push(to_ts.to_string());
        }
        if let Some(trace_id) = non_empty(&query.trace_id) {
            conditions.push("logs.trace_id = ?");
            values.push(trace_id.to_string());
        }

        let where_clause = if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        };
        let sql = format!(
            "{SELECT_COLUMNS} WHERE {where_clause} \
             ORDER BY timestamp DESC, id DESC LIMIT {} OFFSET {}",
            query.limit, query.offset
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_record)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Surrounding rows for a target entry: up to `lines / 2` same-service
    /// rows with smaller id, the target, then up to `lines / 2` with greater
    /// id, ascending by id. Empty when the target does not exist.
    pub fn context(&self, target_id: i64, lines: u32) -> Result<Vec<LogRecord>, StoreError> {
        let conn = self.pool.get()?;

        let service: Option<String> = conn
            .query_row(
                "SELECT service FROM logs WHERE id = ?1",
                params![target_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(service) = service else {
            return Ok(Vec::new());
        };

        let half = i64::from(lines / 2);

        let mut entries: Vec<LogRecord> = {
            let sql = format!(
                "{SELECT_COLUMNS} WHERE service = ?1 AND id < ?2 ORDER BY id DESC LIMIT {half}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![service, target_id], row_to_record)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        entries.reverse();

        let target = conn.query_row(
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            params![target_id],
            row_to_record,
        )?;
        entries.push(target);

        let sql = format!(
            "{SELECT_COLUMNS} WHERE service = ?1 AND id > ?2 ORDER BY id ASC LIMIT {half}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![service, target_id], row_to_record)?;
        entries.extend(rows.collect::<Result<Vec<_>, _>>()?);

        Ok(entries)
    }

    /// Distinct non-empty service names in ascending lexical order.
    pub fn services(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT service FROM logs WHERE service != '' ORDER BY service")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete rows with `timestamp < before`. A non-empty delete triggers an
    /// FTS rebuild to reclaim index space. Returns the delete count.
    pub fn delete_before(&self, before: &str) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock();
        let conn = self.pool.get()?;
        let deleted = conn.execute("DELETE FROM logs WHERE timestamp < ?1", params![before])?;
        if deleted > 0 {
            conn.execute("INSERT INTO logs_fts(logs_fts) VALUES ('rebuild')", [])?;
        }
        Ok(deleted)
    }

    /// Database file size in bytes; 0 when the file cannot be read.
    #[must_use]
    pub fn db_size_bytes(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogRecord> {
    Ok(LogRecord {
        id: row.get(0)?,
        service: row.get(1)?,
        level: row.get(2)?,
        timestamp: row.get(3)?,
        trace_id: row.get(4)?,
        message: row.get(5)?,
        raw: row.get(6)?,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
