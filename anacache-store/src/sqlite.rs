//! SQLite cache store.
//!
//! Entries live in a single table with a composite index for key lookups
//! and a B-tree index on `last_occurrence` for range eviction. Timestamps
//! are stored as Unix nanoseconds, which covers 1677 through 2262.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, instrument};

use anacache_core::constants::{DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DB_DIR, DEFAULT_DB_FILE};
use anacache_core::error::{CacheError, Result};
use anacache_core::traits::CacheStore;
use anacache_core::types::{CacheEntry, CacheKey, CacheType, TargetRef};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS component_analysis_cache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cache_type TEXT NOT NULL,
        target_host TEXT NOT NULL,
        target_type TEXT NOT NULL,
        target TEXT NOT NULL,
        last_occurrence INTEGER NOT NULL,
        result TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_cac_target
        ON component_analysis_cache(cache_type, target_type, target, target_host);
    CREATE INDEX IF NOT EXISTS idx_cac_last_occurrence
        ON component_analysis_cache(last_occurrence);
"#;

const NANOS_PER_SEC: i64 = 1_000_000_000;

const SELECT_COLUMNS: &str =
    "SELECT id, cache_type, target_host, target_type, target, last_occurrence, result \
     FROM component_analysis_cache";

/// SQLite store configuration.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Enable WAL mode so readers don't block the writer
    pub wal_mode: bool,
    /// How long a statement waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(DEFAULT_DB_DIR);
        path.push(DEFAULT_DB_FILE);

        Self {
            path,
            wal_mode: true,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl SqliteConfig {
    /// Default configuration pointing at `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// SQLite-backed cache store.
///
/// The connection is guarded by a mutex, so every call is a single
/// serialized statement against the database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens or creates a cache database.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!(path = %config.path.display(), "Opening cache database");

        let conn = Connection::open(&config.path).map_err(db_err)?;
        conn.busy_timeout(config.busy_timeout).map_err(db_err)?;

        if config.wal_mode {
            let mode: String = conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                .map_err(db_err)?;
            debug!(journal_mode = %mode, "Journal mode set");
        }

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(config.path.clone()),
        };
        store.init_schema()?;

        Ok(store)
    }

    /// Creates an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;

        let store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.init_schema()?;

        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(SCHEMA).map_err(db_err)
    }

    /// Returns the database path, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl CacheStore for SqliteStore {
    #[instrument(skip(self), fields(key = %key))]
    fn find(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let sql = format!(
            "{SELECT_COLUMNS} \
             WHERE cache_type = ?1 AND target_host = ?2 AND target_type = ?3 AND target = ?4 \
             ORDER BY last_occurrence DESC, id DESC LIMIT 1"
        );

        let raw = self
            .conn
            .lock()
            .query_row(
                &sql,
                params![key.cache_type.as_str(), key.target_host, key.target_type, key.target],
                RawEntry::from_row,
            )
            .optional()
            .map_err(db_err)?;

        debug!(hit = raw.is_some(), "Exact lookup");
        raw.map(RawEntry::into_entry).transpose()
    }

    #[instrument(skip(self), fields(target = %target))]
    fn find_by_target(&self, target: &TargetRef) -> Result<Vec<CacheEntry>> {
        let sql = format!(
            "{SELECT_COLUMNS} \
             WHERE cache_type = ?1 AND target_type = ?2 AND target = ?3 \
             ORDER BY last_occurrence DESC, id DESC"
        );

        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&sql).map_err(db_err)?;
            let rows = stmt
                .query_map(
                    params![target.cache_type.as_str(), target.target_type, target.target],
                    RawEntry::from_row,
                )
                .map_err(db_err)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(db_err)?
        };

        debug!(count = rows.len(), "Retrieved by target");
        rows.into_iter().map(RawEntry::into_entry).collect()
    }

    #[instrument(skip(self, entry), fields(id = entry.id, key = %entry.key()))]
    fn save(&self, mut entry: CacheEntry) -> Result<CacheEntry> {
        let nanos = to_nanos(entry.last_occurrence)?;
        let result = entry.result.as_ref().map(serde_json::to_string).transpose()?;
        let conn = self.conn.lock();

        if entry.is_persisted() {
            let changed = conn
                .execute(
                    "UPDATE component_analysis_cache \
                     SET cache_type = ?1, target_host = ?2, target_type = ?3, target = ?4, \
                         last_occurrence = ?5, result = ?6 \
                     WHERE id = ?7",
                    params![
                        entry.cache_type.as_str(),
                        entry.target_host,
                        entry.target_type,
                        entry.target,
                        nanos,
                        result,
                        entry.id as i64,
                    ],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(CacheError::EntryNotFound(entry.id));
            }
            debug!(id = entry.id, "Updated entry");
        } else {
            conn.execute(
                "INSERT INTO component_analysis_cache \
                 (cache_type, target_host, target_type, target, last_occurrence, result) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.cache_type.as_str(),
                    entry.target_host,
                    entry.target_type,
                    entry.target,
                    nanos,
                    result,
                ],
            )
            .map_err(db_err)?;
            entry.id = conn.last_insert_rowid() as u64;
            debug!(id = entry.id, "Inserted entry");
        }

        Ok(entry)
    }

    #[instrument(skip(self))]
    fn delete_all(&self) -> Result<u64> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM component_analysis_cache", [])
            .map_err(db_err)?;

        info!(removed, "Cleared all entries");
        Ok(removed as u64)
    }

    #[instrument(skip(self))]
    fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64> {
        let removed = self
            .conn
            .lock()
            .execute(
                "DELETE FROM component_analysis_cache WHERE last_occurrence < ?1",
                params![threshold_nanos(threshold)],
            )
            .map_err(db_err)?;

        info!(removed, %threshold, "Evicted entries older than threshold");
        Ok(removed as u64)
    }

    fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM component_analysis_cache", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(count as u64)
    }
}

/// Row as read from SQLite, before domain decoding.
struct RawEntry {
    id: i64,
    cache_type: String,
    target_host: String,
    target_type: String,
    target: String,
    last_occurrence: i64,
    result: Option<String>,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            cache_type: row.get(1)?,
            target_host: row.get(2)?,
            target_type: row.get(3)?,
            target: row.get(4)?,
            last_occurrence: row.get(5)?,
            result: row.get(6)?,
        })
    }

    fn into_entry(self) -> Result<CacheEntry> {
        Ok(CacheEntry {
            id: self.id as u64,
            cache_type: self.cache_type.parse::<CacheType>()?,
            target_host: self.target_host,
            target_type: self.target_type,
            target: self.target,
            last_occurrence: from_nanos(self.last_occurrence)?,
            result: self.result.as_deref().map(serde_json::from_str).transpose()?,
        })
    }
}

fn db_err(e: rusqlite::Error) -> CacheError {
    CacheError::StorageError(e.to_string())
}

fn to_nanos(ts: DateTime<Utc>) -> Result<i64> {
    ts.timestamp_nanos_opt()
        .ok_or(CacheError::InvalidTimestamp(ts.timestamp()))
}

fn from_nanos(nanos: i64) -> Result<DateTime<Utc>> {
    let secs = nanos.div_euclid(NANOS_PER_SEC);
    let subsec = nanos.rem_euclid(NANOS_PER_SEC) as u32;
    DateTime::from_timestamp(secs, subsec).ok_or(CacheError::InvalidTimestamp(secs))
}

/// Eviction bound for `threshold`.
///
/// Thresholds outside the storable range are clamped to its ends.
fn threshold_nanos(threshold: DateTime<Utc>) -> i64 {
    threshold.timestamp_nanos_opt().unwrap_or(if threshold.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}
