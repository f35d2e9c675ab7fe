//! Defaults and storage identifiers.

// ═══════════════════════════════════════════════════════════════════════════════
// FRESHNESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default period (seconds) during which a cached result counts as current.
/// 12 hours, matching how often upstream vulnerability sources are re-polled.
pub const DEFAULT_VALIDITY_PERIOD_SECS: u64 = 12 * 60 * 60;

// ═══════════════════════════════════════════════════════════════════════════════
// CONCURRENCY
// ═══════════════════════════════════════════════════════════════════════════════

/// Default number of shards in the upsert lock table.
/// A value of 1 serializes every upsert behind one lock.
pub const DEFAULT_UPSERT_LOCK_SHARDS: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE
// ═══════════════════════════════════════════════════════════════════════════════

/// File name of the default on-disk cache database.
pub const DEFAULT_DB_FILE: &str = "cache.db";

/// Directory (under the user config dir) holding the default database.
pub const DEFAULT_DB_DIR: &str = "anacache";

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ═══════════════════════════════════════════════════════════════════════════════
// ENVIRONMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Environment variable overriding the validity period (seconds).
pub const ENV_VALIDITY_SECS: &str = "ANACACHE_VALIDITY_SECS";

/// Environment variable overriding the upsert lock shard count.
pub const ENV_LOCK_SHARDS: &str = "ANACACHE_LOCK_SHARDS";

/// Environment variable pointing at the SQLite database file.
pub const ENV_DB_PATH: &str = "ANACACHE_DB";
