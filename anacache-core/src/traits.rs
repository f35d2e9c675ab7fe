//! Common traits for anacache.
//!
//! These traits define the interfaces that different storage backends satisfy,
//! so the cache facade can run over memory or SQLite without change.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{CacheEntry, CacheKey, TargetRef};

// ═══════════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface for cache entry storage and retrieval.
///
/// Implementations might use:
/// - In-memory maps (for testing/single process)
/// - SQLite (for durable, multi-process access)
///
/// All calls are synchronous. Stores provide their own atomicity per call;
/// read-modify-write sequences are serialized by the caller.
pub trait CacheStore: Send + Sync {
    /// Returns the most recent entry stored under `key`, if any.
    fn find(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Returns every entry for `target` across all hosts.
    ///
    /// Ordered by `last_occurrence` descending, then id descending.
    fn find_by_target(&self, target: &TargetRef) -> Result<Vec<CacheEntry>>;

    /// Persists an entry.
    ///
    /// Inserts and assigns an id when `entry.id == 0`, otherwise overwrites the
    /// stored entry with that id. Returns the entry as stored.
    fn save(&self, entry: CacheEntry) -> Result<CacheEntry>;

    /// Removes every entry. Returns the number removed.
    fn delete_all(&self) -> Result<u64>;

    /// Removes entries whose `last_occurrence` is strictly before `threshold`.
    /// Returns the number removed.
    fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64>;

    /// Returns the number of stored entries.
    fn count(&self) -> Result<u64>;
}

impl<S: CacheStore + ?Sized> CacheStore for std::sync::Arc<S> {
    fn find(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        (**self).find(key)
    }

    fn find_by_target(&self, target: &TargetRef) -> Result<Vec<CacheEntry>> {
        (**self).find_by_target(target)
    }

    fn save(&self, entry: CacheEntry) -> Result<CacheEntry> {
        (**self).save(entry)
    }

    fn delete_all(&self) -> Result<u64> {
        (**self).delete_all()
    }

    fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64> {
        (**self).delete_older_than(threshold)
    }

    fn count(&self) -> Result<u64> {
        (**self).count()
    }
}
