//! The analysis result cache facade.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use anacache_core::error::{CacheError, Result};
use anacache_core::traits::CacheStore;
use anacache_core::types::{CacheEntry, CacheKey, TargetRef};

use crate::config::CacheConfig;
use crate::locks::UpsertLocks;

/// Keyed cache of analysis results over a [`CacheStore`].
///
/// Reads and evictions go straight to the store. Upserts hold the lock
/// shard for their key for the whole find-modify-save sequence, so a key
/// never gains a second entry.
pub struct AnalysisCache<S> {
    store: S,
    locks: UpsertLocks,
    config: CacheConfig,
}

impl<S: CacheStore> AnalysisCache<S> {
    /// Creates a cache with the default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: UpsertLocks::default(),
            config: CacheConfig::default(),
        }
    }

    /// Creates a cache with a custom configuration.
    pub fn with_config(store: S, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            locks: UpsertLocks::new(config.upsert_lock_shards)?,
            config,
        })
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the most recent entry for `key`, or `None` on a miss.
    pub fn get_latest(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.store.find(key)
    }

    /// Returns every host's entry for `target`, most recent first.
    pub fn get_all(&self, target: &TargetRef) -> Result<Vec<CacheEntry>> {
        self.store.find_by_target(target)
    }

    /// Records a result for `key`.
    ///
    /// Creates the entry on first use. `last_occurrence` is always
    /// overwritten; the stored payload is replaced only when `result` is
    /// `Some`. An entry evicted between the lookup and the write is
    /// recreated.
    #[instrument(skip(self, result), fields(key = %key, has_result = result.is_some()))]
    pub fn upsert(
        &self,
        key: &CacheKey,
        last_occurrence: DateTime<Utc>,
        result: Option<Value>,
    ) -> Result<()> {
        let _guard = self.locks.lock(key);

        let mut entry = match self.store.find(key)? {
            Some(existing) => existing,
            None => CacheEntry::new(key, last_occurrence),
        };
        entry.touch(last_occurrence, result);

        let saved = match self.store.save(entry.clone()) {
            Err(CacheError::EntryNotFound(id)) => {
                debug!(id, "Entry evicted during upsert, reinserting");
                entry.id = 0;
                self.store.save(entry)?
            }
            saved => saved?,
        };
        debug!(id = saved.id, "Upserted entry");
        Ok(())
    }

    /// Removes every entry. Returns the number removed.
    pub fn evict_all(&self) -> Result<u64> {
        let removed = self.store.delete_all()?;
        info!(removed, "Cache cleared");
        Ok(removed)
    }

    /// Removes entries last seen strictly before `threshold`. Returns the number removed.
    pub fn evict_older_than(&self, threshold: DateTime<Utc>) -> Result<u64> {
        self.store.delete_older_than(threshold)
    }

    /// Returns true if `key` has an entry no older than the validity period.
    pub fn is_current(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.get_current(key, now)?.is_some())
    }

    /// Like [`get_latest`](Self::get_latest), but treats stale entries as a miss.
    pub fn get_current(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let validity = self.config.validity_period();
        Ok(self
            .get_latest(key)?
            .filter(|entry| entry.is_current(now, validity)))
    }

    /// Removes entries that fell out of the validity period as of `now`.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        match now.checked_sub_signed(self.config.validity_period()) {
            Some(threshold) => self.evict_older_than(threshold),
            // Nothing can be older than the earliest representable time
            None => Ok(0),
        }
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats {
            entries: self.store.count()?,
            validity_period_secs: self.config.validity_period_secs,
            lock_shards: self.locks.shard_count(),
        })
    }
}

/// Cache statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Stored entries
    pub entries: u64,
    /// Configured validity period in seconds
    pub validity_period_secs: u64,
    /// Shards in the upsert lock table
    pub lock_shards: usize,
}
