//! Upsert lock table.
//!
//! Upserts are read-modify-write against the store, so two writers for one
//! key must not interleave or both would insert. Each key hashes to one of
//! N mutex shards; with N = 1 every upsert shares a single lock.

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

use parking_lot::{Mutex, MutexGuard};

use anacache_core::constants::DEFAULT_UPSERT_LOCK_SHARDS;
use anacache_core::error::{CacheError, Result};
use anacache_core::types::CacheKey;

/// Sharded mutex table keyed by [`CacheKey`].
#[derive(Debug)]
pub struct UpsertLocks {
    shards: Box<[Mutex<()>]>,
    hasher: RandomState,
}

impl UpsertLocks {
    /// Creates a table with `shards` locks. Zero is rejected.
    pub fn new(shards: usize) -> Result<Self> {
        if shards == 0 {
            return Err(CacheError::ConfigError(
                "upsert lock table needs at least one shard".into(),
            ));
        }
        Ok(Self::build(shards))
    }

    /// A single lock shared by every key.
    pub fn global() -> Self {
        Self::build(1)
    }

    fn build(shards: usize) -> Self {
        Self {
            shards: (0..shards).map(|_| Mutex::new(())).collect(),
            hasher: RandomState::new(),
        }
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard guarding `key`.
    pub fn shard_for(&self, key: &CacheKey) -> usize {
        if self.shards.len() == 1 {
            return 0;
        }
        (self.hasher.hash_one(key) % self.shards.len() as u64) as usize
    }

    /// Blocks until the shard guarding `key` is free.
    pub fn lock(&self, key: &CacheKey) -> MutexGuard<'_, ()> {
        self.shards[self.shard_for(key)].lock()
    }
}

impl Default for UpsertLocks {
    fn default() -> Self {
        Self::build(DEFAULT_UPSERT_LOCK_SHARDS)
    }
}
