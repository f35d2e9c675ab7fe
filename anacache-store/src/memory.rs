//! In-memory cache store.
//!
//! Fast, thread-safe storage suitable for development, testing,
//! and single-process deployments.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, instrument};

use anacache_core::error::{CacheError, Result};
use anacache_core::traits::CacheStore;
use anacache_core::types::{sort_by_recency, CacheEntry, CacheKey, TargetRef};

/// In-memory cache store.
///
/// Uses concurrent maps for thread-safe access without requiring external
/// synchronization for single calls.
///
/// # Indexing
///
/// Entries are indexed by:
/// - ID: Primary storage
/// - Target (type, target type, target): Bucket of IDs across all hosts,
///   serving both exact and host-agnostic lookups
#[derive(Debug)]
pub struct MemoryStore {
    /// Primary storage: ID → entry
    entries: DashMap<u64, CacheEntry>,
    /// Target index: target → [entry IDs]
    target_index: DashMap<TargetRef, Vec<u64>>,
    /// Next entry ID
    next_id: AtomicU64,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            target_index: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a store with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            target_index: DashMap::with_capacity(capacity),
            next_id: AtomicU64::new(1),
        }
    }

    /// Clears all entries and resets the ID sequence.
    pub fn clear(&self) {
        self.entries.clear();
        self.target_index.clear();
        self.next_id.store(1, Ordering::SeqCst);
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns all entries, most recent first.
    pub fn all_entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sort_by_recency(&mut entries);
        entries
    }

    /// Loads the entries currently indexed under `target`.
    fn bucket(&self, target: &TargetRef) -> Vec<CacheEntry> {
        let ids = match self.target_index.get(target) {
            Some(ids) => ids.clone(),
            None => return Vec::new(),
        };

        ids.into_iter()
            .filter_map(|id| self.entries.get(&id).map(|entry| entry.clone()))
            .collect()
    }

    fn index_insert(&self, target: TargetRef, id: u64) {
        self.target_index
            .entry(target)
            .or_insert_with(Vec::new)
            .push(id);
    }

    fn index_remove(&self, target: &TargetRef, id: u64) {
        if let Some(mut ids) = self.target_index.get_mut(target) {
            ids.retain(|&existing| existing != id);
        }
        self.target_index.remove_if(target, |_, ids| ids.is_empty());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryStore {
    /// Returns the most recent entry for an exact key.
    #[instrument(skip(self), fields(key = %key))]
    fn find(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let found = self
            .bucket(&key.target_ref())
            .into_iter()
            .filter(|entry| entry.matches_key(key))
            .max_by(|a, b| {
                a.last_occurrence
                    .cmp(&b.last_occurrence)
                    .then_with(|| a.id.cmp(&b.id))
            });

        debug!(hit = found.is_some(), "Exact lookup");
        Ok(found)
    }

    /// Returns every host's entry for a target, most recent first.
    #[instrument(skip(self), fields(target = %target))]
    fn find_by_target(&self, target: &TargetRef) -> Result<Vec<CacheEntry>> {
        let mut entries: Vec<CacheEntry> = self
            .bucket(target)
            .into_iter()
            .filter(|entry| entry.matches_target(target))
            .collect();
        sort_by_recency(&mut entries);

        debug!(count = entries.len(), "Retrieved by target");
        Ok(entries)
    }

    #[instrument(skip(self, entry), fields(id = entry.id, key = %entry.key()))]
    fn save(&self, mut entry: CacheEntry) -> Result<CacheEntry> {
        if !entry.is_persisted() {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            entry.id = id;
            self.entries.insert(id, entry.clone());
            self.index_insert(entry.key().target_ref(), id);
            debug!(id, "Inserted entry");
            return Ok(entry);
        }

        let previous_target = {
            let mut slot = self
                .entries
                .get_mut(&entry.id)
                .ok_or(CacheError::EntryNotFound(entry.id))?;
            let previous = slot.value().key().target_ref();
            *slot = entry.clone();
            previous
        };

        let target = entry.key().target_ref();
        if previous_target != target {
            self.index_remove(&previous_target, entry.id);
            self.index_insert(target, entry.id);
        }

        debug!(id = entry.id, "Updated entry");
        Ok(entry)
    }

    #[instrument(skip(self))]
    fn delete_all(&self) -> Result<u64> {
        let ids: Vec<u64> = self.entries.iter().map(|entry| entry.value().id).collect();

        // Entries inserted after the snapshot are kept along with their index slot.
        let mut removed = 0u64;
        for id in ids {
            if let Some((_, entry)) = self.entries.remove(&id) {
                self.index_remove(&entry.key().target_ref(), id);
                removed += 1;
            }
        }

        info!(removed, "Cleared all entries");
        Ok(removed)
    }

    #[instrument(skip(self))]
    fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64> {
        let stale: Vec<u64> = self
            .entries
            .iter()
            .filter(|entry| entry.last_occurrence < threshold)
            .map(|entry| entry.value().id)
            .collect();

        let mut removed = 0u64;
        for id in stale {
            // Re-checked under the shard lock; a concurrent save may have refreshed it.
            if let Some((_, entry)) = self
                .entries
                .remove_if(&id, |_, entry| entry.last_occurrence < threshold)
            {
                self.index_remove(&entry.key().target_ref(), id);
                removed += 1;
            }
        }

        info!(removed, %threshold, "Evicted entries older than threshold");
        Ok(removed)
    }

    fn count(&self) -> Result<u64> {
        Ok(self.entries.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anacache_core::types::CacheType;
    use proptest::prelude::*;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn make_key(host: &str) -> CacheKey {
        CacheKey::new(CacheType::Vulnerability, host, "cpe", "cpe:/a:foo:bar:1.0")
    }

    fn make_entry(host: &str, secs: i64) -> CacheEntry {
        CacheEntry::new(&make_key(host), at(secs))
    }

    #[test]
    fn test_save_assigns_ids() {
        let store = MemoryStore::new();

        let first = store.save(make_entry("nvd.nist.gov", 100)).unwrap();
        let second = store.save(make_entry("cve.circl.lu", 100)).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_find_exact_key() {
        let store = MemoryStore::new();
        let mut entry = make_entry("nvd.nist.gov", 100);
        entry.result = Some(json!({"vulns": []}));
        store.save(entry).unwrap();
        store.save(make_entry("cve.circl.lu", 200)).unwrap();

        let found = store.find(&make_key("nvd.nist.gov")).unwrap().unwrap();
        assert_eq!(found.target_host, "nvd.nist.gov");
        assert_eq!(found.result, Some(json!({"vulns": []})));

        assert!(store.find(&make_key("ossindex.sonatype.org")).unwrap().is_none());
    }

    #[test]
    fn test_find_prefers_most_recent_duplicate() {
        let store = MemoryStore::new();
        store.save(make_entry("nvd.nist.gov", 100)).unwrap();
        let newer = store.save(make_entry("nvd.nist.gov", 300)).unwrap();
        store.save(make_entry("nvd.nist.gov", 200)).unwrap();

        let found = store.find(&make_key("nvd.nist.gov")).unwrap().unwrap();
        assert_eq!(found.id, newer.id);
    }

    #[test]
    fn test_find_by_target_orders_descending() {
        let store = MemoryStore::new();
        store.save(make_entry("nvd.nist.gov", 50)).unwrap();
        store.save(make_entry("cve.circl.lu", 150)).unwrap();
        // Same target string under another cache type stays out
        store
            .save(CacheEntry::new(
                &CacheKey::new(CacheType::Repository, "nvd.nist.gov", "cpe", "cpe:/a:foo:bar:1.0"),
                at(500),
            ))
            .unwrap();

        let all = store.find_by_target(&make_key("any").target_ref()).unwrap();
        let times: Vec<i64> = all.iter().map(|e| e.last_occurrence.timestamp()).collect();
        assert_eq!(times, vec![150, 50]);
    }

    #[test]
    fn test_update_in_place() {
        let store = MemoryStore::new();
        let mut saved = store.save(make_entry("nvd.nist.gov", 100)).unwrap();

        saved.touch(at(200), Some(json!({"vulns": ["CVE-2014-0160"]})));
        store.save(saved.clone()).unwrap();

        assert_eq!(store.len(), 1);
        let found = store.find(&make_key("nvd.nist.gov")).unwrap().unwrap();
        assert_eq!(found, saved);
    }

    #[test]
    fn test_update_unknown_id_fails() {
        let store = MemoryStore::new();
        let mut entry = make_entry("nvd.nist.gov", 100);
        entry.id = 99;

        let err = store.save(entry).unwrap_err();
        assert!(matches!(err, CacheError::EntryNotFound(99)));
    }

    #[test]
    fn test_update_moves_index_when_target_changes() {
        let store = MemoryStore::new();
        let mut saved = store.save(make_entry("nvd.nist.gov", 100)).unwrap();
        saved.target = "cpe:/a:foo:bar:2.0".into();
        store.save(saved).unwrap();

        assert!(store.find_by_target(&make_key("x").target_ref()).unwrap().is_empty());
        let moved = TargetRef::new(CacheType::Vulnerability, "cpe", "cpe:/a:foo:bar:2.0");
        assert_eq!(store.find_by_target(&moved).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_older_than_is_strict() {
        let store = MemoryStore::new();
        store.save(make_entry("a", 50)).unwrap();
        store.save(make_entry("b", 100)).unwrap();
        store.save(make_entry("c", 150)).unwrap();

        let removed = store.delete_older_than(at(100)).unwrap();
        assert_eq!(removed, 1);
        assert!(store.find(&make_key("a")).unwrap().is_none());
        assert!(store.find(&make_key("b")).unwrap().is_some());
        assert!(store.find(&make_key("c")).unwrap().is_some());
    }

    #[test]
    fn test_delete_all() {
        let store = MemoryStore::new();
        store.save(make_entry("a", 50)).unwrap();
        store.save(make_entry("b", 100)).unwrap();

        assert_eq!(store.delete_all().unwrap(), 2);
        assert!(store.is_empty());
        assert!(store.find(&make_key("a")).unwrap().is_none());
        assert!(store.find_by_target(&make_key("a").target_ref()).unwrap().is_empty());
    }

    #[test]
    fn test_clear_resets_ids() {
        let store = MemoryStore::new();
        store.save(make_entry("a", 50)).unwrap();
        store.clear();

        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.save(make_entry("a", 50)).unwrap().id, 1);
    }

    #[test]
    fn test_concurrent_inserts() {
        let store = MemoryStore::new();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    for j in 0..25 {
                        store.save(make_entry(&format!("host-{i}-{j}"), j)).unwrap();
                    }
                });
            }
        });

        assert_eq!(store.len(), 200);
        assert_eq!(store.find_by_target(&make_key("x").target_ref()).unwrap().len(), 200);
    }

    #[test]
    fn test_delete_all_during_inserts_keeps_index_consistent() {
        let store = MemoryStore::new();
        let removed = std::sync::atomic::AtomicU64::new(0);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for j in 0..500 {
                    store.save(make_entry(&format!("host-{j}"), j)).unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    removed.fetch_add(store.delete_all().unwrap(), Ordering::SeqCst);
                }
            });
        });

        let remaining = store.len() as u64;
        assert_eq!(removed.load(Ordering::SeqCst) + remaining, 500);
        let indexed = store.find_by_target(&make_key("x").target_ref()).unwrap();
        assert_eq!(indexed.len() as u64, remaining);
    }

    proptest! {
        #[test]
        fn prop_eviction_keeps_only_recent(
            times in proptest::collection::vec(0i64..1_000, 1..40),
            threshold in 0i64..1_000,
        ) {
            let store = MemoryStore::new();
            for (i, secs) in times.iter().enumerate() {
                store.save(make_entry(&format!("host-{i}"), *secs)).unwrap();
            }

            let expected_removed = times.iter().filter(|&&t| t < threshold).count() as u64;
            prop_assert_eq!(store.delete_older_than(at(threshold)).unwrap(), expected_removed);

            let remaining = store.all_entries();
            prop_assert!(remaining.iter().all(|e| e.last_occurrence >= at(threshold)));
            prop_assert_eq!(remaining.len() as u64, times.len() as u64 - expected_removed);
        }

        #[test]
        fn prop_find_by_target_sorted(times in proptest::collection::vec(0i64..1_000, 0..40)) {
            let store = MemoryStore::new();
            for (i, secs) in times.iter().enumerate() {
                store.save(make_entry(&format!("host-{i}"), *secs)).unwrap();
            }

            let all = store.find_by_target(&make_key("x").target_ref()).unwrap();
            prop_assert_eq!(all.len(), times.len());
            prop_assert!(all.windows(2).all(|w| w[0].last_occurrence >= w[1].last_occurrence));
        }
    }
}
