//! Cached analysis results.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::key::{CacheKey, CacheType, TargetRef};

/// A cached analysis result for one [`CacheKey`].
///
/// `result` is an opaque JSON document owned by the calling analysis layer;
/// nothing here inspects it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unique identifier (assigned by the store, 0 until persisted)
    pub id: u64,
    /// Kind of analysis
    pub cache_type: CacheType,
    /// Upstream service that was queried
    pub target_host: String,
    /// Sub-classification of the target
    pub target_type: String,
    /// The analyzed subject
    pub target: String,
    /// When this result was last produced or confirmed
    pub last_occurrence: DateTime<Utc>,
    /// Cached analysis output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl CacheEntry {
    /// Creates an unsaved entry for `key` with no payload.
    pub fn new(key: &CacheKey, last_occurrence: DateTime<Utc>) -> Self {
        Self {
            id: 0, // Assigned by store
            cache_type: key.cache_type,
            target_host: key.target_host.clone(),
            target_type: key.target_type.clone(),
            target: key.target.clone(),
            last_occurrence,
            result: None,
        }
    }

    /// Returns the exact key of this entry.
    pub fn key(&self) -> CacheKey {
        CacheKey {
            cache_type: self.cache_type,
            target_host: self.target_host.clone(),
            target_type: self.target_type.clone(),
            target: self.target.clone(),
        }
    }

    /// Returns true once the entry has been persisted.
    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    /// Returns true if this entry is stored under `key`.
    pub fn matches_key(&self, key: &CacheKey) -> bool {
        self.target_host == key.target_host && self.matches_target_parts(key.cache_type, &key.target_type, &key.target)
    }

    /// Returns true if this entry belongs to `target`, on any host.
    pub fn matches_target(&self, target: &TargetRef) -> bool {
        self.matches_target_parts(target.cache_type, &target.target_type, &target.target)
    }

    fn matches_target_parts(&self, cache_type: CacheType, target_type: &str, target: &str) -> bool {
        self.cache_type == cache_type && self.target_type == target_type && self.target == target
    }

    /// Records a fresh occurrence.
    ///
    /// The timestamp is set unconditionally; the payload is replaced only
    /// when one is given.
    pub fn touch(&mut self, last_occurrence: DateTime<Utc>, result: Option<Value>) {
        self.last_occurrence = last_occurrence;
        if let Some(result) = result {
            self.result = Some(result);
        }
    }

    /// Age of the entry relative to `now`. Negative if `last_occurrence` is in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_occurrence)
    }

    /// Returns true if the entry is no older than `validity`.
    pub fn is_current(&self, now: DateTime<Utc>, validity: Duration) -> bool {
        self.age(now) <= validity
    }
}

/// Sorts entries most recent first; ties go to the higher id.
pub fn sort_by_recency(entries: &mut [CacheEntry]) {
    entries.sort_by(|a, b| {
        b.last_occurrence
            .cmp(&a.last_occurrence)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn make_key() -> CacheKey {
        CacheKey::new(CacheType::Vulnerability, "nvd.nist.gov", "cpe", "cpe:/a:foo:bar:1.0")
    }

    #[test]
    fn test_new_entry_unsaved() {
        let entry = CacheEntry::new(&make_key(), at(100));
        assert_eq!(entry.id, 0);
        assert!(!entry.is_persisted());
        assert!(entry.result.is_none());
        assert_eq!(entry.key(), make_key());
    }

    #[test]
    fn test_touch_preserves_payload_when_absent() {
        let mut entry = CacheEntry::new(&make_key(), at(100));
        entry.touch(at(100), Some(json!({"vulns": []})));
        entry.touch(at(200), None);
        assert_eq!(entry.last_occurrence, at(200));
        assert_eq!(entry.result, Some(json!({"vulns": []})));
    }

    #[test]
    fn test_touch_replaces_payload() {
        let mut entry = CacheEntry::new(&make_key(), at(100));
        entry.touch(at(100), Some(json!({"vulns": []})));
        entry.touch(at(50), Some(json!({"vulns": ["CVE-2021-44228"]})));
        // Timestamp is set even when it moves backwards
        assert_eq!(entry.last_occurrence, at(50));
        assert_eq!(entry.result, Some(json!({"vulns": ["CVE-2021-44228"]})));
    }

    #[test]
    fn test_matching() {
        let entry = CacheEntry::new(&make_key(), at(100));
        assert!(entry.matches_key(&make_key()));
        assert!(entry.matches_target(&make_key().target_ref()));

        let other_host = make_key().target_ref().with_host("cve.circl.lu");
        assert!(!entry.matches_key(&other_host));
        assert!(entry.matches_target(&other_host.target_ref()));

        let other_type = CacheKey::new(CacheType::Repository, "nvd.nist.gov", "cpe", "cpe:/a:foo:bar:1.0");
        assert!(!entry.matches_target(&other_type.target_ref()));
    }

    #[test]
    fn test_is_current() {
        let entry = CacheEntry::new(&make_key(), at(1_000));
        let validity = Duration::seconds(60);
        assert!(entry.is_current(at(1_060), validity));
        assert!(!entry.is_current(at(1_061), validity));
        assert!(entry.is_current(at(900), validity));
    }

    #[test]
    fn test_sort_by_recency() {
        let key = make_key();
        let mut entries: Vec<CacheEntry> = [(1, 50), (2, 150), (3, 100), (4, 150)]
            .into_iter()
            .map(|(id, secs)| CacheEntry { id, ..CacheEntry::new(&key, at(secs)) })
            .collect();
        sort_by_recency(&mut entries);
        let ids: Vec<u64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);
    }

    #[test]
    fn test_serde_roundtrip_skips_missing_result() {
        let entry = CacheEntry::new(&make_key(), at(100));
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("result").is_none());
        assert_eq!(json["cache_type"], "VULNERABILITY");
        let back: CacheEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    proptest! {
        #[test]
        fn prop_sort_by_recency_descending(times in proptest::collection::vec(0i64..500, 0..30)) {
            let key = make_key();
            let mut entries: Vec<CacheEntry> = times
                .iter()
                .enumerate()
                .map(|(i, secs)| CacheEntry { id: i as u64 + 1, ..CacheEntry::new(&key, at(*secs)) })
                .collect();
            sort_by_recency(&mut entries);

            prop_assert_eq!(entries.len(), times.len());
            let ordered = entries.windows(2).all(|w| {
                w[0].last_occurrence > w[1].last_occurrence
                    || (w[0].last_occurrence == w[1].last_occurrence && w[0].id > w[1].id)
            });
            prop_assert!(ordered);
        }
    }
}
