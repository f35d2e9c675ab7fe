//! Analysis result cache.
//!
//! Caches component-analysis results per (cache type, host, target type, target)
//! over any [`CacheStore`](anacache_core::CacheStore) backend, with
//! caller-driven eviction by age.

mod cache;
mod config;
mod locks;

pub use cache::{AnalysisCache, CacheStats};
pub use config::CacheConfig;
pub use locks::UpsertLocks;

pub use anacache_core::{CacheEntry, CacheError, CacheKey, CacheStore, CacheType, Result, TargetRef};
