//! # anacache Store
//!
//! Cache entry storage for the analysis result cache.
//!
//! This crate provides two storage backends:
//!
//! - **Memory**: Concurrent in-memory maps for tests and single-process use
//! - **SQLite**: Durable, indexed storage shared across processes
//!
//! ## Example
//!
//! ```rust,ignore
//! use anacache_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let saved = store.save(CacheEntry::new(&key, now))?;
//!
//! // Every host's result for the same target
//! let all = store.find_by_target(&key.target_ref())?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteConfig, SqliteStore};

// Re-export the trait from core
pub use anacache_core::traits::CacheStore as Store;
