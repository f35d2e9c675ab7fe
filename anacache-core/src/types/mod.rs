//! Domain types for anacache.
//!
//! - [`CacheType`]: Which analysis produced a cached result
//! - [`CacheKey`]: Exact 4-part key (type, host, target type, target)
//! - [`TargetRef`]: Host-agnostic 3-part key
//! - [`CacheEntry`]: A stored result with its recency timestamp

mod entry;
mod key;

pub use entry::*;
pub use key::*;
