//! # anacache Core
//!
//! Core types, errors, and traits for the analysis result cache.
//!
//! This crate provides the building blocks shared by every other anacache crate:
//!
//! - **Types**: Cache keys, cache types, and cached entries
//! - **Errors**: A single error enum covering storage, validation, and config failures
//! - **Constants**: Defaults and storage identifiers
//! - **Traits**: The [`CacheStore`] interface storage backends implement
//!
//! ## Example
//!
//! ```rust
//! use anacache_core::{CacheKey, CacheType};
//!
//! let key = CacheKey::new(CacheType::Vulnerability, "nvd.nist.gov", "cpe", "cpe:/a:foo:bar:1.0");
//! assert_eq!(key.target_ref().target, "cpe:/a:foo:bar:1.0");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{CacheError, Result};
pub use traits::*;
pub use types::*;
