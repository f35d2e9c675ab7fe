//! Cache keys.
//!
//! Entries are addressed by a 4-part [`CacheKey`]. The host-agnostic
//! [`TargetRef`] drops `target_host` so callers can see what every upstream
//! source said about one target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Kind of analysis that produced a cached result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheType {
    /// Package repository metadata (latest version, publish date).
    Repository,
    /// Vulnerability lookups against a purl or cpe.
    Vulnerability,
}

impl CacheType {
    /// All cache types, in storage order.
    pub const ALL: [CacheType; 2] = [CacheType::Repository, CacheType::Vulnerability];

    /// Returns the stored/printed name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::Repository => "REPOSITORY",
            CacheType::Vulnerability => "VULNERABILITY",
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim();
        CacheType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(normalized))
            .ok_or_else(|| CacheError::ValidationError(format!("unknown cache type: {s:?}")))
    }
}

/// Host-agnostic lookup key: (cache type, target type, target).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    /// Kind of analysis
    pub cache_type: CacheType,
    /// Sub-classification of the target, e.g. `"purl"` or `"cpe"`
    pub target_type: String,
    /// The analyzed subject
    pub target: String,
}

impl TargetRef {
    /// Creates a new target reference.
    pub fn new(cache_type: CacheType, target_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            cache_type,
            target_type: target_type.into(),
            target: target.into(),
        }
    }

    /// Attaches a host, producing the exact key.
    pub fn with_host(&self, target_host: impl Into<String>) -> CacheKey {
        CacheKey {
            cache_type: self.cache_type,
            target_host: target_host.into(),
            target_type: self.target_type.clone(),
            target: self.target.clone(),
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.cache_type, self.target_type, self.target)
    }
}

/// Exact lookup key: (cache type, target host, target type, target).
///
/// At most one live entry exists per key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Kind of analysis
    pub cache_type: CacheType,
    /// Upstream service that was queried
    pub target_host: String,
    /// Sub-classification of the target, e.g. `"purl"` or `"cpe"`
    pub target_type: String,
    /// The analyzed subject
    pub target: String,
}

impl CacheKey {
    /// Creates a new cache key.
    pub fn new(
        cache_type: CacheType,
        target_host: impl Into<String>,
        target_type: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            cache_type,
            target_host: target_host.into(),
            target_type: target_type.into(),
            target: target.into(),
        }
    }

    /// Projects this key onto its host-agnostic form.
    pub fn target_ref(&self) -> TargetRef {
        TargetRef {
            cache_type: self.cache_type,
            target_type: self.target_type.clone(),
            target: self.target.clone(),
        }
    }

    /// Checks that the key names a real target.
    ///
    /// The cache stores any key; this is for user-facing entry points that
    /// want to reject input by hand. `target_type` and `target` must be
    /// non-blank. `target_host` may be
    /// any string, including empty.
    pub fn validate(&self) -> Result<()> {
        if self.target_type.trim().is_empty() {
            return Err(CacheError::ValidationError("target_type cannot be empty".into()));
        }
        if self.target.trim().is_empty() {
            return Err(CacheError::ValidationError("target cannot be empty".into()));
        }
        Ok(())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}/{}:{}",
            self.cache_type, self.target_host, self.target_type, self.target
        )
    }
}
