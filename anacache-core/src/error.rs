//! Error types for anacache.
//!
//! A lookup miss is never an error; it is `Ok(None)` or an empty `Vec`.
//! Everything here is fatal for the operation that raised it.

use thiserror::Error;

/// Result type alias using `CacheError`.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Main error type for all cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The storage backend failed (connectivity, constraint, query).
    #[error("Storage error: {0}")]
    StorageError(String),

    /// An update referenced an entry id the store does not hold.
    #[error("Cache entry not found: {0}")]
    EntryNotFound(u64),

    /// A stored timestamp is outside the representable range.
    #[error("Invalid timestamp: {0} ms")]
    InvalidTimestamp(i64),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl CacheError {
    /// Returns true if this error came from the storage backend.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            CacheError::StorageError(_)
                | CacheError::EntryNotFound(_)
                | CacheError::InvalidTimestamp(_)
                | CacheError::IoError(_)
        )
    }

    /// Returns true if this is a validation error.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            CacheError::ValidationError(_) | CacheError::ConfigError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::EntryNotFound(42);
        assert!(err.to_string().contains("42"));

        let err = CacheError::InvalidTimestamp(-1);
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CacheError::StorageError("locked".into()).is_storage_error());
        assert!(CacheError::EntryNotFound(1).is_storage_error());
        assert!(!CacheError::ValidationError("empty".into()).is_storage_error());

        assert!(CacheError::ValidationError("empty".into()).is_validation_error());
        assert!(CacheError::ConfigError("zero shards".into()).is_validation_error());
        assert!(!CacheError::InternalError("bug".into()).is_validation_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid");
        let cache_result: Result<serde_json::Value> = json_result.map_err(CacheError::from);
        assert!(matches!(cache_result, Err(CacheError::JsonError(_))));
    }
}
