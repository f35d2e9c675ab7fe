//! Cache configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use anacache_core::constants::{
    DEFAULT_UPSERT_LOCK_SHARDS, DEFAULT_VALIDITY_PERIOD_SECS, ENV_LOCK_SHARDS, ENV_VALIDITY_SECS,
};
use anacache_core::error::{CacheError, Result};

/// Upper bound on the validity period (100 years).
const MAX_VALIDITY_PERIOD_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long (seconds) a cached result counts as current
    pub validity_period_secs: u64,
    /// Shards in the upsert lock table; 1 serializes all upserts
    pub upsert_lock_shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            validity_period_secs: DEFAULT_VALIDITY_PERIOD_SECS,
            upsert_lock_shards: DEFAULT_UPSERT_LOCK_SHARDS,
        }
    }
}

impl CacheConfig {
    /// Reads overrides from `ANACACHE_VALIDITY_SECS` and `ANACACHE_LOCK_SHARDS`.
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            validity_period_secs: env_parse(ENV_VALIDITY_SECS)
                .unwrap_or(defaults.validity_period_secs),
            upsert_lock_shards: env_parse(ENV_LOCK_SHARDS).unwrap_or(defaults.upsert_lock_shards),
        }
    }

    /// One lock for every upsert, regardless of key.
    pub fn global_lock(mut self) -> Self {
        self.upsert_lock_shards = 1;
        self
    }

    /// Sets the validity period.
    pub fn with_validity_period_secs(mut self, secs: u64) -> Self {
        self.validity_period_secs = secs;
        self
    }

    /// Sets the upsert lock shard count.
    pub fn with_lock_shards(mut self, shards: usize) -> Self {
        self.upsert_lock_shards = shards;
        self
    }

    /// Validity period as a signed duration.
    pub fn validity_period(&self) -> Duration {
        Duration::seconds(self.validity_period_secs.min(MAX_VALIDITY_PERIOD_SECS) as i64)
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.upsert_lock_shards == 0 {
            return Err(CacheError::ConfigError(
                "upsert_lock_shards must be at least 1".into(),
            ));
        }
        if self.validity_period_secs > MAX_VALIDITY_PERIOD_SECS {
            return Err(CacheError::ConfigError(format!(
                "validity_period_secs must be at most {MAX_VALIDITY_PERIOD_SECS}, got {}",
                self.validity_period_secs
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.validity_period(), Duration::hours(12));
        assert_eq!(config.upsert_lock_shards, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = CacheConfig::default()
            .with_validity_period_secs(60)
            .global_lock();
        assert_eq!(config.validity_period(), Duration::minutes(1));
        assert_eq!(config.upsert_lock_shards, 1);
    }

    #[test]
    fn test_validate_rejects_zero_shards() {
        let err = CacheConfig::default().with_lock_shards(0).validate().unwrap_err();
        assert!(matches!(err, CacheError::ConfigError(_)));
    }

    #[test]
    fn test_validate_rejects_huge_validity() {
        let config = CacheConfig::default().with_validity_period_secs(u64::MAX);
        assert!(config.validate().is_err());
        // Still yields a usable duration
        assert!(config.validity_period() > Duration::zero());
    }

    #[test]
    fn test_serde_fills_missing_fields() {
        let config: CacheConfig = serde_json::from_str(r#"{"upsert_lock_shards": 4}"#).unwrap();
        assert_eq!(config.upsert_lock_shards, 4);
        assert_eq!(config.validity_period_secs, DEFAULT_VALIDITY_PERIOD_SECS);
    }

    #[test]
    fn test_env_parse_missing() {
        assert_eq!(env_parse::<u64>("ANACACHE_TEST_UNSET_VARIABLE"), None);
    }
}
