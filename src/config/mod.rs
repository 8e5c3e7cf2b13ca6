//! Cache tuning parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest window, in bases, fetched on a cache miss.
pub const DEFAULT_MIN_QUERY_SIZE: u64 = 100_000;

/// Maximum number of resolved intervals kept in the cache.
pub const DEFAULT_MAX_INTERVALS: usize = 10;

/// Viewport count at or above which visibility pruning is skipped.
pub const DEFAULT_VIEWPORT_CHECK_THRESHOLD: usize = 100;

/// Errors produced while loading or validating a [`CacheConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tuning parameters for [`SequenceCache`](crate::SequenceCache).
///
/// Missing fields take their default when deserializing.
///
/// # Examples
///
/// ```
/// use seqcache::CacheConfig;
///
/// let config = CacheConfig::from_json_str(r#"{ "max_intervals": 4 }"#).unwrap();
/// assert_eq!(config.max_intervals, 4);
/// assert_eq!(config.min_query_size, 100_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Misses smaller than this are widened to this many bases, centered on the request.
    pub min_query_size: u64,
    /// Capacity of the cache, in intervals.
    pub max_intervals: usize,
    /// Visibility pruning only runs while fewer viewports than this are tracked.
    pub viewport_check_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_query_size: DEFAULT_MIN_QUERY_SIZE,
            max_intervals: DEFAULT_MAX_INTERVALS,
            viewport_check_threshold: DEFAULT_VIEWPORT_CHECK_THRESHOLD,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_query_size(mut self, bases: u64) -> Self {
        self.min_query_size = bases;
        self
    }

    pub fn with_max_intervals(mut self, max: usize) -> Self {
        self.max_intervals = max;
        self
    }

    pub fn with_viewport_check_threshold(mut self, threshold: usize) -> Self {
        self.viewport_check_threshold = threshold;
        self
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed JSON and
    /// [`ConfigError::Invalid`] if a value fails [`CacheConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_query_size == 0 {
            return Err(ConfigError::Invalid(
                "min_query_size must be at least 1".into(),
            ));
        }
        if self.max_intervals == 0 {
            return Err(ConfigError::Invalid("max_intervals must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = CacheConfig::default();
        assert_eq!(c.min_query_size, 100_000);
        assert_eq!(c.max_intervals, 10);
        assert_eq!(c.viewport_check_threshold, 100);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn builder_overrides() {
        let c = CacheConfig::new()
            .with_min_query_size(50)
            .with_max_intervals(3)
            .with_viewport_check_threshold(2);
        assert_eq!((c.min_query_size, c.max_intervals, c.viewport_check_threshold), (50, 3, 2));
    }

    #[test]
    fn json_fills_missing_fields() {
        let c = CacheConfig::from_json_str(r#"{"min_query_size": 1000}"#).unwrap();
        assert_eq!(c.min_query_size, 1000);
        assert_eq!(c.max_intervals, DEFAULT_MAX_INTERVALS);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = CacheConfig::from_json_str(r#"{"max_intervals": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(CacheConfig::new().with_min_query_size(0).validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = CacheConfig::from_json_str("{max_intervals").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
