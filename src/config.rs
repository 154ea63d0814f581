//! Engine configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file (or no
//! file at all) yields [`EngineConfig::default`].
//!
//! ```toml
//! [matching]
//! auto_match = true
//! tie_break = "creation_order"   # or "tightest_fit"
//!
//! [capacity]
//! strict = true
//!
//! [retry]
//! max_attempts = 3
//! backoff_ms = 10
//!
//! [store]
//! initial_capacity = 1024
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matching: MatchingConfig,
    pub capacity: CapacityConfig,
    pub retry: RetryConfig,
    pub store: StoreConfig,
}

/// How auto-matching orders candidates that all have enough capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First sufficient candidate in store-assigned id order
    #[default]
    CreationOrder,
    /// Smallest sufficient remaining capacity, then id order
    TightestFit,
}

/// The `[matching]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Link unlinked donations to a compatible request
    pub auto_match: bool,
    pub tie_break: TieBreak,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            auto_match: true,
            tie_break: TieBreak::CreationOrder,
        }
    }
}

/// The `[capacity]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Check capacity and increment in one conditional update. When off,
    /// the increment is a clamped add and a lost race is absorbed by the
    /// clamp.
    pub strict: bool,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// The `[retry]` section: retries of the post-persistence increment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first; at least 1
    pub max_attempts: u32,
    /// Linear backoff step between attempts
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 10,
        }
    }
}

impl RetryConfig {
    /// Delay before attempt number `attempt` (1-based; the first attempt
    /// has no delay)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt.saturating_sub(1))))
    }
}

/// The `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Records pre-allocated by the in-memory store
    pub initial_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.matching.auto_match);
        assert!(config.capacity.strict);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            [matching]
            tie_break = "tightest_fit"

            [retry]
            backoff_ms = 0
            "#,
        )
        .unwrap();

        assert!(config.matching.auto_match);
        assert_eq!(config.matching.tie_break, TieBreak::TightestFit);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_ms, 0);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = EngineConfig::from_toml_str("[retry]\nmax_attempts = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_tie_break_rejected() {
        let err = EngineConfig::from_toml_str("[matching]\ntie_break = \"random\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load("/nonexistent/hungerlink.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_backoff_is_linear() {
        let retry = RetryConfig { max_attempts: 4, backoff_ms: 5 };
        assert_eq!(retry.backoff(1), Duration::ZERO);
        assert_eq!(retry.backoff(2), Duration::from_millis(5));
        assert_eq!(retry.backoff(4), Duration::from_millis(15));
    }
}
