//! Cache configuration.
//!
//! Controls the projection cache backend and entry lifetime via `rapport.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECS: u64 = 60 * 60;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    Memory,
    Redis,
}

/// Cache configuration from `rapport.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Read through the cache; when false every read hits the store.
    pub enabled: bool,
    pub backend: CacheBackend,
    /// Connection URL for the redis backend.
    pub redis_url: Option<String>,
    /// Lifetime of a cached projection in seconds.
    pub ttl_secs: u64,
    /// Maximum entries held by the in-process backend.
    pub memory_capacity: usize,
    /// Maximum events per consumption batch.
    pub consume_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            redis_url: None,
            ttl_secs: DEFAULT_TTL_SECS,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            ttl_secs: settings.ttl.as_secs(),
            memory_capacity: settings.memory_capacity.get(),
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.max(1))
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.is_enabled());
        assert_eq!(config.backend, CacheBackend::Memory);
        assert_eq!(config.ttl(), Duration::from_secs(3600));
        assert_eq!(config.memory_capacity, 10_000);
        assert_eq!(config.consume_batch_limit, 100);
    }

    #[test]
    fn zero_limits_are_clamped() {
        let config = CacheConfig {
            ttl_secs: 0,
            memory_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.ttl(), Duration::from_secs(1));
        assert_eq!(config.memory_capacity_non_zero().get(), 1);
    }
}
