//! Cache storage backends.
//!
//! The cache only accelerates reads: every value can be rebuilt from the
//! persistent store, so callers log backend failures instead of surfacing them.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use thiserror::Error;

use super::config::CacheConfig;
use super::keys::glob_matches;
use super::lock::rw_write;

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {message}")]
    Unavailable { message: String },
    #[error("cache command `{command}` failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn command(command: &'static str, message: impl Into<String>) -> Self {
        Self::Command {
            command,
            message: message.into(),
        }
    }
}

/// Key/value store with TTL and glob eviction.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete the named keys; returns how many existed.
    async fn delete_exact(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Delete every key matching `pattern`, where `*` matches any run of characters.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    fn backend_name(&self) -> &'static str;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process LRU cache with per-entry expiry.
pub struct MemoryCache {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        rw_write(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live keys in no particular order.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        rw_write(&self.entries, SOURCE, "keys")
            .iter()
            .filter(|(_, entry)| entry.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => {}
        }
        entries.pop(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        rw_write(&self.entries, SOURCE, "set").put(key.to_string(), entry);
        Ok(())
    }

    async fn delete_exact(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "delete_exact");
        let removed = keys.iter().filter(|key| entries.pop(*key).is_some()).count();
        Ok(removed as u64)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "delete_pattern");
        let matched: Vec<String> = entries
            .iter()
            .filter(|(key, _)| glob_matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matched {
            entries.pop(key);
        }
        Ok(matched.len() as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> MemoryCache {
        MemoryCache::new(&CacheConfig {
            memory_capacity: capacity,
            ..Default::default()
        })
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_then_get() {
        let cache = cache(8);
        cache.set("group_info_G1", "{}", TTL).await.unwrap();
        assert_eq!(cache.get("group_info_G1").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(cache.get("group_info_G2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = cache(8);
        cache
            .set("session_list_U1", "[]", Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(cache.get("session_list_U1").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn delete_exact_counts_existing_keys() {
        let cache = cache(8);
        cache.set("a", "1", TTL).await.unwrap();
        cache.set("b", "2", TTL).await.unwrap();

        let removed = cache
            .delete_exact(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.keys(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn delete_pattern_sweeps_one_family() {
        let cache = cache(8);
        for key in [
            "session_list_U1",
            "session_list_U2",
            "group_session_list_U1",
        ] {
            cache.set(key, "[]", TTL).await.unwrap();
        }

        let removed = cache.delete_pattern("session_list_*").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.keys(), vec!["group_session_list_U1".to_string()]);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let cache = cache(2);
        cache.set("a", "1", TTL).await.unwrap();
        cache.set("b", "2", TTL).await.unwrap();
        cache.get("a").await.unwrap();
        cache.set("c", "3", TTL).await.unwrap();

        assert!(cache.get("a").await.unwrap().is_some());
        assert!(cache.get("b").await.unwrap().is_none());
        assert!(cache.get("c").await.unwrap().is_some());
    }
}
