//! Projection cache.
//!
//! Cache-aside storage for the read projections plus the event pipeline that
//! invalidates them after relationship writes commit:
//!
//! - **Keys**: `{family}_{identity}` per projection, swept with `{family}_*`
//! - **Stores**: Redis or an in-process LRU with TTL
//! - **Events**: trigger → queue → plan → best-effort deletes
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "memory"   # or "redis"
//! redis_url = "redis://127.0.0.1/"
//! ttl_seconds = 3600
//! memory_capacity = 10000
//! ```

mod config;
mod consumer;
mod events;
mod keys;
pub(crate) mod lock;
mod planner;
mod redis;
mod store;
mod trigger;

use std::sync::Arc;

pub use config::{CacheBackend, CacheConfig};
pub use consumer::{CacheConsumer, ConsumeReport};
pub use events::{CacheEvent, Epoch, EventKind, EventQueue};
pub use keys::{CacheKey, KeyFamily, glob_matches};
pub use planner::InvalidationPlan;
pub use self::redis::RedisCache;
pub use store::{CacheError, CacheStore, MemoryCache};
pub use trigger::CacheTrigger;

/// Open the configured backend.
pub async fn connect_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::new(config))),
        CacheBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| CacheError::unavailable("cache.redis_url is not set"))?;
            Ok(Arc::new(RedisCache::connect(url).await?))
        }
    }
}

/// Wire queue, consumer and trigger over one store.
pub fn build_trigger(config: &CacheConfig, store: Arc<dyn CacheStore>) -> Arc<CacheTrigger> {
    let queue = Arc::new(EventQueue::new());
    let consumer = Arc::new(CacheConsumer::new(config.clone(), store, queue.clone()));
    Arc::new(CacheTrigger::new(config.clone(), queue, consumer))
}
