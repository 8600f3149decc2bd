//! Redis cache backend.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use super::store::{CacheError, CacheStore};

const SCAN_BATCH: usize = 500;

/// Cache backed by a multiplexed Redis connection; each call clones the handle.
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|err| CacheError::unavailable(err.to_string()))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| CacheError::unavailable(err.to_string()))?;
        Ok(Self { connection })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

fn command_error(command: &'static str) -> impl FnOnce(redis::RedisError) -> CacheError {
    move |err| CacheError::command(command, err.to_string())
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn();
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(command_error("GET"))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(command_error("SET"))
    }

    async fn delete_exact(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        redis::cmd("DEL")
            .arg(keys)
            .query_async::<_, u64>(&mut conn)
            .await
            .map_err(command_error("DEL"))
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        let mut removed = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(command_error("SCAN"))?;

            if !keys.is_empty() {
                removed += redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<_, u64>(&mut conn)
                    .await
                    .map_err(command_error("DEL"))?;
            }

            if next == 0 {
                return Ok(removed);
            }
            cursor = next;
        }
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(command_error("PING"))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
