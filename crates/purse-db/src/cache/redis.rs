use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Config as RedisConfig, Pool as RedisPool, Runtime};
use std::future::Future;
use std::time::Duration;
use tracing::info;

use super::BalanceCache;
use crate::config::{CacheConfig, CacheKind};
use crate::{DbError, DbResult};

/// Redis-backed balance cache
pub struct RedisCache {
    pool: RedisPool,
    op_timeout: Duration,
}

impl RedisCache {
    pub fn new(pool: RedisPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    /// Create the pool and ping the server once
    pub async fn connect(config: &CacheConfig) -> DbResult<Self> {
        info!("Connecting to Redis: {}", config.redis_url_masked());

        let pool = RedisConfig::from_url(&config.redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| DbError::Connection(format!("Redis: {}", e)))?;

        let cache = Self::new(pool, config.op_timeout());
        cache
            .ping()
            .await
            .map_err(|e| DbError::Connection(format!("Redis ping: {}", e)))?;

        info!("Connected to Redis");
        Ok(cache)
    }

    pub async fn ping(&self) -> DbResult<()> {
        self.bounded("PING", async {
            let mut conn = self.pool.get().await?;
            let _: String = deadpool_redis::redis::cmd("PING")
                .query_async(&mut *conn)
                .await?;
            Ok(())
        })
        .await
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| DbError::Timeout(format!("redis {} after {:?}", what, self.op_timeout)))?
    }
}

#[async_trait]
impl BalanceCache for RedisCache {
    fn kind(&self) -> CacheKind {
        CacheKind::Redis
    }

    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        self.bounded("GET", async {
            let mut conn = self.pool.get().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> DbResult<()> {
        // SETEX rejects a zero expiry
        let secs = ttl.as_secs().max(1);
        self.bounded("SET", async {
            let mut conn = self.pool.get().await?;
            conn.set_ex::<_, _, ()>(key, value, secs).await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> DbResult<bool> {
        self.bounded("DEL", async {
            let mut conn = self.pool.get().await?;
            let deleted: i32 = conn.del(key).await?;
            Ok(deleted > 0)
        })
        .await
    }
}
