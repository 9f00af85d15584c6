//! Balance cache
//!
//! Short-lived string values keyed by wallet id (and owner bindings keyed by
//! email). A miss is `Ok(None)`; an `Err` means the cache itself is unhealthy
//! and callers are expected to carry on without it.

mod memory;
mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{CacheConfig, CacheKind};
use crate::DbResult;

/// Cache key builders
pub mod keys {
    pub const BALANCE: &str = "balance:";
    pub const OWNER: &str = "owner:";

    /// `balance:{wallet_id}`
    pub fn balance(wallet_id: i64) -> String {
        format!("{}{}", BALANCE, wallet_id)
    }

    /// `owner:{email}`, resolves to the id of the wallet the user owns
    pub fn owner(email: &str) -> String {
        format!("{}{}", OWNER, email)
    }
}

/// Default TTLs
pub mod ttl {
    use std::time::Duration;

    pub const BALANCE: Duration = Duration::from_secs(100);
}

#[async_trait]
pub trait BalanceCache: Send + Sync {
    fn kind(&self) -> CacheKind;

    async fn get(&self, key: &str) -> DbResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> DbResult<()>;

    /// Returns whether a live entry was removed
    async fn delete(&self, key: &str) -> DbResult<bool>;
}

/// Cache that never holds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

#[async_trait]
impl BalanceCache for DisabledCache {
    fn kind(&self) -> CacheKind {
        CacheKind::Disabled
    }

    async fn get(&self, _key: &str) -> DbResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> DbResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> DbResult<bool> {
        Ok(false)
    }
}

/// Build the configured cache. The Redis variant pings once and fails if
/// the server cannot be reached.
pub async fn connect_cache(config: &CacheConfig) -> DbResult<Arc<dyn BalanceCache>> {
    let cache: Arc<dyn BalanceCache> = match config.backend {
        CacheKind::Redis => Arc::new(RedisCache::connect(config).await?),
        CacheKind::Memory => Arc::new(MemoryCache::new()),
        CacheKind::Disabled => Arc::new(DisabledCache),
    };
    info!(backend = %config.backend, ttl_secs = config.ttl_secs, "Balance cache ready");
    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(keys::balance(17), "balance:17");
        assert_eq!(keys::owner("a@b.c"), "owner:a@b.c");
        assert_eq!(ttl::BALANCE, Duration::from_secs(100));
    }

    #[tokio::test]
    async fn test_disabled_always_misses() {
        let cache = connect_cache(&CacheConfig {
            backend: CacheKind::Disabled,
            ..Default::default()
        })
        .await
        .unwrap();

        cache.set("balance:1", "10.00", ttl::BALANCE).await.unwrap();
        assert_eq!(cache.get("balance:1").await.unwrap(), None);
        assert!(!cache.delete("balance:1").await.unwrap());
        assert_eq!(cache.kind(), CacheKind::Disabled);
    }
}
