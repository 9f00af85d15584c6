use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::BalanceCache;
use crate::config::CacheKind;
use crate::DbResult;

/// Stored entries before the first sweep of expired ones
const MIN_SWEEP_AT: usize = 64;

struct Entry {
    value: String,
    expires_at: Instant,
}

struct Entries {
    map: HashMap<String, Entry>,
    /// Size at which the next `set` drops expired entries
    sweep_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            sweep_at: MIN_SWEEP_AT,
        }
    }
}

impl Entries {
    /// Drop expired entries once the map has grown to the threshold. The
    /// threshold then tracks twice the live size, so sweeps stay amortized.
    fn sweep(&mut self, now: Instant) {
        if self.map.len() < self.sweep_at {
            return;
        }
        let before = self.map.len();
        self.map.retain(|_, e| e.expires_at > now);
        self.sweep_at = (self.map.len() * 2).max(MIN_SWEEP_AT);
        tracing::trace!(dropped = before - self.map.len(), "Swept expired cache entries");
    }
}

/// In-process cache with per-entry expiry
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries held in memory, expired or not
    #[cfg(test)]
    fn stored(&self) -> usize {
        self.entries.lock().map.len()
    }
}

#[async_trait]
impl BalanceCache for MemoryCache {
    fn kind(&self) -> CacheKind {
        CacheKind::Memory
    }

    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let live = entries
            .map
            .get(key)
            .map(|e| (e.expires_at > now).then(|| e.value.clone()));

        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                entries.map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> DbResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.sweep(now);
        entries.map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> DbResult<bool> {
        let removed = self.entries.lock().map.remove(key);
        Ok(removed.is_some_and(|e| e.expires_at > Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("balance:1").await.unwrap(), None);

        cache.set("balance:1", "150.00", Duration::from_secs(100)).await.unwrap();
        assert_eq!(cache.get("balance:1").await.unwrap().as_deref(), Some("150.00"));
        assert_eq!(cache.len(), 1);

        assert!(cache.delete("balance:1").await.unwrap());
        assert!(!cache.delete("balance:1").await.unwrap());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("balance:2", "1.00", Duration::from_secs(100)).await.unwrap();

        tokio::time::advance(Duration::from_secs(99)).await;
        assert!(cache.get("balance:2").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("balance:2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let cache = MemoryCache::new();
        cache.set("k", "a", Duration::from_secs(5)).await.unwrap();
        cache.set("k", "b", Duration::from_secs(5)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_swept_on_write() {
        let cache = MemoryCache::new();
        for id in 0..MIN_SWEEP_AT {
            cache
                .set(&format!("balance:{id}"), "1.00", Duration::from_secs(10))
                .await
                .unwrap();
        }
        assert_eq!(cache.stored(), MIN_SWEEP_AT);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.is_empty());
        assert_eq!(cache.stored(), MIN_SWEEP_AT);

        cache.set("balance:live", "2.00", Duration::from_secs(10)).await.unwrap();
        assert_eq!(cache.stored(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_live_entries_survive_sweep() {
        let cache = MemoryCache::new();
        for id in 0..MIN_SWEEP_AT * 2 {
            cache
                .set(&format!("owner:{id}@example.com"), "1", Duration::from_secs(100))
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), MIN_SWEEP_AT * 2);
        assert_eq!(cache.get("owner:0@example.com").await.unwrap().as_deref(), Some("1"));
    }
}
