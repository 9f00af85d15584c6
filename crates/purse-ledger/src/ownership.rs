//! Identity to wallet binding
//!
//! An authenticated email owns exactly one wallet. The binding is cached
//! under `owner:{email}` so a hot balance read does not touch storage.

use std::sync::Arc;
use std::time::Duration;

use purse_db::cache::keys;
use purse_db::{BalanceCache, Storage};
use tracing::{debug, warn};

use crate::error::{LedgerError, Result};

#[derive(Clone)]
pub struct Ownership {
    storage: Arc<dyn Storage>,
    cache: Arc<dyn BalanceCache>,
    ttl: Duration,
}

impl Ownership {
    pub fn new(storage: Arc<dyn Storage>, cache: Arc<dyn BalanceCache>, ttl: Duration) -> Self {
        Self {
            storage,
            cache,
            ttl,
        }
    }

    /// Id of the wallet owned by `owner`
    pub async fn owned_wallet_id(&self, owner: &str) -> Result<i64> {
        let key = keys::owner(owner);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match raw.parse::<i64>() {
                Ok(id) => {
                    debug!(owner, wallet_id = id, "Owner binding served from cache");
                    return Ok(id);
                }
                Err(_) => warn!(key = %key, value = %raw, "Ignoring unreadable owner binding"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, falling back to storage"),
        }

        let user = self.storage.find_user_by_email(owner).await?;
        let wallet = self.storage.find_wallet_by_user_id(user.id).await?;

        if let Err(e) = self.cache.set(&key, &wallet.id.to_string(), self.ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }

        Ok(wallet.id)
    }

    /// Require that `wallet_id` is the wallet owned by `owner`
    pub async fn authorize(&self, owner: &str, wallet_id: i64) -> Result<()> {
        let owned = self.owned_wallet_id(owner).await?;
        if owned != wallet_id {
            debug!(owner, wallet_id, owned, "Ownership check rejected");
            return Err(LedgerError::OwnershipViolation { wallet_id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use purse_db::{MemoryCache, MemoryStorage, NewUser, NewWallet};

    async fn fixture() -> (Ownership, Arc<MemoryCache>, i64) {
        let storage = Arc::new(MemoryStorage::new());
        let cache = Arc::new(MemoryCache::new());
        let user = storage
            .create_user(NewUser {
                full_name: "Owner".into(),
                email: "owner@example.com".into(),
                password_hash: "h".into(),
            })
            .await
            .unwrap();
        let wallet = storage.create_wallet(NewWallet::empty(user.id)).await.unwrap();
        let ownership = Ownership::new(storage, cache.clone(), Duration::from_secs(100));
        (ownership, cache, wallet.id)
    }

    #[tokio::test]
    async fn test_binding_is_cached() {
        let (ownership, cache, wallet_id) = fixture().await;
        assert_eq!(ownership.owned_wallet_id("owner@example.com").await.unwrap(), wallet_id);
        assert_eq!(
            cache.get("owner:owner@example.com").await.unwrap(),
            Some(wallet_id.to_string())
        );
    }

    #[tokio::test]
    async fn test_foreign_wallet_rejected() {
        let (ownership, _, wallet_id) = fixture().await;
        ownership.authorize("owner@example.com", wallet_id).await.unwrap();
        assert!(matches!(
            ownership.authorize("owner@example.com", wallet_id + 1).await,
            Err(LedgerError::OwnershipViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_owner() {
        let (ownership, _, wallet_id) = fixture().await;
        assert!(matches!(
            ownership.authorize("ghost@example.com", wallet_id).await,
            Err(LedgerError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_binding_falls_back_to_storage() {
        let (ownership, cache, wallet_id) = fixture().await;
        cache
            .set("owner:owner@example.com", "not-a-number", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(ownership.owned_wallet_id("owner@example.com").await.unwrap(), wallet_id);
    }
}
