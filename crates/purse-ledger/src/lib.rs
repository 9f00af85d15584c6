//! Purse Ledger - balance operations on per-user wallets
//!
//! The ledger is:
//! - Owner-checked (every read and mutation names the caller's email)
//! - Cache-aside on reads, cache-refreshing on writes
//! - Serialized per wallet, with an optimistic version check on persist
//!
//! # Invariants
//!
//! 1. No negative balances, in storage or in the cache
//! 2. Amounts are strictly positive
//! 3. A failed operation leaves the wallet untouched
//! 4. The cache is an accelerator only; its failures never fail a request

pub mod error;
pub mod ownership;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use purse_db::cache::{keys, ttl};
use purse_db::{
    BalanceCache, CacheKind, DbError, NewUser, Storage, StorageKind, User, UserWallet, Wallet,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

pub use error::{LedgerError, Result};
pub use ownership::Ownership;

/// Tuning for the ledger
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Lifetime of cached balances and owner bindings
    pub cache_ttl: Duration,
    /// Persist attempts per mutation before a version conflict is surfaced
    pub max_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cache_ttl: ttl::BALANCE,
            max_attempts: 3,
        }
    }
}

/// Where a balance read was answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceSource {
    Cache,
    Store,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceView {
    pub wallet_id: i64,
    pub balance: Decimal,
    pub source: BalanceSource,
}

/// Registration input. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

/// A freshly opened account
#[derive(Debug, Clone)]
pub struct Account {
    pub user: User,
    pub wallet: Wallet,
}

/// Snapshot of the backends behind the ledger
#[derive(Debug, Clone, Serialize)]
pub struct LedgerHealth {
    pub storage: StorageKind,
    pub cache: CacheKind,
    pub cache_ok: bool,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Credit,
    Debit,
}

/// The Purse ledger
///
/// Cheap to clone; all clones share the same backends and wallet locks.
#[derive(Clone)]
pub struct Ledger {
    storage: Arc<dyn Storage>,
    cache: Arc<dyn BalanceCache>,
    ownership: Ownership,
    config: LedgerConfig,
    /// One mutex per wallet id, held across load, compute and persist.
    /// Entries only live while some task holds or waits on them.
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

/// Exclusive hold on one wallet; drops the map entry when nobody else wants it
struct WalletGuard<'a> {
    locks: &'a DashMap<i64, Arc<Mutex<()>>>,
    wallet_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for WalletGuard<'_> {
    fn drop(&mut self) {
        // Release first so the map holds the only remaining reference
        drop(self.guard.take());
        self.locks
            .remove_if(&self.wallet_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl Ledger {
    pub fn new(
        storage: Arc<dyn Storage>,
        cache: Arc<dyn BalanceCache>,
        config: LedgerConfig,
    ) -> Self {
        let ownership = Ownership::new(storage.clone(), cache.clone(), config.cache_ttl);
        Self {
            storage,
            cache,
            ownership,
            config,
            locks: Arc::new(DashMap::new()),
        }
    }

    // =========================================================================
    // Balance Operations
    // =========================================================================

    /// Read the balance of a wallet owned by `owner`
    pub async fn balance(&self, owner: &str, wallet_id: i64) -> Result<BalanceView> {
        self.ownership.authorize(owner, wallet_id).await?;

        let key = keys::balance(wallet_id);
        match self.cache.get(&key).await {
            Ok(Some(raw)) => match raw.parse::<Decimal>() {
                Ok(balance) => {
                    debug!(wallet_id, %balance, "Balance cache hit");
                    return Ok(BalanceView {
                        wallet_id,
                        balance,
                        source: BalanceSource::Cache,
                    });
                }
                Err(_) => warn!(key = %key, value = %raw, "Ignoring unreadable cached balance"),
            },
            Ok(None) => debug!(wallet_id, "Balance cache miss"),
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, falling back to storage"),
        }

        // A writer must not land between this load and the cache fill
        let _guard = self.lock_wallet(wallet_id).await;
        let wallet = self.storage.find_wallet_by_id(wallet_id).await?;
        self.remember_balance(wallet_id, wallet.balance).await;

        Ok(BalanceView {
            wallet_id,
            balance: wallet.balance,
            source: BalanceSource::Store,
        })
    }

    /// Add `amount` to a wallet owned by `owner`, returning the new balance
    pub async fn credit(&self, owner: &str, wallet_id: i64, amount: Decimal) -> Result<Decimal> {
        self.apply(owner, wallet_id, amount, Direction::Credit).await
    }

    /// Take `amount` from a wallet owned by `owner`, returning the new balance.
    /// Fails without touching the wallet if the balance would go negative.
    pub async fn debit(&self, owner: &str, wallet_id: i64, amount: Decimal) -> Result<Decimal> {
        self.apply(owner, wallet_id, amount, Direction::Debit).await
    }

    async fn apply(
        &self,
        owner: &str,
        wallet_id: i64,
        amount: Decimal,
        direction: Direction,
    ) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("Amount must be greater than zero"));
        }

        self.ownership.authorize(owner, wallet_id).await?;

        let _guard = self.lock_wallet(wallet_id).await;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut wallet = self.storage.find_wallet_by_id(wallet_id).await?;
            wallet.balance = next_balance(wallet.balance, amount, direction)?;
            wallet.updated_at = Utc::now();

            match self.storage.update_wallet(&wallet).await {
                Ok(saved) => {
                    info!(
                        wallet_id,
                        op = ?direction,
                        %amount,
                        balance = %saved.balance,
                        "Wallet updated"
                    );
                    self.remember_balance(wallet_id, saved.balance).await;
                    return Ok(saved.balance);
                }
                Err(DbError::Conflict { .. }) if attempt < self.config.max_attempts => {
                    debug!(wallet_id, attempt, "Version conflict, reloading wallet");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn lock_wallet(&self, wallet_id: i64) -> WalletGuard<'_> {
        let lock = self.locks.entry(wallet_id).or_default().clone();
        WalletGuard {
            locks: &self.locks,
            wallet_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    async fn remember_balance(&self, wallet_id: i64, balance: Decimal) {
        let key = keys::balance(wallet_id);
        if let Err(e) = self
            .cache
            .set(&key, &balance.to_string(), self.config.cache_ttl)
            .await
        {
            warn!(key = %key, error = %e, "Cache write failed, evicting");
            // A stale entry would outlive the write; try to drop it
            if let Err(e) = self.cache.delete(&key).await {
                warn!(key = %key, error = %e, "Cache delete failed");
            }
        }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Register a user and open its single, empty wallet. Either both are
    /// stored or neither is.
    pub async fn open_account(&self, account: NewAccount) -> Result<Account> {
        let (user, wallet) = self
            .storage
            .create_account(NewUser {
                full_name: account.full_name,
                email: account.email,
                password_hash: account.password_hash,
            })
            .await?;

        info!(user_id = user.id, wallet_id = wallet.id, "Account opened");
        Ok(Account { user, wallet })
    }

    /// Look up a user by email, for credential checks
    pub async fn find_user(&self, email: &str) -> Result<User> {
        Ok(self.storage.find_user_by_email(email).await?)
    }

    /// All users that own a wallet, with that wallet's balance
    pub async fn accounts(&self) -> Result<Vec<UserWallet>> {
        Ok(self.storage.list_users_with_wallets().await?)
    }

    pub async fn wallets(&self) -> Result<Vec<Wallet>> {
        Ok(self.storage.list_wallets().await?)
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Report the backends in use and whether the cache answers
    pub async fn health(&self) -> LedgerHealth {
        let key = "health:check";
        let cache_ok = match self.cache.set(key, "ok", Duration::from_secs(5)).await {
            Ok(()) => self.cache.get(key).await.is_ok(),
            Err(e) => {
                warn!(error = %e, "Cache health check failed");
                false
            }
        };

        LedgerHealth {
            storage: self.storage.kind(),
            cache: self.cache.kind(),
            cache_ok,
        }
    }
}

fn next_balance(current: Decimal, amount: Decimal, direction: Direction) -> Result<Decimal> {
    match direction {
        Direction::Credit => current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::invalid_amount("Balance overflow")),
        Direction::Debit => {
            if amount > current {
                return Err(LedgerError::InsufficientBalance {
                    available: current,
                    requested: amount,
                });
            }
            Ok(current - amount)
        }
    }
}
