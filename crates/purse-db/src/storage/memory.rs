//! In-process storage backend

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{ensure_non_negative, wallet_not_found, wallet_of_user_not_found, Storage};
use crate::config::StorageKind;
use crate::models::{NewUser, NewWallet, SeedReport, User, UserWallet, Wallet};
use crate::seed::SeedFixture;
use crate::{DbError, DbResult};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    wallets: BTreeMap<i64, Wallet>,
    next_user_id: i64,
    next_wallet_id: i64,
}

impl Tables {
    fn insert_user(&mut self, new: NewUser) -> DbResult<User> {
        if self.users.values().any(|u| u.email == new.email) {
            return Err(DbError::Duplicate(format!(
                "Email {} already exists",
                new.email
            )));
        }

        self.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: self.next_user_id,
            uuid: Uuid::new_v4(),
            full_name: new.full_name,
            email: new.email,
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn insert_wallet(&mut self, new: NewWallet) -> DbResult<Wallet> {
        ensure_non_negative(new.balance)?;
        if !self.users.contains_key(&new.user_id) {
            return Err(DbError::UserNotFound(format!("id {}", new.user_id)));
        }
        if self.wallets.values().any(|w| w.user_id == new.user_id) {
            return Err(DbError::Duplicate(format!(
                "User {} already owns a wallet",
                new.user_id
            )));
        }

        self.next_wallet_id += 1;
        let now = Utc::now();
        let wallet = Wallet {
            id: self.next_wallet_id,
            uuid: Uuid::new_v4(),
            user_id: new.user_id,
            balance: new.balance,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }
}

/// Volatile backend: ordered maps behind a lock, gone on restart
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Memory
    }

    async fn find_wallet_by_id(&self, id: i64) -> DbResult<Wallet> {
        self.tables
            .read()
            .wallets
            .get(&id)
            .cloned()
            .ok_or_else(|| wallet_not_found(id))
    }

    async fn find_wallet_by_user_id(&self, user_id: i64) -> DbResult<Wallet> {
        self.tables
            .read()
            .wallets
            .values()
            .find(|w| w.user_id == user_id)
            .cloned()
            .ok_or_else(|| wallet_of_user_not_found(user_id))
    }

    async fn list_wallets(&self) -> DbResult<Vec<Wallet>> {
        Ok(self.tables.read().wallets.values().cloned().collect())
    }

    async fn find_user_by_email(&self, email: &str) -> DbResult<User> {
        self.tables
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| DbError::UserNotFound(email.to_string()))
    }

    async fn list_users_with_wallets(&self) -> DbResult<Vec<UserWallet>> {
        let tables = self.tables.read();
        let joined = tables
            .users
            .values()
            .filter_map(|user| {
                tables
                    .wallets
                    .values()
                    .find(|w| w.user_id == user.id)
                    .map(|wallet| UserWallet::join(user, wallet))
            })
            .collect();
        Ok(joined)
    }

    async fn create_user(&self, user: NewUser) -> DbResult<User> {
        self.tables.write().insert_user(user)
    }

    async fn create_wallet(&self, wallet: NewWallet) -> DbResult<Wallet> {
        self.tables.write().insert_wallet(wallet)
    }

    async fn create_account(&self, user: NewUser) -> DbResult<(User, Wallet)> {
        let mut tables = self.tables.write();
        let user = tables.insert_user(user)?;
        match tables.insert_wallet(NewWallet::empty(user.id)) {
            Ok(wallet) => Ok((user, wallet)),
            Err(e) => {
                tables.users.remove(&user.id);
                Err(e)
            }
        }
    }

    async fn update_wallet(&self, wallet: &Wallet) -> DbResult<Wallet> {
        ensure_non_negative(wallet.balance)?;

        let mut tables = self.tables.write();
        let stored = tables
            .wallets
            .get_mut(&wallet.id)
            .ok_or_else(|| wallet_not_found(wallet.id))?;

        if stored.version != wallet.version {
            return Err(DbError::Conflict {
                wallet_id: wallet.id,
            });
        }

        stored.balance = wallet.balance;
        stored.updated_at = wallet.updated_at;
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn delete_wallet(&self, id: i64) -> DbResult<()> {
        self.tables
            .write()
            .wallets
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| wallet_not_found(id))
    }

    async fn open(&self) -> DbResult<()> {
        Ok(())
    }

    async fn close(&self) -> DbResult<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> DbResult<()> {
        Ok(())
    }

    async fn seed(&self, fixtures: &[SeedFixture]) -> DbResult<SeedReport> {
        let mut tables = self.tables.write();
        let mut report = SeedReport::default();

        if !tables.users.is_empty() || !tables.wallets.is_empty() {
            return Ok(report);
        }

        for fixture in fixtures {
            let user = tables.insert_user(fixture.user.clone())?;
            report.users += 1;
            tables.insert_wallet(NewWallet {
                user_id: user.id,
                balance: fixture.balance,
            })?;
            report.wallets += 1;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::demo_fixtures;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            full_name: "Test User".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn test_user_and_wallet_roundtrip() {
        let store = MemoryStorage::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        let wallet = store
            .create_wallet(NewWallet {
                user_id: user.id,
                balance: dec!(100.00),
            })
            .await
            .unwrap();

        assert_eq!(store.find_user_by_email("a@example.com").await.unwrap().id, user.id);
        assert_eq!(store.find_wallet_by_id(wallet.id).await.unwrap().balance, dec!(100.00));
        assert_eq!(store.find_wallet_by_user_id(user.id).await.unwrap().id, wallet.id);
    }

    #[tokio::test]
    async fn test_create_account_is_all_or_nothing() {
        let store = MemoryStorage::new();
        let (user, wallet) = store.create_account(new_user("acct@example.com")).await.unwrap();
        assert_eq!(wallet.user_id, user.id);
        assert_eq!(wallet.balance, Decimal::ZERO);

        assert!(matches!(
            store.create_account(new_user("acct@example.com")).await,
            Err(DbError::Duplicate(_))
        ));
        assert_eq!(store.list_users_with_wallets().await.unwrap().len(), 1);
        assert_eq!(store.list_wallets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_entities() {
        let store = MemoryStorage::new();
        assert!(matches!(
            store.find_user_by_email("nobody@example.com").await,
            Err(DbError::UserNotFound(_))
        ));
        assert!(matches!(store.find_wallet_by_id(42).await, Err(DbError::WalletNotFound(_))));
        assert!(matches!(store.find_wallet_by_user_id(42).await, Err(DbError::WalletNotFound(_))));
        assert!(matches!(store.delete_wallet(42).await, Err(DbError::WalletNotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStorage::new();
        store.create_user(new_user("dup@example.com")).await.unwrap();
        assert!(matches!(
            store.create_user(new_user("dup@example.com")).await,
            Err(DbError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_one_wallet_per_user() {
        let store = MemoryStorage::new();
        let user = store.create_user(new_user("one@example.com")).await.unwrap();
        store.create_wallet(NewWallet::empty(user.id)).await.unwrap();
        assert!(matches!(
            store.create_wallet(NewWallet::empty(user.id)).await,
            Err(DbError::Duplicate(_))
        ));
        assert!(matches!(
            store.create_wallet(NewWallet::empty(999)).await,
            Err(DbError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_checks_version() {
        let store = MemoryStorage::new();
        let user = store.create_user(new_user("v@example.com")).await.unwrap();
        let wallet = store.create_wallet(NewWallet::empty(user.id)).await.unwrap();

        let mut first = wallet.clone();
        first.balance = dec!(10);
        let saved = store.update_wallet(&first).await.unwrap();
        assert_eq!(saved.version, wallet.version + 1);

        // Second writer still holds the old version
        let mut stale = wallet.clone();
        stale.balance = dec!(20);
        assert!(matches!(
            store.update_wallet(&stale).await,
            Err(DbError::Conflict { .. })
        ));
        assert_eq!(store.find_wallet_by_id(wallet.id).await.unwrap().balance, dec!(10));
    }

    #[tokio::test]
    async fn test_update_rejects_negative_balance() {
        let store = MemoryStorage::new();
        let user = store.create_user(new_user("n@example.com")).await.unwrap();
        let mut wallet = store.create_wallet(NewWallet::empty(user.id)).await.unwrap();
        wallet.balance = dec!(-0.01);
        assert!(matches!(
            store.update_wallet(&wallet).await,
            Err(DbError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_joins_users_and_wallets() {
        let store = MemoryStorage::new();
        let a = store.create_user(new_user("a@example.com")).await.unwrap();
        let b = store.create_user(new_user("b@example.com")).await.unwrap();
        store.create_wallet(NewWallet::empty(a.id)).await.unwrap();
        store.create_wallet(NewWallet::empty(b.id)).await.unwrap();

        let rows = store.list_users_with_wallets().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].email, "a@example.com");
        assert_eq!(store.list_wallets().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_wallet() {
        let store = MemoryStorage::new();
        let user = store.create_user(new_user("d@example.com")).await.unwrap();
        let wallet = store.create_wallet(NewWallet::empty(user.id)).await.unwrap();
        store.delete_wallet(wallet.id).await.unwrap();
        assert!(store.find_wallet_by_id(wallet.id).await.is_err());
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStorage::new();
        let fixtures = demo_fixtures(4, |pw| Ok::<_, DbError>(pw.to_uppercase())).unwrap();

        let first = store.seed(&fixtures).await.unwrap();
        assert_eq!(first, SeedReport { users: 4, wallets: 4 });

        let second = store.seed(&fixtures).await.unwrap();
        assert_eq!(second, SeedReport::default());
        assert_eq!(store.list_users_with_wallets().await.unwrap().len(), 4);
    }
}
