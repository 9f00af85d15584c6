//! Storage backend abstraction
//!
//! One capability set, three variants. The variant is chosen once from
//! [`StorageConfig`] and handed around as `Arc<dyn Storage>`.

mod file;
mod memory;
mod postgres;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::{StorageConfig, StorageKind};
use crate::models::{NewUser, NewWallet, SeedReport, User, UserWallet, Wallet};
use crate::seed::SeedFixture;
use crate::{DbError, DbResult};

/// Durable store for users and wallets
#[async_trait]
pub trait Storage: Send + Sync {
    /// Which variant this is
    fn kind(&self) -> StorageKind;

    // =========================================================================
    // Reads
    // =========================================================================

    async fn find_wallet_by_id(&self, id: i64) -> DbResult<Wallet>;

    async fn find_wallet_by_user_id(&self, user_id: i64) -> DbResult<Wallet>;

    async fn list_wallets(&self) -> DbResult<Vec<Wallet>>;

    async fn find_user_by_email(&self, email: &str) -> DbResult<User>;

    async fn list_users_with_wallets(&self) -> DbResult<Vec<UserWallet>>;

    // =========================================================================
    // Writes
    // =========================================================================

    async fn create_user(&self, user: NewUser) -> DbResult<User>;

    /// Create the wallet of a user. A user owns at most one wallet.
    async fn create_wallet(&self, wallet: NewWallet) -> DbResult<Wallet>;

    /// Create a user together with its empty wallet, atomically: either
    /// both rows exist afterwards or neither does.
    async fn create_account(&self, user: NewUser) -> DbResult<(User, Wallet)>;

    /// Persist `balance` and `updated_at` if the stored version still equals
    /// `wallet.version`. Returns the stored row with the bumped version.
    async fn update_wallet(&self, wallet: &Wallet) -> DbResult<Wallet>;

    async fn delete_wallet(&self, id: i64) -> DbResult<()>;

    // =========================================================================
    // Lifecycle
    // =========================================================================

    async fn open(&self) -> DbResult<()>;

    async fn close(&self) -> DbResult<()>;

    async fn ensure_schema(&self) -> DbResult<()>;

    /// Insert demo accounts unless the store already holds data
    async fn seed(&self, fixtures: &[SeedFixture]) -> DbResult<SeedReport>;
}

/// Build the configured backend. Nothing is opened yet.
pub fn build_storage(config: &StorageConfig) -> DbResult<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
        StorageKind::Postgres => Arc::new(PostgresStorage::new(config.clone())?),
        StorageKind::File => {
            let path = config.file_path.clone().ok_or_else(|| {
                DbError::Connection("file backend requires storage.file_path".to_string())
            })?;
            Arc::new(FileStorage::new(path))
        }
    };
    Ok(storage)
}

/// Build, open and migrate the configured backend.
///
/// Any error here is fatal for the process: nothing may be served from a
/// store that failed to come up.
pub async fn connect_storage(config: &StorageConfig) -> DbResult<Arc<dyn Storage>> {
    let storage = build_storage(config)?;

    info!(backend = %config.backend, "Opening storage backend");
    storage.open().await?;
    storage.ensure_schema().await?;
    info!(backend = %config.backend, "Storage backend ready");

    Ok(storage)
}

pub(crate) fn wallet_not_found(id: i64) -> DbError {
    DbError::WalletNotFound(format!("id {}", id))
}

pub(crate) fn wallet_of_user_not_found(user_id: i64) -> DbError {
    DbError::WalletNotFound(format!("user {}", user_id))
}

pub(crate) fn ensure_non_negative(balance: rust_decimal::Decimal) -> DbResult<()> {
    if balance < rust_decimal::Decimal::ZERO {
        return Err(DbError::InvalidInput(format!(
            "wallet balance cannot be negative: {}",
            balance
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_is_default() {
        let storage = connect_storage(&StorageConfig::default()).await.unwrap();
        assert_eq!(storage.kind(), StorageKind::Memory);
    }

    #[test]
    fn test_file_requires_path() {
        let config = StorageConfig {
            backend: StorageKind::File,
            ..Default::default()
        };
        assert!(matches!(build_storage(&config), Err(DbError::Connection(_))));
    }

    #[test]
    fn test_postgres_requires_url() {
        let config = StorageConfig {
            backend: StorageKind::Postgres,
            ..Default::default()
        };
        assert!(matches!(build_storage(&config), Err(DbError::Connection(_))));
    }

    #[test]
    fn test_negative_balance_rejected() {
        assert!(ensure_non_negative(rust_decimal::Decimal::new(-1, 2)).is_err());
        assert!(ensure_non_negative(rust_decimal::Decimal::ZERO).is_ok());
    }
}
