//! File storage backend (placeholder)
//!
//! Accepts a path and creates the file, but persists nothing: every lookup
//! comes back empty and every write is refused with `Unsupported`.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::warn;

use super::{wallet_not_found, wallet_of_user_not_found, Storage};
use crate::config::StorageKind;
use crate::models::{NewUser, NewWallet, SeedReport, User, UserWallet, Wallet};
use crate::seed::SeedFixture;
use crate::{DbError, DbResult};

pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn refuse(operation: &'static str) -> DbError {
        DbError::Unsupported {
            backend: "file",
            operation,
        }
    }
}

#[async_trait]
impl Storage for FileStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::File
    }

    async fn find_wallet_by_id(&self, id: i64) -> DbResult<Wallet> {
        Err(wallet_not_found(id))
    }

    async fn find_wallet_by_user_id(&self, user_id: i64) -> DbResult<Wallet> {
        Err(wallet_of_user_not_found(user_id))
    }

    async fn list_wallets(&self) -> DbResult<Vec<Wallet>> {
        Ok(Vec::new())
    }

    async fn find_user_by_email(&self, email: &str) -> DbResult<User> {
        Err(DbError::UserNotFound(email.to_string()))
    }

    async fn list_users_with_wallets(&self) -> DbResult<Vec<UserWallet>> {
        Ok(Vec::new())
    }

    async fn create_user(&self, _user: NewUser) -> DbResult<User> {
        Err(Self::refuse("create_user"))
    }

    async fn create_wallet(&self, _wallet: NewWallet) -> DbResult<Wallet> {
        Err(Self::refuse("create_wallet"))
    }

    async fn create_account(&self, _user: NewUser) -> DbResult<(User, Wallet)> {
        Err(Self::refuse("create_account"))
    }

    async fn update_wallet(&self, _wallet: &Wallet) -> DbResult<Wallet> {
        Err(Self::refuse("update_wallet"))
    }

    async fn delete_wallet(&self, _id: i64) -> DbResult<()> {
        Err(Self::refuse("delete_wallet"))
    }

    async fn open(&self) -> DbResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        warn!(
            path = %self.path.display(),
            "File storage backend is a placeholder: reads find nothing and writes are refused"
        );
        Ok(())
    }

    async fn close(&self) -> DbResult<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> DbResult<()> {
        Ok(())
    }

    async fn seed(&self, _fixtures: &[SeedFixture]) -> DbResult<SeedReport> {
        Ok(SeedReport::default())
    }
}
