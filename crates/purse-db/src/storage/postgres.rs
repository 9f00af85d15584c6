//! PostgreSQL storage backend

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{ensure_non_negative, wallet_not_found, wallet_of_user_not_found, Storage};
use crate::config::{StorageConfig, StorageKind};
use crate::models::{NewUser, NewWallet, SeedReport, User, UserWallet, Wallet};
use crate::seed::SeedFixture;
use crate::{DbError, DbResult};

const USER_COLUMNS: &str = "id, uuid, full_name, email, password_hash, created_at, updated_at";
const WALLET_COLUMNS: &str = "id, uuid, user_id, balance, version, created_at, updated_at";

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        uuid UUID NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT users_email_key UNIQUE (email)
    )
"#;

const CREATE_WALLETS: &str = r#"
    CREATE TABLE IF NOT EXISTS wallets (
        id BIGSERIAL PRIMARY KEY,
        uuid UUID NOT NULL UNIQUE,
        user_id BIGINT NOT NULL,
        balance NUMERIC NOT NULL DEFAULT 0,
        version BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT wallets_user_id_key UNIQUE (user_id),
        CONSTRAINT wallets_balance_non_negative CHECK (balance >= 0)
    )
"#;

const ADD_WALLET_FK: &str = r#"
    ALTER TABLE wallets
    ADD CONSTRAINT fk_wallets_users
    FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
"#;

/// SQLSTATE raised when a constraint of that name is already defined
const DUPLICATE_OBJECT: &str = "42710";
/// SQLSTATE for a foreign key violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Relational backend. The pool is created by `open`.
pub struct PostgresStorage {
    config: StorageConfig,
    url: String,
    pool: OnceCell<PgPool>,
}

impl PostgresStorage {
    pub fn new(config: StorageConfig) -> DbResult<Self> {
        let url = config
            .postgres_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                DbError::Connection("postgres backend requires storage.postgres_url".to_string())
            })?;

        Ok(Self {
            config,
            url,
            pool: OnceCell::new(),
        })
    }

    fn pool(&self) -> DbResult<&PgPool> {
        self.pool
            .get()
            .ok_or_else(|| DbError::Connection("PostgreSQL pool is not open".to_string()))
    }

    async fn wallet_exists(&self, id: i64) -> DbResult<bool> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM wallets WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool()?)
            .await?;
        Ok(found.is_some())
    }
}

fn constraint_of(e: &sqlx::Error) -> Option<&str> {
    match e {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

fn sqlstate_of(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Postgres
    }

    async fn find_wallet_by_id(&self, id: i64) -> DbResult<Wallet> {
        let sql = format!("SELECT {} FROM wallets WHERE id = $1", WALLET_COLUMNS);
        sqlx::query_as::<_, Wallet>(&sql)
            .bind(id)
            .fetch_optional(self.pool()?)
            .await?
            .ok_or_else(|| wallet_not_found(id))
    }

    async fn find_wallet_by_user_id(&self, user_id: i64) -> DbResult<Wallet> {
        let sql = format!("SELECT {} FROM wallets WHERE user_id = $1", WALLET_COLUMNS);
        sqlx::query_as::<_, Wallet>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool()?)
            .await?
            .ok_or_else(|| wallet_of_user_not_found(user_id))
    }

    async fn list_wallets(&self) -> DbResult<Vec<Wallet>> {
        let sql = format!("SELECT {} FROM wallets ORDER BY id", WALLET_COLUMNS);
        let wallets = sqlx::query_as::<_, Wallet>(&sql)
            .fetch_all(self.pool()?)
            .await?;
        Ok(wallets)
    }

    async fn find_user_by_email(&self, email: &str) -> DbResult<User> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool()?)
            .await?
            .ok_or_else(|| DbError::UserNotFound(email.to_string()))
    }

    async fn list_users_with_wallets(&self) -> DbResult<Vec<UserWallet>> {
        let rows = sqlx::query_as::<_, UserWallet>(
            r#"
            SELECT u.id, u.uuid, u.full_name, u.email, u.created_at, u.updated_at,
                   w.id AS wallet_id, w.balance AS wallet_balance
            FROM users u
            INNER JOIN wallets w ON w.user_id = u.id
            ORDER BY u.id
            "#,
        )
        .fetch_all(self.pool()?)
        .await?;
        Ok(rows)
    }

    async fn create_user(&self, user: NewUser) -> DbResult<User> {
        let sql = format!(
            "INSERT INTO users (uuid, full_name, email, password_hash) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(uuid::Uuid::new_v4())
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(self.pool()?)
            .await
            .map_err(|e| {
                if constraint_of(&e) == Some("users_email_key") {
                    return DbError::Duplicate(format!("Email {} already exists", user.email));
                }
                DbError::Query(e)
            })
    }

    async fn create_wallet(&self, wallet: NewWallet) -> DbResult<Wallet> {
        ensure_non_negative(wallet.balance)?;

        let sql = format!(
            "INSERT INTO wallets (uuid, user_id, balance) VALUES ($1, $2, $3) RETURNING {}",
            WALLET_COLUMNS
        );
        sqlx::query_as::<_, Wallet>(&sql)
            .bind(uuid::Uuid::new_v4())
            .bind(wallet.user_id)
            .bind(wallet.balance)
            .fetch_one(self.pool()?)
            .await
            .map_err(|e| {
                if constraint_of(&e) == Some("wallets_user_id_key") {
                    return DbError::Duplicate(format!(
                        "User {} already owns a wallet",
                        wallet.user_id
                    ));
                }
                if sqlstate_of(&e).as_deref() == Some(FOREIGN_KEY_VIOLATION) {
                    return DbError::UserNotFound(format!("id {}", wallet.user_id));
                }
                DbError::Query(e)
            })
    }

    async fn create_account(&self, user: NewUser) -> DbResult<(User, Wallet)> {
        let mut tx = self.pool()?.begin().await?;

        let user_sql = format!(
            "INSERT INTO users (uuid, full_name, email, password_hash) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        let created = sqlx::query_as::<_, User>(&user_sql)
            .bind(uuid::Uuid::new_v4())
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if constraint_of(&e) == Some("users_email_key") {
                    return DbError::Duplicate(format!("Email {} already exists", user.email));
                }
                DbError::Query(e)
            })?;

        let wallet_sql = format!(
            "INSERT INTO wallets (uuid, user_id) VALUES ($1, $2) RETURNING {}",
            WALLET_COLUMNS
        );
        let wallet = sqlx::query_as::<_, Wallet>(&wallet_sql)
            .bind(uuid::Uuid::new_v4())
            .bind(created.id)
            .fetch_one(&mut *tx)
            .await?;

        // Dropping `tx` on any error above rolls both inserts back
        tx.commit().await?;
        debug!(user_id = created.id, wallet_id = wallet.id, "Account created");
        Ok((created, wallet))
    }

    async fn update_wallet(&self, wallet: &Wallet) -> DbResult<Wallet> {
        ensure_non_negative(wallet.balance)?;

        let sql = format!(
            "UPDATE wallets SET balance = $2, updated_at = $3, version = version + 1 \
             WHERE id = $1 AND version = $4 RETURNING {}",
            WALLET_COLUMNS
        );
        let updated = sqlx::query_as::<_, Wallet>(&sql)
            .bind(wallet.id)
            .bind(wallet.balance)
            .bind(wallet.updated_at)
            .bind(wallet.version)
            .fetch_optional(self.pool()?)
            .await?;

        match updated {
            Some(stored) => Ok(stored),
            None if self.wallet_exists(wallet.id).await? => Err(DbError::Conflict {
                wallet_id: wallet.id,
            }),
            None => Err(wallet_not_found(wallet.id)),
        }
    }

    async fn delete_wallet(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM wallets WHERE id = $1")
            .bind(id)
            .execute(self.pool()?)
            .await?;

        if result.rows_affected() == 0 {
            return Err(wallet_not_found(id));
        }
        Ok(())
    }

    async fn open(&self) -> DbResult<()> {
        info!("Connecting to PostgreSQL: {}", self.config.postgres_url_masked());

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .min_connections(self.config.min_connections)
            .acquire_timeout(self.config.acquire_timeout())
            .connect(&self.url)
            .await
            .map_err(|e| DbError::Connection(format!("PostgreSQL: {}", e)))?;

        self.pool
            .set(pool)
            .map_err(|_| DbError::Connection("PostgreSQL pool already open".to_string()))?;

        info!("Connected to PostgreSQL");
        Ok(())
    }

    async fn close(&self) -> DbResult<()> {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            info!("PostgreSQL pool closed");
        }
        Ok(())
    }

    async fn ensure_schema(&self) -> DbResult<()> {
        let pool = self.pool()?;

        for ddl in [CREATE_USERS, CREATE_WALLETS] {
            sqlx::query(ddl)
                .execute(pool)
                .await
                .map_err(|e| DbError::Schema(e.to_string()))?;
        }

        match sqlx::query(ADD_WALLET_FK).execute(pool).await {
            Ok(_) => debug!("Added fk_wallets_users"),
            Err(e) if sqlstate_of(&e).as_deref() == Some(DUPLICATE_OBJECT) => {
                debug!("fk_wallets_users already present");
            }
            Err(e) => return Err(DbError::Schema(e.to_string())),
        }

        Ok(())
    }

    async fn seed(&self, fixtures: &[SeedFixture]) -> DbResult<SeedReport> {
        let pool = self.pool()?;
        let mut tx = pool.begin().await?;
        let mut report = SeedReport::default();

        let (user_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;

        if user_count == 0 {
            for fixture in fixtures {
                sqlx::query(
                    "INSERT INTO users (uuid, full_name, email, password_hash) VALUES ($1, $2, $3, $4)",
                )
                .bind(uuid::Uuid::new_v4())
                .bind(&fixture.user.full_name)
                .bind(&fixture.user.email)
                .bind(&fixture.user.password_hash)
                .execute(&mut *tx)
                .await?;
                report.users += 1;
            }
        }

        let (wallet_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wallets")
            .fetch_one(&mut *tx)
            .await?;

        if wallet_count == 0 {
            let user_ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM users ORDER BY id")
                .fetch_all(&mut *tx)
                .await?;

            for ((user_id,), fixture) in user_ids.into_iter().zip(fixtures) {
                sqlx::query("INSERT INTO wallets (uuid, user_id, balance) VALUES ($1, $2, $3)")
                    .bind(uuid::Uuid::new_v4())
                    .bind(user_id)
                    .bind(fixture.balance)
                    .execute(&mut *tx)
                    .await?;
                report.wallets += 1;
            }
        }

        tx.commit().await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::demo_fixtures;
    use rust_decimal_macros::dec;

    #[test]
    fn test_blank_url_rejected() {
        let config = StorageConfig {
            backend: StorageKind::Postgres,
            postgres_url: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(PostgresStorage::new(config), Err(DbError::Connection(_))));
    }

    #[tokio::test]
    async fn test_queries_before_open_fail() {
        let config = StorageConfig {
            backend: StorageKind::Postgres,
            postgres_url: Some("postgresql://localhost/purse".into()),
            ..Default::default()
        };
        let store = PostgresStorage::new(config).unwrap();
        assert!(matches!(store.find_wallet_by_id(1).await, Err(DbError::Connection(_))));
    }

    async fn live_store() -> PostgresStorage {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PostgresStorage::new(StorageConfig {
            backend: StorageKind::Postgres,
            postgres_url: Some(url),
            ..Default::default()
        })
        .unwrap();
        store.open().await.unwrap();
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_schema_is_reentrant() {
        let store = live_store().await;
        store.ensure_schema().await.unwrap();
        let fixtures = demo_fixtures(3, |p| Ok::<_, DbError>(p.to_string())).unwrap();
        store.seed(&fixtures).await.unwrap();
        let again = store.seed(&fixtures).await.unwrap();
        assert_eq!(again, SeedReport::default());
        store.close().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_versioned_update() {
        let store = live_store().await;
        let email = format!("{}@example.com", uuid::Uuid::new_v4());
        let user = store
            .create_user(NewUser {
                full_name: "Live".into(),
                email: email.clone(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        let wallet = store.create_wallet(NewWallet::empty(user.id)).await.unwrap();

        let mut next = wallet.clone();
        next.balance = dec!(12.34);
        let saved = store.update_wallet(&next).await.unwrap();
        assert_eq!(saved.version, wallet.version + 1);
        assert!(matches!(
            store.update_wallet(&next).await,
            Err(DbError::Conflict { .. })
        ));
        assert!(matches!(
            store.create_wallet(NewWallet::empty(user.id)).await,
            Err(DbError::Duplicate(_))
        ));
        store.delete_wallet(wallet.id).await.unwrap();
        store.close().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_create_account_rolls_back_on_duplicate() {
        let store = live_store().await;
        let email = format!("{}@example.com", uuid::Uuid::new_v4());
        let new_user = || NewUser {
            full_name: "Live".into(),
            email: email.clone(),
            password_hash: "hash".into(),
        };

        let (user, wallet) = store.create_account(new_user()).await.unwrap();
        assert_eq!(wallet.user_id, user.id);
        let wallets_before = store.list_wallets().await.unwrap().len();

        assert!(matches!(
            store.create_account(new_user()).await,
            Err(DbError::Duplicate(_))
        ));
        assert_eq!(store.list_wallets().await.unwrap().len(), wallets_before);
        store.close().await.unwrap();
    }
}
