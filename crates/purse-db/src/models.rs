//! Storage models - mapped from the `users` and `wallets` tables

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// User Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for `Storage::create_user`
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

// ============================================================================
// Wallet Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: i64,
    pub balance: Decimal,
    /// Optimistic concurrency counter, bumped by every `update_wallet`
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for `Storage::create_wallet`
#[derive(Debug, Clone)]
pub struct NewWallet {
    pub user_id: i64,
    pub balance: Decimal,
}

impl NewWallet {
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            balance: Decimal::ZERO,
        }
    }
}

// ============================================================================
// Projections
// ============================================================================

/// A user joined with its wallet, for listings
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserWallet {
    pub id: i64,
    pub uuid: Uuid,
    pub full_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub wallet_id: i64,
    pub wallet_balance: Decimal,
}

impl UserWallet {
    pub fn join(user: &User, wallet: &Wallet) -> Self {
        Self {
            id: user.id,
            uuid: user.uuid,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
            wallet_id: wallet.id,
            wallet_balance: wallet.balance,
        }
    }
}

/// Rows inserted by a `seed` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users: usize,
    pub wallets: usize,
}
