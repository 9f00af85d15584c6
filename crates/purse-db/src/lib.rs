//! Purse Storage Layer
//!
//! Durable storage for users and their wallets, plus the short-lived balance
//! cache that sits in front of it.
//!
//! # Architecture
//!
//! - **Storage**: one async trait, three variants chosen by
//!   [`StorageConfig::backend`]: in-memory maps, PostgreSQL via sqlx, and a
//!   placeholder file store that refuses writes.
//! - **Cache**: one async trait, three variants chosen by
//!   [`CacheConfig::backend`]: Redis via deadpool-redis, an in-process map
//!   with expiry, or nothing at all.
//!
//! Wallet rows carry a `version` column; [`Storage::update_wallet`] only
//! writes when the caller saw the latest version.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod seed;
pub mod storage;

pub use cache::{connect_cache, BalanceCache, DisabledCache, MemoryCache, RedisCache};
pub use config::{CacheConfig, CacheKind, StorageConfig, StorageKind};
pub use error::{DbError, DbResult};
pub use models::*;
pub use seed::{demo_fixtures, SeedFixture, DEFAULT_SEED_COUNT};
pub use storage::{
    build_storage, connect_storage, FileStorage, MemoryStorage, PostgresStorage, Storage,
};
