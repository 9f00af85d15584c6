//! Storage and cache error types

use thiserror::Error;

/// Storage backend and cache errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Version conflict on wallet {wallet_id}")]
    Conflict { wallet_id: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported by {backend} backend: {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// True for the "entity is absent" family of errors
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::UserNotFound(_) | DbError::WalletNotFound(_))
    }

    /// True when the failure happened while bringing the backend up
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, DbError::Connection(_) | DbError::Schema(_))
    }
}

impl From<deadpool_redis::PoolError> for DbError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        DbError::Redis(e.to_string())
    }
}

impl From<redis::RedisError> for DbError {
    fn from(e: redis::RedisError) -> Self {
        DbError::Redis(e.to_string())
    }
}

/// Result type for storage and cache operations
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_family() {
        assert!(DbError::UserNotFound("a@b.c".into()).is_not_found());
        assert!(DbError::WalletNotFound("7".into()).is_not_found());
        assert!(!DbError::Conflict { wallet_id: 7 }.is_not_found());
    }

    #[test]
    fn test_startup_fatal() {
        assert!(DbError::Connection("refused".into()).is_startup_fatal());
        assert!(DbError::Schema("bad ddl".into()).is_startup_fatal());
        assert!(!DbError::Redis("down".into()).is_startup_fatal());
    }
}
