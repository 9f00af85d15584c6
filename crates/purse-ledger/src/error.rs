use purse_db::DbError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Insufficient balance: have {available}, need {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Wallet {wallet_id} does not belong to the caller")]
    OwnershipViolation { wallet_id: i64 },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Wallet {wallet_id} kept changing underneath the update")]
    Conflict { wallet_id: i64 },

    #[error("Storage error: {0}")]
    Storage(DbError),
}

impl LedgerError {
    pub(crate) fn invalid_amount(message: impl Into<String>) -> Self {
        LedgerError::InvalidAmount {
            message: message.into(),
        }
    }

    /// Stable machine-readable tag
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::UserNotFound(_) => "user_not_found",
            LedgerError::WalletNotFound(_) => "wallet_not_found",
            LedgerError::InvalidAmount { .. } => "invalid_amount",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::OwnershipViolation { .. } => "ownership_violation",
            LedgerError::AlreadyExists(_) => "already_exists",
            LedgerError::Conflict { .. } => "conflict",
            LedgerError::Storage(_) => "internal",
        }
    }
}

impl From<DbError> for LedgerError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UserNotFound(who) => LedgerError::UserNotFound(who),
            DbError::WalletNotFound(which) => LedgerError::WalletNotFound(which),
            DbError::Duplicate(what) => LedgerError::AlreadyExists(what),
            DbError::Conflict { wallet_id } => LedgerError::Conflict { wallet_id },
            DbError::InvalidInput(message) => LedgerError::InvalidAmount { message },
            other => LedgerError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
