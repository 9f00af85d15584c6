//! Authentication error types

use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    // =========================================================================
    // Token Errors
    // =========================================================================
    #[error("Token has expired")]
    TokenExpired,

    /// Malformed, wrong signature or wrong issuer
    #[error("Invalid token")]
    InvalidToken,

    // =========================================================================
    // Credential Errors
    // =========================================================================
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    #[error("Password verification failed")]
    PasswordVerificationFailed,

    #[error("Password hashing failed")]
    PasswordHashingFailed,

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error")]
    Internal(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => Self::InvalidToken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_details_stay_out_of_display() {
        let err = AuthError::Internal("secret=hunter2".into());
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_expired_signature_maps_to_token_expired() {
        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        );
        assert!(matches!(AuthError::from(err), AuthError::TokenExpired));

        let err = jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidIssuer);
        assert!(matches!(AuthError::from(err), AuthError::InvalidToken));
    }
}
