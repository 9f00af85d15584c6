//! Access tokens
//!
//! HS256-signed JWTs whose subject is the user's email. Tokens are
//! stateless: there is no refresh flow and no revocation list.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::{JwtConfig, MIN_SECRET_LENGTH};
use crate::error::{AuthError, AuthResult};

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Email of the authenticated user
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> AuthResult<Self> {
        if config.secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::Config(format!(
                "JWT secret must be at least {} characters",
                MIN_SECRET_LENGTH
            )));
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
        })
    }

    /// Lifetime used by [`JwtService::create_access_token`]
    pub fn access_token_lifetime(&self) -> Duration {
        self.config.access_token_lifetime
    }

    /// Token for `email` with the configured lifetime
    pub fn create_access_token(&self, email: &str) -> AuthResult<String> {
        self.create_token(email, self.config.access_token_lifetime)
    }

    /// Token for `email` valid for `ttl`
    pub fn create_token(&self, email: &str, ttl: Duration) -> AuthResult<String> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| AuthError::Internal(e.to_string()))?;

        let claims = Claims {
            sub: email.to_string(),
            iss: self.config.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to encode access token: {}", e)))
    }

    /// Check signature, issuer and expiry; return the claims
    pub fn verify_token(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}
