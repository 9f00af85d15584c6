//! Authentication configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest signing secret accepted for HS256
pub const MIN_SECRET_LENGTH: usize = 32;

/// Placeholder secret shipped in defaults; refused outside dev mode
pub const DEV_SECRET: &str = "change-me-in-production-change-me-in-production";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub password: PasswordConfig,
}

/// Access token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HMAC signing secret, at least [`MIN_SECRET_LENGTH`] bytes
    pub secret: String,
    /// Access token lifetime, e.g. `15m`
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,
    /// `iss` claim
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: DEV_SECRET.to_string(),
            access_token_lifetime: Duration::from_secs(15 * 60),
            issuer: "purse".to_string(),
        }
    }
}

impl JwtConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.secret == DEV_SECRET
    }
}

/// Argon2id parameters and password rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    pub parallelism: u32,
    pub min_password_length: usize,
    pub max_password_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
            min_password_length: 6,
            max_password_length: 128,
        }
    }
}
