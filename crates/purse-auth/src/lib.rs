//! Purse Authentication Layer
//!
//! - **Access tokens**: HS256 JWTs naming the user's email as subject
//! - **Passwords**: Argon2id PHC strings

pub mod config;
pub mod error;
pub mod jwt;
pub mod password;

pub use config::{AuthConfig, JwtConfig, PasswordConfig};
pub use error::{AuthError, AuthResult};
pub use jwt::{Claims, JwtService};
pub use password::PasswordService;

/// Token and password services built from one config
#[derive(Clone)]
pub struct AuthService {
    pub jwt: JwtService,
    pub password: PasswordService,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> AuthResult<Self> {
        let jwt = JwtService::new(config.jwt.clone())?;
        let password = PasswordService::new(config.password.clone());
        Ok(Self {
            jwt,
            password,
            config,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Check an email/password pair against the stored hash and issue a
    /// token. A wrong password is reported as bad credentials.
    pub fn login(&self, email: &str, password: &str, stored_hash: &str) -> AuthResult<String> {
        if !self.password.verify_password(password, stored_hash)? {
            tracing::debug!(email, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }
        self.jwt.create_access_token(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(AuthConfig {
            password: PasswordConfig {
                memory_cost: 1024,
                time_cost: 1,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_login() {
        let auth = service();
        let hash = auth.password.hash_password("secret1").unwrap();

        let token = auth.login("a@example.com", "secret1", &hash).unwrap();
        assert_eq!(auth.jwt.verify_token(&token).unwrap().sub, "a@example.com");

        assert!(matches!(
            auth.login("a@example.com", "wrong-pw", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
