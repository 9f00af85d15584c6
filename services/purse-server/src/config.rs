//! Server Configuration
//!
//! Layered, lowest priority first: built-in defaults, `config/default`,
//! `config/local`, the `--config` file, `PURSE__SECTION__KEY` environment
//! variables, then CLI flags (applied in `main`).

use purse_api::ApiConfig;
use purse_auth::AuthConfig;
use purse_db::{CacheConfig, StorageConfig, StorageKind, DEFAULT_SEED_COUNT};
use purse_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listener and HTTP settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Storage backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Balance cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Tokens and password hashing
    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub ledger: LedgerSettings,

    /// Demo data on startup
    #[serde(default)]
    pub seed: SeedSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener and HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub enable_cors: bool,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            enable_cors: true,
            cors_origins: default_cors_origins(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            enable_cors: self.enable_cors,
            cors_origins: self.cors_origins.clone(),
            enable_tracing: true,
            request_timeout: self.request_timeout(),
            max_body_size: self.max_body_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Persist attempts per credit or debit before giving up on a conflict
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Demo accounts to create in an empty store
    #[serde(default = "default_seed_count")]
    pub count: usize,
}

impl Default for SeedSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            count: default_seed_count(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_body_size() -> usize {
    64 * 1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_seed_count() -> usize {
    DEFAULT_SEED_COUNT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl ServerConfig {
    /// Load configuration from `.env`, config files and the environment
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PURSE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> anyhow::Result<Self> {
        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            cache_ttl: self.cache.ttl(),
            max_attempts: self.ledger.max_attempts,
        }
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self, dev_mode: bool) -> anyhow::Result<()> {
        if !dev_mode && self.auth.jwt.uses_dev_secret() {
            anyhow::bail!(
                "JWT secret must be changed outside dev mode. Set JWT_SECRET or PURSE__AUTH__JWT__SECRET."
            );
        }

        match self.storage.backend {
            StorageKind::Postgres => {
                let missing = self
                    .storage
                    .postgres_url
                    .as_deref()
                    .map_or(true, |url| url.trim().is_empty());
                if missing {
                    anyhow::bail!("postgres backend requires storage.postgres_url or DATABASE_URL");
                }
            }
            StorageKind::File => {
                if self.storage.file_path.is_none() {
                    anyhow::bail!("file backend requires storage.file_path");
                }
            }
            StorageKind::Memory => {}
        }

        if self.ledger.max_attempts == 0 {
            anyhow::bail!("ledger.max_attempts must be at least 1");
        }

        if self.cache.ttl_secs == 0 {
            anyhow::bail!("cache.ttl_secs must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use purse_db::CacheKind;

    fn from_toml(toml: &str) -> ServerConfig {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml));
        ServerConfig::from_builder(builder).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageKind::Memory);
        assert_eq!(config.cache.backend, CacheKind::Memory);
        assert_eq!(config.ledger.max_attempts, 3);
        assert_eq!(config.seed.count, DEFAULT_SEED_COUNT);
        assert_eq!(config.ledger_config().cache_ttl, Duration::from_secs(100));
    }

    #[test]
    fn test_file_values() {
        let config = from_toml(
            r#"
            [server]
            port = 9000

            [storage]
            backend = "postgres"
            postgres_url = "postgresql://purse:pw@localhost/purse"

            [cache]
            backend = "disabled"
            ttl_secs = 30

            [auth.jwt]
            secret = "a-production-secret-that-is-long-enough"
            access_token_lifetime = "1h"
            "#,
        );

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, StorageKind::Postgres);
        assert_eq!(config.cache.backend, CacheKind::Disabled);
        assert_eq!(
            config.auth.jwt.access_token_lifetime,
            Duration::from_secs(3600)
        );
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn test_dev_secret_needs_dev_mode() {
        let config = ServerConfig::default();
        assert!(config.validate(false).is_err());
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_backend_requirements() {
        let mut config = ServerConfig::default();
        config.storage.backend = StorageKind::Postgres;
        assert!(config.validate(true).is_err());

        config.storage.postgres_url = Some("  ".to_string());
        assert!(config.validate(true).is_err());

        config.storage.backend = StorageKind::File;
        assert!(config.validate(true).is_err());

        config.storage.file_path = Some("data/purse.db".into());
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_unknown_backend_is_an_error() {
        let builder = config::Config::builder().add_source(config::File::from_str(
            "[storage]\nbackend = \"mysql\"",
            config::FileFormat::Toml,
        ));
        assert!(ServerConfig::from_builder(builder).is_err());
    }
}
