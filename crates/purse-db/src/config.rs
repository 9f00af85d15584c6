//! Storage and cache configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which storage backend variant to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Process-local maps, nothing survives a restart
    #[default]
    Memory,
    /// PostgreSQL through sqlx
    Postgres,
    /// Placeholder file store; reads find nothing, writes are refused
    File,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Memory => "memory",
            StorageKind::Postgres => "postgres",
            StorageKind::File => "file",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "inmemory" => Ok(StorageKind::Memory),
            "postgres" | "postgresql" => Ok(StorageKind::Postgres),
            "file" | "filesystem" => Ok(StorageKind::File),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// Which balance cache variant to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Redis,
    #[default]
    Memory,
    /// Every lookup misses
    Disabled,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Redis => "redis",
            CacheKind::Memory => "memory",
            CacheKind::Disabled => "disabled",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(CacheKind::Redis),
            "memory" => Ok(CacheKind::Memory),
            "disabled" | "none" | "off" => Ok(CacheKind::Disabled),
            other => Err(format!("unknown cache backend: {}", other)),
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend variant
    #[serde(default)]
    pub backend: StorageKind,
    /// PostgreSQL connection URL (postgres backend)
    #[serde(default)]
    pub postgres_url: Option<String>,
    /// Data file path (file backend)
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    /// Maximum PostgreSQL connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum PostgreSQL connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::Memory,
            postgres_url: None,
            file_path: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

impl StorageConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Mask sensitive parts of the PostgreSQL URL for logging
    pub fn postgres_url_masked(&self) -> String {
        self.postgres_url
            .as_deref()
            .map(mask_url)
            .unwrap_or_else(|| "<unset>".to_string())
    }
}

/// Balance cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache variant
    #[serde(default)]
    pub backend: CacheKind,
    /// Redis connection URL (redis backend)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Entry time-to-live in seconds
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// Upper bound for a single cache command, in milliseconds
    #[serde(default = "default_op_timeout")]
    pub op_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheKind::Memory,
            redis_url: default_redis_url(),
            ttl_secs: default_ttl(),
            op_timeout_ms: default_op_timeout(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    /// Mask sensitive parts of the Redis URL for logging
    pub fn redis_url_masked(&self) -> String {
        mask_url(&self.redis_url)
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    5
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_ttl() -> u64 {
    100
}

fn default_op_timeout() -> u64 {
    500
}

pub(crate) fn mask_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.rfind('@'), url.find("://")) {
        if at_pos > scheme_end {
            let scheme = &url[..scheme_end + 3];
            let user_pass = &url[scheme_end + 3..at_pos];
            let after_at = &url[at_pos..];
            if let Some(colon_pos) = user_pass.find(':') {
                let user = &user_pass[..colon_pos];
                return format!("{}{}:***{}", scheme, user, after_at);
            }
        }
    }
    url.to_string()
}
