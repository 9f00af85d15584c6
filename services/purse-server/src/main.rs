//! Purse Server
//!
//! HTTP front end for the Purse wallet ledger.
//!
//! # Usage
//!
//! ```bash
//! # In-memory store and cache, demo secret
//! purse-server --dev-mode
//!
//! # PostgreSQL and Redis
//! purse-server --storage postgres --database-url postgresql://... \
//!     --cache redis --redis-url redis://localhost:6379
//!
//! # Environment overrides
//! PURSE__SERVER__PORT=9000 PURSE__CACHE__TTL_SECS=30 purse-server
//! ```

mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use purse_api::{create_router, AppState};
use purse_auth::AuthService;
use purse_db::{
    connect_cache, connect_storage, demo_fixtures, CacheKind, Storage, StorageKind,
};
use purse_ledger::Ledger;

use crate::config::{LoggingConfig, ServerConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Purse - wallet ledger server
#[derive(Parser, Debug)]
#[command(name = "purse-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "PURSE_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "PURSE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Storage backend (memory, postgres, file)
    #[arg(long, env = "PURSE_STORAGE")]
    storage: Option<StorageKind>,

    /// Balance cache (redis, memory, disabled)
    #[arg(long, env = "PURSE_CACHE")]
    cache: Option<CacheKind>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// JWT signing secret
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PURSE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "PURSE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Allow the built-in JWT secret
    #[arg(long, env = "PURSE_DEV_MODE")]
    dev_mode: bool,
}

impl Args {
    /// CLI flags win over every other configuration layer
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(storage) = self.storage {
            config.storage.backend = storage;
        }
        if let Some(cache) = self.cache {
            config.cache.backend = cache;
        }
        if let Some(url) = self.database_url {
            config.storage.postgres_url = Some(url);
        }
        if let Some(url) = self.redis_url {
            config.cache.redis_url = url;
        }
        if let Some(secret) = self.jwt_secret {
            config.auth.jwt.secret = secret;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let dev_mode = args.dev_mode;

    let mut server_config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut server_config);

    init_logging(&server_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = %server_config.storage.backend,
        cache = %server_config.cache.backend,
        "Starting Purse server"
    );

    server_config.validate(dev_mode)?;
    if server_config.auth.jwt.uses_dev_secret() {
        tracing::warn!("Using the built-in JWT secret; do not run this in production");
    }

    let auth = Arc::new(
        AuthService::new(server_config.auth.clone()).context("Invalid auth configuration")?,
    );

    // Storage and cache must both come up before anything is served.
    tracing::info!(url = %server_config.storage.postgres_url_masked(), "Connecting storage");
    let storage = connect_storage(&server_config.storage)
        .await
        .context("Failed to start storage backend")?;

    if matches!(server_config.cache.backend, CacheKind::Redis) {
        tracing::info!(url = %server_config.cache.redis_url_masked(), "Connecting cache");
    }
    let cache = connect_cache(&server_config.cache)
        .await
        .context("Failed to start balance cache")?;

    if server_config.seed.enabled {
        seed_demo_accounts(storage.as_ref(), &auth, server_config.seed.count).await?;
    }

    let ledger = Ledger::new(storage.clone(), cache, server_config.ledger_config());
    let state = Arc::new(AppState::new(ledger, auth));
    let app = create_router(state, server_config.server.api_config());

    let listener = tokio::net::TcpListener::bind((
        server_config.server.host.as_str(),
        server_config.server.port,
    ))
    .await
    .with_context(|| {
        format!(
            "Failed to bind {}:{}",
            server_config.server.host, server_config.server.port
        )
    })?;

    tracing::info!(
        host = %server_config.server.host,
        port = server_config.server.port,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    storage.close().await?;
    tracing::info!("Server shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => subscriber
            .with(fmt::layer().json().with_target(true))
            .try_init()?,
        _ => subscriber
            .with(fmt::layer().pretty().with_target(true))
            .try_init()?,
    }

    Ok(())
}

/// Fill an empty store with demo accounts
async fn seed_demo_accounts(
    storage: &dyn Storage,
    auth: &Arc<AuthService>,
    count: usize,
) -> anyhow::Result<()> {
    let hasher = auth.clone();
    let fixtures = tokio::task::spawn_blocking(move || {
        demo_fixtures(count, |password| hasher.password.hash_password(password))
    })
    .await??;

    let report = storage.seed(&fixtures).await.context("Failed to seed store")?;

    if report.users > 0 {
        for fixture in &fixtures {
            tracing::debug!(
                email = %fixture.user.email,
                password = %fixture.password,
                balance = %fixture.balance,
                "Demo account"
            );
        }
    }
    tracing::info!(users = report.users, wallets = report.wallets, "Seed complete");

    Ok(())
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
