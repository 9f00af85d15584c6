//! Health Check Handler

use axum::{extract::State, Json};
use purse_db::{CacheKind, StorageKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the cache does not answer
    pub status: String,
    pub version: String,
    pub storage: StorageKind,
    pub cache: CacheKind,
    pub cache_ok: bool,
}

/// Report the backends in use. Always 200; a failing cache only degrades.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.ledger.health().await;
    let status = if health.cache_ok { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: health.storage,
        cache: health.cache,
        cache_ok: health.cache_ok,
    })
}
