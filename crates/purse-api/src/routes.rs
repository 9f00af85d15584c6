//! API Routes

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::middleware::require_bearer;
use crate::state::AppState;

/// Create API v1 routes
pub fn api_v1_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/users", user_routes())
        .nest("/wallets", wallet_routes(state))
}

/// Registration, login and listing; no token needed
fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            post(handlers::users::create_user).get(handlers::users::list_users),
        )
        .route("/login", post(handlers::users::login_user))
}

/// Balance operations; bearer token required
fn wallet_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/:wallet_id/balance", get(handlers::wallets::get_balance))
        .route("/:wallet_id/credit", post(handlers::wallets::credit_wallet))
        .route("/:wallet_id/debit", post(handlers::wallets::debit_wallet))
        .route_layer(from_fn_with_state(state, require_bearer))
}
