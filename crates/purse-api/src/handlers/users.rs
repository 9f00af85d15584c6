//! User Handlers
//!
//! Registration, login and the account listing.

use axum::{extract::State, http::StatusCode, Json};
use purse_ledger::{LedgerError, NewAccount};
use std::sync::Arc;

use crate::dto::{
    CreateUserRequest, CreateUserResponse, Envelope, LoginRequest, LoginResponse, UsersResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::extractors::ApiJson;
use crate::state::AppState;

/// Register a user and open its empty wallet
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<CreateUserResponse>>)> {
    request.validate().map_err(ApiError::BadRequest)?;

    // Argon2 runs on the blocking pool.
    let auth = state.auth.clone();
    let password = request.password;
    let password_hash =
        tokio::task::spawn_blocking(move || auth.password.hash_password(&password)).await??;

    let account = state
        .ledger
        .open_account(NewAccount {
            full_name: request.full_name,
            email: request.email,
            password_hash,
        })
        .await?;

    tracing::info!(
        user_id = account.user.id,
        wallet_id = account.wallet.id,
        "User registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(
            "User created successfully",
            CreateUserResponse {
                user_id: account.user.id,
                wallet_id: account.wallet.id,
            },
        )),
    ))
}

/// Exchange email and password for an access token
pub async fn login_user(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<Envelope<LoginResponse>>> {
    let user = match state.ledger.find_user(&request.email).await {
        Ok(user) => user,
        Err(LedgerError::UserNotFound(_)) => return Err(ApiError::invalid_credentials()),
        Err(e) => return Err(e.into()),
    };

    let auth = state.auth.clone();
    let access_token = tokio::task::spawn_blocking(move || {
        auth.login(&user.email, &request.password, &user.password_hash)
    })
    .await??;

    Ok(Json(Envelope::ok(LoginResponse { access_token })))
}

/// Every user with its wallet id and balance
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Envelope<UsersResponse>>> {
    let users = state.ledger.accounts().await?;
    Ok(Json(Envelope::ok(UsersResponse { users })))
}
