//! Wallet Handlers
//!
//! All routes here sit behind the bearer middleware, so an [`Identity`] is
//! always present.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::dto::{AmountRequest, BalanceResponse, Envelope};
use crate::error::ApiResult;
use crate::extractors::{ApiJson, Identity, WalletId};
use crate::state::AppState;

pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    WalletId(wallet_id): WalletId,
) -> ApiResult<Json<Envelope<BalanceResponse>>> {
    let view = state.ledger.balance(&identity.email, wallet_id).await?;
    Ok(Json(Envelope::ok(BalanceResponse {
        balance: view.balance,
    })))
}

pub async fn credit_wallet(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    WalletId(wallet_id): WalletId,
    ApiJson(request): ApiJson<AmountRequest>,
) -> ApiResult<Json<Envelope<BalanceResponse>>> {
    let balance = state
        .ledger
        .credit(&identity.email, wallet_id, request.amount)
        .await?;

    Ok(Json(Envelope::with_message(
        "Wallet successfully credited",
        BalanceResponse { balance },
    )))
}

pub async fn debit_wallet(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    WalletId(wallet_id): WalletId,
    ApiJson(request): ApiJson<AmountRequest>,
) -> ApiResult<Json<Envelope<BalanceResponse>>> {
    let balance = state
        .ledger
        .debit(&identity.email, wallet_id, request.amount)
        .await?;

    Ok(Json(Envelope::with_message(
        "Wallet successfully debited",
        BalanceResponse { balance },
    )))
}
