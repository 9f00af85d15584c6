//! Custom Axum Extractors

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path},
    http::request::Parts,
};

use crate::error::ApiError;

/// JSON body whose rejections use the API error envelope
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Caller identity, inserted by the bearer middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

/// `:wallet_id` path segment; must be a positive integer
#[derive(Debug, Clone, Copy)]
pub struct WalletId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for WalletId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state).await?;
        if id < 1 {
            return Err(ApiError::BadRequest(format!(
                "wallet_id must be a positive integer, got {}",
                id
            )));
        }
        Ok(WalletId(id))
    }
}
