use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use types::ids::AccountId;

/// Caller identity, taken from the `X-Account-Id` header.
///
/// Authentication proper happens at the fronting proxy; by the time a
/// request reaches the gateway the header carries a verified opaque owner
/// identifier.
pub struct AuthenticatedUser {
    pub account_id: AccountId,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("X-Account-Id")
            .ok_or_else(|| AppError::Unauthorized("missing X-Account-Id header".to_string()))?;
        let value = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("invalid X-Account-Id header".to_string()))?;
        let account_id = value
            .parse::<AccountId>()
            .map_err(|_| AppError::Unauthorized("X-Account-Id is not a valid id".to_string()))?;

        Ok(AuthenticatedUser { account_id })
    }
}
