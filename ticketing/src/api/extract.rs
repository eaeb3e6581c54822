//! Request extractors.
//!
//! Authentication happens upstream: the gateway verifies the session and
//! forwards the caller's id in the `x-user-id` header.

use super::error::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use turnstile_core::types::UserId;
use uuid::Uuid;

/// Header carrying the authenticated caller's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing x-user-id header"))?;

        let uuid = Uuid::parse_str(value.trim())
            .map_err(|_| ApiError::unauthorized("Invalid x-user-id header"))?;

        Ok(Self(UserId::from_uuid(uuid)))
    }
}
