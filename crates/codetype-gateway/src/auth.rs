use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use codetype_common::UserId;

use crate::error::ApiError;
use crate::state::SharedState;

/// Caller identity for private routes.
///
/// Session validation happens upstream; this only reads the identity header
/// the upstream gateway sets and rejects requests where it is missing.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserId);

impl FromRequestParts<SharedState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(state.user_id_header())
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        UserId::parse(raw)
            .map(Self)
            .map_err(|_| ApiError::unauthorized("Unauthorized"))
    }
}
