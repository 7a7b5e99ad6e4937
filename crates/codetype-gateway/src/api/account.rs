use axum::extract::State;
use axum::http::StatusCode;
use tracing::{info, warn};

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::SharedState;

/// `DELETE /api/private/account`: remove the caller's identity, then their history.
pub async fn delete_account(
    State(state): State<SharedState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    if user.to_uuid().is_err() {
        return Err(ApiError::bad_request("Invalid user ID format"));
    }

    if let Err(e) = state.accounts.delete_account(&user).await {
        warn!("{e}");
        return Err(ApiError::internal("Failed to delete account"));
    }

    info!("account deletion completed for user {user}");
    Ok(StatusCode::NO_CONTENT)
}
