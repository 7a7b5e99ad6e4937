pub mod account;
pub mod history;

use axum::Json;
use serde_json::{Value, json};

use crate::auth::AuthenticatedUser;

pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Echo the caller identity the upstream gateway asserted.
pub async fn me(AuthenticatedUser(user): AuthenticatedUser) -> Json<Value> {
    Json(json!({ "user_id": user.as_str() }))
}
