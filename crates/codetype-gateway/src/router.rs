use axum::Router;
use axum::routing::{delete, get};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::error::handle_panic;
use crate::state::SharedState;

/// Build the main application router with all routes.
pub fn build_router(state: SharedState) -> Router {
    let private = Router::new()
        .route("/me", get(api::me))
        .route(
            "/history",
            get(api::history::list_history)
                .post(api::history::create_history)
                .delete(api::history::delete_history),
        )
        .route("/account", delete(api::account::delete_account));

    Router::new()
        .route("/health", get(health))
        .route("/api/public/ping", get(api::ping))
        .nest("/api/private", private)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
