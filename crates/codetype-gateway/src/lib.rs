pub mod api;
pub mod auth;
pub mod error;
pub mod router;
pub mod server;
pub mod state;

pub use error::{ApiError, ErrorBody};
pub use router::build_router;
pub use server::GatewayServer;
pub use state::{AppState, SharedState};
