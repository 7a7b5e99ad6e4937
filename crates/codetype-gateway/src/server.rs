use std::sync::Arc;

use codetype_common::{Error, Result};
use codetype_config::AppConfig;
use codetype_db::connect_and_migrate;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::{AppState, SharedState};

/// The HTTP server: opens the database, applies migrations, then serves the API.
pub struct GatewayServer {
    config: AppConfig,
}

impl GatewayServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let db_config = self.config.database.clone();
        let db = tokio::task::spawn_blocking(move || connect_and_migrate(&db_config))
            .await
            .map_err(|e| Error::Database(format!("database startup task failed: {e}")))??;

        let state = Arc::new(AppState::from_database(self.config, db)?);
        let listener = Self::bind(&state).await?;
        Self::serve(listener, state).await
    }

    pub async fn bind(state: &SharedState) -> Result<TcpListener> {
        let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("codetype gateway listening on {addr}");
        Ok(listener)
    }

    pub async fn serve(listener: TcpListener, state: SharedState) -> Result<()> {
        let app = build_router(state);
        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Gateway(format!("server error: {e}")))?;
        Ok(())
    }
}
