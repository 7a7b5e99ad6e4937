use std::sync::Arc;

use codetype_accounts::{AccountService, IdentityAdminClient};
use codetype_common::Result;
use codetype_config::AppConfig;
use codetype_db::{Database, HistoryStore};

/// Shared application state accessible from all request handlers.
pub struct AppState {
    pub config: AppConfig,
    pub history: HistoryStore,
    pub accounts: AccountService,
}

impl AppState {
    pub fn new(config: AppConfig, history: HistoryStore, accounts: AccountService) -> Self {
        Self {
            config,
            history,
            accounts,
        }
    }

    /// Wire the stores and the identity admin client from configuration.
    pub fn from_database(config: AppConfig, db: Database) -> Result<Self> {
        let admin = IdentityAdminClient::with_timeout(
            &config.identity.admin_url,
            config.identity.request_timeout(),
        )?;
        let history = HistoryStore::new(db);
        let accounts = AccountService::new(Arc::new(admin), Arc::new(history.clone()));
        Ok(Self::new(config, history, accounts))
    }

    /// Header carrying the caller identity asserted by the upstream gateway.
    pub fn user_id_header(&self) -> &str {
        &self.config.server.user_id_header
    }
}

pub type SharedState = Arc<AppState>;
