use std::sync::Arc;

use async_trait::async_trait;
use codetype_common::{DeletionPhase, Error, Result, UserId};
use codetype_db::HistoryStore;
use tracing::{info, warn};

use crate::admin_client::{IdentityAdmin, IdentityDeletion};

/// Removes a user's locally stored records.
#[async_trait]
pub trait HistoryCleaner: Send + Sync {
    async fn delete_by_user(&self, user_id: &UserId) -> Result<()>;
}

#[async_trait]
impl HistoryCleaner for HistoryStore {
    async fn delete_by_user(&self, user_id: &UserId) -> Result<()> {
        HistoryStore::delete_by_user(self, user_id).await.map(|_| ())
    }
}

/// Coordinates account deletion across the identity provider and local data.
///
/// The identity is removed first; history is purged only once that succeeds.
/// The two steps are not atomic: if the purge fails the identity is already
/// gone and the history stays until the next deletion attempt.
#[derive(Clone)]
pub struct AccountService {
    identities: Arc<dyn IdentityAdmin>,
    history: Arc<dyn HistoryCleaner>,
}

impl AccountService {
    pub fn new(identities: Arc<dyn IdentityAdmin>, history: Arc<dyn HistoryCleaner>) -> Self {
        Self {
            identities,
            history,
        }
    }

    pub async fn delete_account(&self, user_id: &UserId) -> Result<()> {
        user_id.to_uuid()?;

        let outcome = self
            .identities
            .delete_identity(user_id.as_str())
            .await
            .map_err(|e| phase_error(DeletionPhase::IdentityRemoval, user_id, e))?;
        match outcome {
            IdentityDeletion::Deleted => info!("identity {user_id} removed"),
            IdentityDeletion::AlreadyAbsent => info!("identity {user_id} was already absent"),
        }

        if let Err(e) = self.history.delete_by_user(user_id).await {
            warn!("identity {user_id} removed but history purge failed, history retained: {e}");
            return Err(phase_error(DeletionPhase::HistoryPurge, user_id, e));
        }

        info!("account {user_id} deleted");
        Ok(())
    }
}

fn phase_error(phase: DeletionPhase, user_id: &UserId, source: Error) -> Error {
    Error::AccountDeletion {
        phase,
        user_id: user_id.to_string(),
        source: Box::new(source),
    }
}
