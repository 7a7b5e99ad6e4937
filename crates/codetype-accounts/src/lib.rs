pub mod admin_client;
pub mod deletion;

pub use admin_client::{
    DEFAULT_REQUEST_TIMEOUT, IdentityAdmin, IdentityAdminClient, IdentityDeletion,
};
pub use deletion::{AccountService, HistoryCleaner};
