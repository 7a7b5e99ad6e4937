pub mod error;
pub mod types;

pub use error::{DeletionPhase, Error, Result};
pub use types::UserId;
