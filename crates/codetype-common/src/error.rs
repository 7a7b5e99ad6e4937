use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("database error: {0}")]
    Database(String),

    /// A schema migration failed. Always fatal to startup.
    #[error("migration {name} failed: {reason}")]
    Migration { name: String, reason: String },

    #[error("identity provider error: {0}")]
    IdentityProvider(String),

    #[error("account deletion failed during {phase} for user {user_id}: {source}")]
    AccountDeletion {
        phase: DeletionPhase,
        user_id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The two externally visible steps of an account deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPhase {
    IdentityRemoval,
    HistoryPurge,
}

impl fmt::Display for DeletionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentityRemoval => f.write_str("identity removal"),
            Self::HistoryPurge => f.write_str("history purge"),
        }
    }
}
