pub mod history_store;
pub mod migrations;
pub mod pool;
mod timestamp;

pub use history_store::{
    DEFAULT_PAGE_LIMIT, HistoryEntry, HistoryStore, Language, MAX_PAGE_LIMIT, NewHistoryEntry,
    Page,
};
pub use migrations::{AppliedMigration, MIGRATIONS, Migration, MigrationReport};
pub use pool::{Database, connect_and_migrate};
pub use timestamp::ensure_storable;
