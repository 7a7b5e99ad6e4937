use std::time::Duration;

use codetype_common::{Error, Result};
use codetype_config::DatabaseConfig;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::info;

use crate::migrations::{self, MIGRATIONS, Migration, MigrationReport};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const CONNECTION_PRAGMAS: &str =
    "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;";
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded pool of SQLite connections shared by every store.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        info!(
            "opening database at {} (max_open={}, max_idle={}, max_lifetime={}s)",
            config.path,
            config.max_open_connections,
            config.max_idle_connections,
            config.connection_max_lifetime_secs
        );

        let manager = SqliteConnectionManager::file(&config.path)
            .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));

        let pool = Pool::builder()
            .max_size(config.max_open_connections)
            .min_idle(Some(config.max_idle_connections))
            .max_lifetime(Some(config.connection_max_lifetime()))
            .connection_timeout(ACQUIRE_TIMEOUT)
            .build(manager)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        Ok(Self { pool })
    }

    /// Single-connection pool over a private in-memory database.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool
    /// keeps exactly one connection alive for its whole lifetime.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys=ON;"));

        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .max_lifetime(None)
            .idle_timeout(None)
            .connection_timeout(ACQUIRE_TIMEOUT)
            .build(manager)
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn connection(&self) -> Result<PooledConnection> {
        self.pool
            .get()
            .map_err(|e| Error::Database(format!("failed to acquire connection: {e}")))
    }

    pub fn ping(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::Database(format!("failed to ping database: {e}")))?;
        Ok(())
    }

    pub fn migrate(&self, migrations: &[Migration]) -> Result<MigrationReport> {
        let mut conn = self.connection()?;
        migrations::apply(&mut conn, migrations)
    }

    /// Run blocking database work on the blocking thread pool with a pooled
    /// connection. The connection is returned to the pool when `f` finishes.
    pub async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::Database(format!("failed to acquire connection: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| Error::Database(format!("database task failed: {e}")))?
    }
}

/// Open the pool, verify connectivity and bring the schema up to date.
///
/// Any error here must abort startup; the service never serves traffic on a
/// partially migrated schema.
pub fn connect_and_migrate(config: &DatabaseConfig) -> Result<Database> {
    let db = Database::open(config)?;
    db.ping()?;

    let report = db.migrate(MIGRATIONS)?;
    info!(
        "database schema up to date ({} applied, {} already present)",
        report.applied.len(),
        report.skipped
    );

    Ok(db)
}
