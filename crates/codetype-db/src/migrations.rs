//! Schema migrations, applied exactly once per name.
//!
//! Migrations run in lexicographic order of their names and are tracked in a
//! `schema_migrations` table. Each script commits atomically with its tracking
//! row, so a crash mid-apply leaves the migration either fully applied and
//! recorded, or neither.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use codetype_common::{Error, Result};
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::timestamp::{format_timestamp, parse_timestamp};

/// A named schema-change script.
///
/// Names must sort lexicographically into apply order, e.g. zero-padded
/// sequence prefixes.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Migrations shipped with this build.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_create_practice_history.sql",
        sql: include_str!("../migrations/0001_create_practice_history.sql"),
    },
    Migration {
        name: "0002_index_practice_history_user.sql",
        sql: include_str!("../migrations/0002_index_practice_history_user.sql"),
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Names applied by this run, in apply order.
    pub applied: Vec<String>,
    /// Migrations already recorded before this run.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub id: String,
    pub applied_at: DateTime<Utc>,
}

const CREATE_TRACKING_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    id TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL
);";

/// Apply every migration in `migrations` that is not yet recorded.
///
/// The first failure aborts the run: that migration's transaction is rolled
/// back and the error names it. Earlier migrations in the same run stay
/// committed.
pub fn apply(conn: &mut Connection, migrations: &[Migration]) -> Result<MigrationReport> {
    conn.execute_batch(CREATE_TRACKING_TABLE)
        .map_err(|e| Error::Database(format!("failed to create schema_migrations table: {e}")))?;

    let mut ordered: Vec<&Migration> = migrations.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(b.name));
    if let Some(pair) = ordered.windows(2).find(|pair| pair[0].name == pair[1].name) {
        return Err(Error::Migration {
            name: pair[0].name.to_string(),
            reason: "duplicate migration name".into(),
        });
    }

    let applied = applied_names(conn)?;
    let mut report = MigrationReport::default();

    for migration in ordered {
        if applied.contains(migration.name) {
            debug!("migration {} already applied", migration.name);
            report.skipped += 1;
            continue;
        }

        apply_one(conn, migration)?;
        info!("applied migration {}", migration.name);
        report.applied.push(migration.name.to_string());
    }

    Ok(report)
}

fn apply_one(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let fail = |stage: &str, e: rusqlite::Error| Error::Migration {
        name: migration.name.to_string(),
        reason: format!("{stage}: {e}"),
    };

    let applied_at = format_timestamp(Utc::now())?;

    // Dropping `tx` on any early return rolls the migration back.
    let tx = conn
        .transaction()
        .map_err(|e| fail("begin transaction", e))?;

    tx.execute_batch(migration.sql)
        .map_err(|e| fail("execute script", e))?;

    tx.execute(
        "INSERT INTO schema_migrations (id, applied_at) VALUES (?1, ?2)",
        params![migration.name, applied_at],
    )
    .map_err(|e| fail("record migration", e))?;

    tx.commit().map_err(|e| fail("commit", e))
}

fn applied_names(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("SELECT id FROM schema_migrations")
        .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

    rows.collect::<std::result::Result<HashSet<_>, _>>()
        .map_err(|e| Error::Database(format!("failed to read migration id: {e}")))
}

/// Recorded migrations in name order. Empty when the tracking table does not
/// exist yet.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<AppliedMigration>> {
    let exists: i64 = conn
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='schema_migrations'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::Database(format!("failed to inspect schema: {e}")))?;
    if exists == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare("SELECT id, applied_at FROM schema_migrations ORDER BY id")
        .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

    let mut out = Vec::new();
    for row in rows {
        let (id, applied_at) =
            row.map_err(|e| Error::Database(format!("failed to read applied migration: {e}")))?;
        out.push(AppliedMigration {
            applied_at: parse_timestamp(&applied_at)?,
            id,
        });
    }
    Ok(out)
}
