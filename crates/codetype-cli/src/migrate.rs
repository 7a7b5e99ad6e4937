use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use codetype_config::DatabaseConfig;
use codetype_db::migrations::applied_migrations;
use codetype_db::{Database, MIGRATIONS, MigrationReport};

/// One known migration and when it was applied, if it has been.
pub struct MigrationStatus {
    pub name: &'static str,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Bring the configured database up to date.
pub fn run_migrations(config: &DatabaseConfig) -> Result<MigrationReport> {
    let db = Database::open(config).context("failed to open database")?;
    db.ping().context("database is not reachable")?;
    let report = db.migrate(MIGRATIONS)?;
    Ok(report)
}

/// Report every known migration without changing the schema.
pub fn migration_status(config: &DatabaseConfig) -> Result<Vec<MigrationStatus>> {
    let db = Database::open(config).context("failed to open database")?;
    let conn = db.connection()?;
    let applied = applied_migrations(&conn)?;

    Ok(MIGRATIONS
        .iter()
        .map(|m| MigrationStatus {
            name: m.name,
            applied_at: applied
                .iter()
                .find(|a| a.id == m.name)
                .map(|a| a.applied_at),
        })
        .collect())
}

pub fn print_report(report: &MigrationReport) {
    println!("Database migrations");
    println!("───────────────────");
    if report.applied.is_empty() {
        println!("  Schema already up to date ({} present)", report.skipped);
        return;
    }
    for name in &report.applied {
        println!("  applied  {name}");
    }
    println!(
        "  {} applied, {} already present",
        report.applied.len(),
        report.skipped
    );
}

pub fn print_status(statuses: &[MigrationStatus]) {
    println!("Database migrations");
    println!("───────────────────");
    for status in statuses {
        match status.applied_at {
            Some(at) => println!("  applied  {}  ({})", status.name, at.to_rfc3339()),
            None => println!("  pending  {}", status.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{migration_status, run_migrations};
    use codetype_config::DatabaseConfig;
    use codetype_db::MIGRATIONS;

    fn config(dir: &tempfile::TempDir) -> DatabaseConfig {
        DatabaseConfig {
            path: dir.path().join("codetype.db").display().to_string(),
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn status_is_pending_until_migrations_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);

        let before = migration_status(&config).expect("status should load");
        assert_eq!(before.len(), MIGRATIONS.len());
        assert!(before.iter().all(|s| s.applied_at.is_none()));

        let report = run_migrations(&config).expect("migrations should apply");
        assert_eq!(report.applied.len(), MIGRATIONS.len());

        let after = migration_status(&config).expect("status should load");
        assert!(after.iter().all(|s| s.applied_at.is_some()));
    }

    #[test]
    fn second_run_applies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);

        run_migrations(&config).expect("first run should apply");
        let report = run_migrations(&config).expect("second run should succeed");
        assert!(report.applied.is_empty());
        assert_eq!(report.skipped, MIGRATIONS.len());
    }
}
