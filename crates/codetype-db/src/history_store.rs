use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use codetype_common::{Error, Result, UserId};
use rusqlite::types::Type;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::pool::Database;
use crate::timestamp::{format_timestamp, parse_timestamp};

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 100;

const ENTRY_COLUMNS: &str =
    "id, user_id, language, wpm, accuracy, errors, duration_seconds, completed_at, created_at";

/// Languages a practice session can be typed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    Python,
    Go,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Go => "go",
        }
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "javascript" => Ok(Self::JavaScript),
            "python" => Ok(Self::Python),
            "go" => Ok(Self::Go),
            _ => Err(Error::Validation("unsupported language".into())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted practice-session result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub user_id: UserId,
    pub language: Language,
    pub wpm: u32,
    pub accuracy: u8,
    pub errors: u32,
    pub duration_seconds: u32,
    pub completed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Insert shape before the store assigns `id` and `created_at`.
///
/// Callers validate ranges first; the table's CHECK constraints reject
/// anything that slips through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub user_id: UserId,
    pub language: Language,
    pub wpm: u32,
    pub accuracy: u8,
    pub errors: u32,
    pub duration_seconds: u32,
    pub completed_at: DateTime<Utc>,
}

/// A clamped `LIMIT`/`OFFSET` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Non-positive limits fall back to the default, large ones are capped,
    /// negative offsets become zero.
    pub fn clamped(limit: i64, offset: i64) -> Self {
        let limit = if limit <= 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            limit.min(MAX_PAGE_LIMIT)
        };
        Self {
            limit,
            offset: offset.max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// Append-only store of practice history, scoped by user.
#[derive(Clone)]
pub struct HistoryStore {
    db: Database,
}

impl HistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert an entry and return the row as persisted.
    pub async fn create(&self, entry: NewHistoryEntry) -> Result<HistoryEntry> {
        let created = self
            .db
            .run_blocking(move |conn| insert_entry(conn, &entry))
            .await?;
        debug!("stored history entry {} for user {}", created.id, created.user_id);
        Ok(created)
    }

    /// Most recently completed first. Out-of-range paging values are clamped,
    /// never rejected.
    pub async fn list_by_user(
        &self,
        user_id: &UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoryEntry>> {
        let page = Page::clamped(limit, offset);
        let user_id = user_id.clone();
        self.db
            .run_blocking(move |conn| select_entries(conn, &user_id, page))
            .await
    }

    /// Remove every entry for `user_id`. Deleting nothing is a success.
    pub async fn delete_by_user(&self, user_id: &UserId) -> Result<usize> {
        let owner = user_id.clone();
        let deleted = self
            .db
            .run_blocking(move |conn| {
                conn.execute(
                    "DELETE FROM practice_history WHERE user_id = ?1",
                    params![owner.as_str()],
                )
                .map_err(|e| Error::Database(format!("failed to delete history entries: {e}")))
            })
            .await?;

        info!("deleted {deleted} history entries for user {user_id}");
        Ok(deleted)
    }
}

/// The insert and the read-back share a transaction, so a row that cannot be
/// mapped back is never left behind.
fn insert_entry(conn: &mut Connection, entry: &NewHistoryEntry) -> Result<HistoryEntry> {
    let completed_at = format_timestamp(entry.completed_at)?;
    let created_at = format_timestamp(Utc::now())?;

    let tx = conn
        .transaction()
        .map_err(|e| Error::Database(format!("failed to begin history insert: {e}")))?;

    let sql = format!(
        "INSERT INTO practice_history ({ENTRY_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         RETURNING {ENTRY_COLUMNS}"
    );

    let created = tx
        .query_row(
            &sql,
            params![
                Uuid::new_v4().to_string(),
                entry.user_id.as_str(),
                entry.language.as_str(),
                entry.wpm,
                entry.accuracy,
                entry.errors,
                entry.duration_seconds,
                completed_at,
                created_at,
            ],
            row_to_entry,
        )
        .map_err(|e| Error::Database(format!("failed to insert history entry: {e}")))?;

    tx.commit()
        .map_err(|e| Error::Database(format!("failed to commit history entry: {e}")))?;
    Ok(created)
}

fn select_entries(conn: &Connection, user_id: &UserId, page: Page) -> Result<Vec<HistoryEntry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS}
         FROM practice_history
         WHERE user_id = ?1
         ORDER BY completed_at DESC, created_at DESC
         LIMIT ?2 OFFSET ?3"
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::Database(format!("failed to prepare history query: {e}")))?;

    let rows = stmt
        .query_map(params![user_id.as_str(), page.limit, page.offset], row_to_entry)
        .map_err(|e| Error::Database(format!("failed to query history entries: {e}")))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Database(format!("failed to read history entries: {e}")))
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let user_id: String = row.get(1)?;
    let user_id = UserId::parse(user_id).map_err(|e| conversion_failure(1, e))?;

    let language: String = row.get(2)?;
    let language = language
        .parse::<Language>()
        .map_err(|e| conversion_failure(2, e))?;

    let completed_at: String = row.get(7)?;
    let completed_at = parse_timestamp(&completed_at).map_err(|e| conversion_failure(7, e))?;

    let created_at: String = row.get(8)?;
    let created_at = parse_timestamp(&created_at).map_err(|e| conversion_failure(8, e))?;

    Ok(HistoryEntry {
        id: row.get(0)?,
        user_id,
        language,
        wpm: row.get(3)?,
        accuracy: row.get(4)?,
        errors: row.get(5)?,
        duration_seconds: row.get(6)?,
        completed_at,
        created_at,
    })
}

fn conversion_failure(column: usize, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::{HistoryStore, Language, NewHistoryEntry, Page};
    use crate::migrations::MIGRATIONS;
    use crate::pool::Database;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use codetype_common::{Error, UserId};

    fn store() -> HistoryStore {
        let db = Database::in_memory().expect("failed to create in-memory database");
        db.migrate(MIGRATIONS).expect("migrations should apply");
        HistoryStore::new(db)
    }

    fn user(id: &str) -> UserId {
        UserId::parse(id).expect("valid user id")
    }

    fn new_entry(user_id: &str, completed_at: DateTime<Utc>) -> NewHistoryEntry {
        NewHistoryEntry {
            user_id: user(user_id),
            language: Language::Go,
            wpm: 80,
            accuracy: 95,
            errors: 2,
            duration_seconds: 60,
            completed_at,
        }
    }

    fn jan_first() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn page_clamping() {
        assert_eq!(Page::clamped(0, 0), Page::default());
        assert_eq!(Page::clamped(-5, 0).limit, 50);
        assert_eq!(Page::clamped(500, 0).limit, 100);
        assert_eq!(Page::clamped(20, -3), Page { limit: 20, offset: 0 });
        assert_eq!(Page::clamped(100, 7), Page { limit: 100, offset: 7 });
    }

    #[test]
    fn language_parsing_is_exact() {
        assert_eq!("go".parse::<Language>().unwrap(), Language::Go);
        assert_eq!("javascript".parse::<Language>().unwrap(), Language::JavaScript);
        assert!("ruby".parse::<Language>().is_err());
        assert!("Python".parse::<Language>().is_err());
    }

    #[tokio::test]
    async fn create_then_list_returns_the_stored_entry() {
        let store = store();
        let created = store
            .create(new_entry("u1", jan_first()))
            .await
            .expect("create should succeed");

        assert!(!created.id.is_empty());
        assert_eq!(created.completed_at, jan_first());

        let listed = store
            .list_by_user(&user("u1"), 50, 0)
            .await
            .expect("list should succeed");

        assert_eq!(listed, vec![created.clone()]);
        assert_eq!(listed[0].language, Language::Go);
        assert_eq!(listed[0].wpm, 80);
        assert_eq!(listed[0].accuracy, 95);
        assert_eq!(listed[0].errors, 2);
        assert_eq!(listed[0].duration_seconds, 60);
    }

    #[tokio::test]
    async fn list_orders_by_completion_descending() {
        let store = store();
        let t1 = jan_first();
        let t2 = t1 + Duration::hours(1);
        let t3 = t1 + Duration::days(2);

        // Insert out of order so created_at cannot explain the result.
        for ts in [t2, t3, t1] {
            store
                .create(new_entry("u1", ts))
                .await
                .expect("create should succeed");
        }

        let completed: Vec<_> = store
            .list_by_user(&user("u1"), 50, 0)
            .await
            .expect("list should succeed")
            .into_iter()
            .map(|e| e.completed_at)
            .collect();

        assert_eq!(completed, vec![t3, t2, t1]);
    }

    #[tokio::test]
    async fn list_clamps_limit_and_offset() {
        let store = store();
        for i in 0..105 {
            store
                .create(new_entry("u1", jan_first() + Duration::minutes(i)))
                .await
                .expect("create should succeed");
        }
        let u1 = user("u1");

        let default_page = store.list_by_user(&u1, 50, 0).await.unwrap();
        assert_eq!(default_page.len(), 50);
        assert_eq!(store.list_by_user(&u1, 0, 0).await.unwrap(), default_page);
        assert_eq!(store.list_by_user(&u1, -5, 0).await.unwrap(), default_page);
        assert_eq!(store.list_by_user(&u1, 500, 0).await.unwrap().len(), 100);
        assert_eq!(store.list_by_user(&u1, 50, -10).await.unwrap(), default_page);

        let tail = store.list_by_user(&u1, 50, 100).await.unwrap();
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[4].completed_at, jan_first());
    }

    #[tokio::test]
    async fn list_is_scoped_to_the_user_and_empty_when_nothing_matches() {
        let store = store();
        store.create(new_entry("u1", jan_first())).await.unwrap();
        store.create(new_entry("u2", jan_first())).await.unwrap();

        let u1 = store.list_by_user(&user("u1"), 50, 0).await.unwrap();
        assert_eq!(u1.len(), 1);
        assert_eq!(u1[0].user_id, user("u1"));

        let nobody = store.list_by_user(&user("nobody"), 50, 0).await.unwrap();
        assert!(nobody.is_empty());
    }

    #[tokio::test]
    async fn delete_by_user_then_list_is_empty() {
        let store = store();
        store.create(new_entry("u1", jan_first())).await.unwrap();
        store.create(new_entry("u1", jan_first())).await.unwrap();
        store.create(new_entry("u2", jan_first())).await.unwrap();

        let deleted = store.delete_by_user(&user("u1")).await.unwrap();
        assert_eq!(deleted, 2);

        assert!(store.list_by_user(&user("u1"), 50, 0).await.unwrap().is_empty());
        assert_eq!(store.list_by_user(&user("u2"), 50, 0).await.unwrap().len(), 1);

        let again = store.delete_by_user(&user("u1")).await.unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn completion_outside_four_digit_years_is_rejected_without_a_row() {
        let store = store();
        store.create(new_entry("u1", jan_first())).await.unwrap();

        let past_9999 = DateTime::parse_from_rfc3339("9999-12-31T23:00:00-05:00")
            .unwrap()
            .with_timezone(&Utc);
        let err = store
            .create(new_entry("u1", past_9999))
            .await
            .expect_err("year 10000 should be rejected");
        assert!(matches!(err, Error::Validation(_)));

        let listed = store
            .list_by_user(&user("u1"), 50, 0)
            .await
            .expect("list should still succeed");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].completed_at, jan_first());
    }

    #[tokio::test]
    async fn latest_representable_completion_is_listed_first() {
        let store = store();
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        store.create(new_entry("u1", jan_first())).await.unwrap();
        store.create(new_entry("u1", last)).await.unwrap();

        let completed: Vec<_> = store
            .list_by_user(&user("u1"), 50, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.completed_at)
            .collect();
        assert_eq!(completed, vec![last, jan_first()]);
    }

    #[tokio::test]
    async fn out_of_range_accuracy_is_rejected_by_the_table() {
        let store = store();
        let mut entry = new_entry("u1", jan_first());
        entry.accuracy = 101;

        assert!(store.create(entry).await.is_err());
        assert!(store.list_by_user(&user("u1"), 50, 0).await.unwrap().is_empty());
    }
}
