//! SQLite-backed ShowSet store implementation.
//!
//! This module provides [`SqliteShowSetStore`], a persistent implementation
//! of [`ShowSetStore`] backed by SQLite.

use crate::{ActivityEntry, Effect, Result, ShowSet, WorkflowError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{activity_entries, ShowSetStore, INITIAL_REVISION};

/// Schema version for migrations.
const SCHEMA_VERSION: i32 = 1;

/// SQL for creating the show_sets table.
const CREATE_SHOW_SETS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS show_sets (
        show_set_id TEXT NOT NULL PRIMARY KEY,
        revision INTEGER NOT NULL,
        data_json TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

/// SQL for creating the activity_log table.
const CREATE_ACTIVITY_LOG_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS activity_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        show_set_id TEXT NOT NULL,
        entry_json TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
"#;

/// SQL for creating the schema_version table.
const CREATE_SCHEMA_VERSION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    )
"#;

/// Index on activity_log for per-ShowSet queries.
const CREATE_ACTIVITY_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_activity_show_set
    ON activity_log (show_set_id)
"#;

fn db_error(context: &'static str) -> impl FnOnce(rusqlite::Error) -> WorkflowError {
    move |e| WorkflowError::StateStore(format!("{}: {}", context, e))
}

fn join_error(e: tokio::task::JoinError) -> WorkflowError {
    WorkflowError::StateStore(format!("spawn_blocking failed: {}", e))
}

/// A SQLite-backed implementation of [`ShowSetStore`].
///
/// Each ShowSet is stored as one JSON row next to its revision. A commit runs
/// the revision check, the snapshot update and the activity inserts in one
/// transaction.
///
/// # Thread Safety
///
/// The store wraps the SQLite connection in a `Mutex` and uses
/// `spawn_blocking` for all database operations, making it safe
/// for use in async contexts.
///
/// # Example
///
/// ```rust,ignore
/// use showset_workflow::SqliteShowSetStore;
///
/// // Open or create a database file
/// let store = SqliteShowSetStore::open("showsets.db").await?;
///
/// // Or use an in-memory database for testing
/// let store = SqliteShowSetStore::open_in_memory().await?;
/// ```
#[derive(Clone)]
pub struct SqliteShowSetStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteShowSetStore {
    /// Opens a SQLite database at the given path.
    ///
    /// Creates the database and schema if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the
    /// schema cannot be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let conn = tokio::task::spawn_blocking(move || Connection::open(&path))
            .await
            .map_err(join_error)?
            .map_err(db_error("failed to open database"))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.run_migrations().await?;
        Ok(store)
    }

    /// Opens an in-memory SQLite database.
    ///
    /// Useful for testing. The database is lost when the store is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(Connection::open_in_memory)
            .await
            .map_err(join_error)?
            .map_err(db_error("failed to open in-memory database"))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.run_migrations().await?;
        Ok(store)
    }

    /// Runs schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();

            conn.execute(CREATE_SCHEMA_VERSION_TABLE, [])?;

            let version: Option<i32> = conn
                .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                    row.get(0)
                })
                .optional()?;

            if version.map_or(true, |v| v < SCHEMA_VERSION) {
                conn.execute(CREATE_SHOW_SETS_TABLE, [])?;
                conn.execute(CREATE_ACTIVITY_LOG_TABLE, [])?;
                conn.execute(CREATE_ACTIVITY_INDEX, [])?;

                conn.execute("DELETE FROM schema_version", [])?;
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    params![SCHEMA_VERSION],
                )?;
            }

            Ok::<(), rusqlite::Error>(())
        })
        .await
        .map_err(join_error)?
        .map_err(db_error("migration failed"))
    }

    /// Checks if the required tables exist.
    ///
    /// Useful for testing that the schema was created correctly.
    pub async fn tables_exist(&self) -> Result<bool> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('show_sets', 'activity_log', 'schema_version')",
                [],
                |row| row.get(0),
            )?;
            Ok::<bool, rusqlite::Error>(count == 3)
        })
        .await
        .map_err(join_error)?
        .map_err(db_error("table check failed"))
    }
}

// Debug implementation that doesn't expose connection details
impl std::fmt::Debug for SqliteShowSetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteShowSetStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl ShowSetStore for SqliteShowSetStore {
    async fn insert(&self, show_set: &ShowSet) -> Result<u64> {
        let conn = Arc::clone(&self.conn);
        let mut stored = show_set.clone();
        stored.revision = INITIAL_REVISION;
        let id = stored.show_set_id.clone();
        let data_json = serde_json::to_string(&stored)?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO show_sets (show_set_id, revision, data_json, updated_at) VALUES (?1, ?2, ?3, ?4)",
                    params![id, INITIAL_REVISION as i64, data_json, updated_at],
                )
                .map_err(db_error("insert failed"))?;
            if inserted == 0 {
                return Err(WorkflowError::DuplicateShowSet(id));
            }
            Ok(INITIAL_REVISION)
        })
        .await
        .map_err(join_error)?
    }

    async fn load(&self, show_set_id: &str) -> Result<Option<ShowSet>> {
        let conn = Arc::clone(&self.conn);
        let show_set_id = show_set_id.to_string();

        let data_json = tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.query_row(
                "SELECT data_json FROM show_sets WHERE show_set_id = ?1",
                params![show_set_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
        .await
        .map_err(join_error)?
        .map_err(db_error("query failed"))?;

        match data_json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn commit(
        &self,
        show_set: &ShowSet,
        expected_revision: u64,
        effects: &[Effect],
    ) -> Result<u64> {
        let conn = Arc::clone(&self.conn);
        let revision = expected_revision + 1;
        let mut stored = show_set.clone();
        stored.revision = revision;
        let id = stored.show_set_id.clone();
        let data_json = serde_json::to_string(&stored)?;
        let entries = activity_entries(effects)
            .iter()
            .map(|entry| Ok((serde_json::to_string(entry)?, entry.at.to_rfc3339())))
            .collect::<Result<Vec<_>>>()?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction().map_err(db_error("begin failed"))?;

            let actual: Option<i64> = tx
                .query_row(
                    "SELECT revision FROM show_sets WHERE show_set_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_error("query failed"))?;
            let actual = match actual {
                Some(actual) => actual as u64,
                None => return Err(WorkflowError::ShowSetNotFound(id)),
            };
            if actual != expected_revision {
                return Err(WorkflowError::Conflict {
                    id,
                    expected: expected_revision,
                    actual,
                });
            }

            tx.execute(
                "UPDATE show_sets SET revision = ?1, data_json = ?2, updated_at = ?3 WHERE show_set_id = ?4 AND revision = ?5",
                params![revision as i64, data_json, updated_at, id, expected_revision as i64],
            )
            .map_err(db_error("update failed"))?;
            for (entry_json, created_at) in entries {
                tx.execute(
                    "INSERT INTO activity_log (show_set_id, entry_json, created_at) VALUES (?1, ?2, ?3)",
                    params![id, entry_json, created_at],
                )
                .map_err(db_error("activity insert failed"))?;
            }
            tx.commit().map_err(db_error("commit failed"))?;
            Ok(revision)
        })
        .await
        .map_err(join_error)?
    }

    async fn activity(&self, show_set_id: &str) -> Result<Vec<ActivityEntry>> {
        let conn = Arc::clone(&self.conn);
        let show_set_id = show_set_id.to_string();

        let rows = tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT entry_json FROM activity_log WHERE show_set_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![show_set_id], |row| row.get::<_, String>(0))?;
            rows.collect::<std::result::Result<Vec<String>, _>>()
        })
        .await
        .map_err(join_error)?
        .map_err(db_error("query failed"))?;

        rows.iter()
            .map(|json| Ok(serde_json::from_str(json)?))
            .collect()
    }

    async fn delete(&self, show_set_id: &str) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let show_set_id = show_set_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "DELETE FROM activity_log WHERE show_set_id = ?1",
                params![show_set_id],
            )?;
            conn.execute(
                "DELETE FROM show_sets WHERE show_set_id = ?1",
                params![show_set_id],
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await
        .map_err(join_error)?
        .map_err(db_error("delete failed"))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare("SELECT show_set_id FROM show_sets ORDER BY show_set_id")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<std::result::Result<Vec<String>, _>>()
        })
        .await
        .map_err(join_error)?
        .map_err(db_error("query failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActionKind, Role, StageName, StageOrdering, StageStatus};
    use chrono::Utc;

    fn show_set(id: &str) -> ShowSet {
        ShowSet::new(id, "Hall B", "Finale", &StageOrdering::default())
    }

    fn activity(id: &str, summary: &str) -> Effect {
        Effect::Activity {
            entry: ActivityEntry {
                show_set_id: id.to_string(),
                user_id: "u-1".to_string(),
                role: Role::Admin,
                action: ActionKind::SetStatus,
                stage: Some(StageName::Screen),
                summary: summary.to_string(),
                at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = SqliteShowSetStore::open_in_memory().await;
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn test_tables_created() {
        let store = SqliteShowSetStore::open_in_memory().await.unwrap();
        assert!(store.tables_exist().await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_load_and_duplicate() {
        let store = SqliteShowSetStore::open_in_memory().await.unwrap();
        assert!(store.load("SS-1").await.unwrap().is_none());

        assert_eq!(store.insert(&show_set("SS-1")).await.unwrap(), INITIAL_REVISION);
        let loaded = store.load("SS-1").await.unwrap().unwrap();
        assert_eq!(loaded.revision, INITIAL_REVISION);
        assert_eq!(loaded.status(StageName::InBim360), Some(StageStatus::NotStarted));

        let err = store.insert(&show_set("SS-1")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateShowSet(_)));
    }

    #[tokio::test]
    async fn test_commit_and_conflict() {
        let store = SqliteShowSetStore::open_in_memory().await.unwrap();
        store.insert(&show_set("SS-1")).await.unwrap();
        let snapshot = store.load("SS-1").await.unwrap().unwrap();

        let revision = store
            .commit(&snapshot, 1, &[activity("SS-1", "first")])
            .await
            .unwrap();
        assert_eq!(revision, 2);

        let err = store
            .commit(&snapshot, 1, &[activity("SS-1", "stale")])
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict { actual: 2, .. }));

        let log = store.activity("SS-1").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].summary, "first");
    }

    #[tokio::test]
    async fn test_commit_missing() {
        let store = SqliteShowSetStore::open_in_memory().await.unwrap();
        let err = store.commit(&show_set("SS-9"), 1, &[]).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ShowSetNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let store = SqliteShowSetStore::open_in_memory().await.unwrap();
        store.insert(&show_set("SS-2")).await.unwrap();
        store.insert(&show_set("SS-1")).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["SS-1", "SS-2"]);

        store.delete("SS-2").await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["SS-1"]);
    }

    #[tokio::test]
    async fn test_persistence_across_reopens() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("showset_test_{}.db", std::process::id()));
        let _ = std::fs::remove_file(&db_path);

        {
            let store = SqliteShowSetStore::open(&db_path).await.unwrap();
            store.insert(&show_set("SS-07-01")).await.unwrap();
            let snapshot = store.load("SS-07-01").await.unwrap().unwrap();
            store
                .commit(&snapshot, 1, &[activity("SS-07-01", "kept")])
                .await
                .unwrap();
        }

        {
            let store = SqliteShowSetStore::open(&db_path).await.unwrap();
            let loaded = store.load("SS-07-01").await.unwrap().unwrap();
            assert_eq!(loaded.revision, 2);
            assert_eq!(store.activity("SS-07-01").await.unwrap().len(), 1);
        }

        let _ = std::fs::remove_file(&db_path);
    }
}
