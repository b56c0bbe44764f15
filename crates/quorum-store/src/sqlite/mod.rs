//! SQLite storage for teams, users, pull requests, and reviewer links.
//!
//! # Schema Versioning
//!
//! The database uses SQLite's `user_version` pragma to track schema versions.
//! When the schema changes, increment `SCHEMA_VERSION` and add a migration
//! step in `run_migrations`.

mod identity;
mod work_items;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use quorum_core::{QuorumError, Result, StoreConfig};
use rusqlite::types::Type;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{Store, UnitOfWork};

/// Current schema version. Increment when making schema changes.
const SCHEMA_VERSION: i32 = 1;

/// SQLite-backed [`Store`].
///
/// Uses a `Mutex<Connection>` because `rusqlite::Connection` is not `Sync`.
/// The mutex is held for the lifetime of one transaction and nothing else.
/// Writing transactions start with `BEGIN IMMEDIATE`, so two processes that
/// share the database file are serialised by SQLite's write lock as well.
///
/// # Examples
///
/// ```
/// use quorum_store::{IdentityStore, SqliteStore, Store};
///
/// let store = SqliteStore::in_memory().unwrap();
/// let exists = store.read(|tx| tx.team_exists("backend")).unwrap();
/// assert!(!exists);
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`QuorumError::Database`] if the database cannot be opened or
    /// migrated.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use quorum_store::SqliteStore;
    ///
    /// let store = SqliteStore::open(Path::new(".quorum/quorum.db")).unwrap();
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(&StoreConfig {
            path: path.to_path_buf(),
            ..StoreConfig::default()
        })
    }

    /// Open the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`QuorumError::Database`] if the database cannot be opened or
    /// migrated.
    pub fn open_with_config(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    QuorumError::Database(format!("failed to create database directory: {e}"))
                })?;
            }
        }
        let conn = Connection::open(&config.path).map_err(|e| {
            QuorumError::Database(format!(
                "failed to open database at {}: {e}",
                config.path.display()
            ))
        })?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(db_err("failed to set busy timeout"))?;

        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`QuorumError::Database`] if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(db_err("failed to create in-memory database"))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(db_err("failed to enable foreign keys"))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// The schema version recorded in the database.
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.lock()?;
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(db_err("failed to read schema version"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| QuorumError::Database("connection mutex poisoned".into()))
    }

    fn run<T, F>(&self, behavior: TransactionBehavior, f: F) -> Result<T>
    where
        F: FnOnce(&dyn UnitOfWork) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(db_err("failed to begin transaction"))?;
        let unit = SqliteTx { tx };

        match f(&unit) {
            Ok(value) => {
                unit.tx
                    .commit()
                    .map_err(db_err("failed to commit transaction"))?;
                Ok(value)
            }
            Err(e) => {
                // Dropping the transaction rolls it back.
                tracing::debug!(error = %e, "rolling back transaction");
                Err(e)
            }
        }
    }
}

impl Store for SqliteStore {
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn UnitOfWork) -> Result<T>,
    {
        self.run(TransactionBehavior::Immediate, f)
    }

    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn UnitOfWork) -> Result<T>,
    {
        self.run(TransactionBehavior::Deferred, f)
    }
}

/// A single open transaction. Implements both collaborator traits.
pub struct SqliteTx<'conn> {
    tx: Transaction<'conn>,
}

fn init_schema(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(db_err("failed to read schema version"))?;

    if current_version > SCHEMA_VERSION {
        return Err(QuorumError::Database(format!(
            "database schema version {current_version} is newer than supported version \
             {SCHEMA_VERSION}; upgrade quorum"
        )));
    }

    if current_version < SCHEMA_VERSION {
        run_migrations(conn, current_version)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(db_err("failed to record schema version"))?;
    }

    Ok(())
}

fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    if from_version < 1 {
        migrate_v0_to_v1(conn)?;
    }
    Ok(())
}

fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS teams (
            team_name TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            team_name TEXT REFERENCES teams(team_name),
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX IF NOT EXISTS idx_users_team_active ON users(team_name, is_active);

        CREATE TABLE IF NOT EXISTS pull_requests (
            pull_request_id TEXT PRIMARY KEY,
            pull_request_name TEXT NOT NULL,
            author_id TEXT NOT NULL REFERENCES users(user_id),
            status TEXT NOT NULL DEFAULT 'OPEN' CHECK (status IN ('OPEN', 'MERGED')),
            created_at TEXT NOT NULL,
            merged_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_pull_requests_status ON pull_requests(status);

        -- The composite key rules out assigning the same reviewer twice.
        CREATE TABLE IF NOT EXISTS pr_reviewers (
            pull_request_id TEXT NOT NULL
                REFERENCES pull_requests(pull_request_id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(user_id),
            PRIMARY KEY (pull_request_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_pr_reviewers_user ON pr_reviewers(user_id);
        ",
    )
    .map_err(db_err("failed to create schema"))
}

fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> QuorumError {
    move |e| QuorumError::Database(format!("{context}: {e}"))
}

/// `?1, ?2, ..., ?n` for an `IN (...)` clause.
fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    // Fixed precision keeps lexical order equal to chronological order.
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered() {
        assert_eq!(placeholders(1), "?1");
        assert_eq!(placeholders(3), "?1, ?2, ?3");
    }

    #[test]
    fn timestamps_keep_chronological_order_as_text() {
        let early = DateTime::parse_from_rfc3339("2025-03-01T10:00:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2025-03-01T10:00:05.5Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(format_timestamp(&early) < format_timestamp(&later));
        assert_eq!(parse_timestamp(0, &format_timestamp(&later)).unwrap(), later);
    }

    #[test]
    fn new_database_is_at_current_version() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn reopening_a_file_keeps_the_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/quorum.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.transaction(|tx| tx.create_team("backend")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        assert!(store.read(|tx| tx.team_exists("backend")).unwrap());
    }

    #[test]
    fn newer_schema_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quorum.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
                .unwrap();
        }
        let err = SqliteStore::open(&path).err().unwrap();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn failed_closure_rolls_back() {
        let store = SqliteStore::in_memory().unwrap();
        let result: Result<()> = store.transaction(|tx| {
            tx.create_team("backend")?;
            Err(QuorumError::Conflict("abort".into()))
        });
        assert!(result.is_err());
        assert!(!store.read(|tx| tx.team_exists("backend")).unwrap());
    }
}
