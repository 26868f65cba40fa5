//! SQLite-backed relational store.
//!
//! One connection sits behind an async mutex. Short statements lock it for
//! their duration; a [`Transaction`] owns the lock until it commits or is
//! dropped.

use rusqlite::{ffi, Connection};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{info, warn};

use lockbox_common::{Error, Result, StorageError};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        login TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS resources (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        kind INTEGER NOT NULL,
        data BLOB NOT NULL,
        meta BLOB NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_resources_owner_kind ON resources(user_id, kind);
"#;

/// Translate a driver error into the storage taxonomy.
pub fn map_sqlite_error(err: rusqlite::Error) -> StorageError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return StorageError::ForeignKeyViolation(err.to_string())
            }
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return StorageError::UniqueViolation(err.to_string())
            }
            _ => {}
        }
    }
    StorageError::Other(err.to_string())
}

/// Shorthand for `map_err` on driver results.
pub(crate) fn db_err(err: rusqlite::Error) -> Error {
    Error::Storage(map_sqlite_error(err))
}

/// Shared handle to the relational store.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create or open a database file and apply the schema.
    ///
    /// # Errors
    /// - Database creation or migration failure
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;
        let db = Self::init(conn)?;
        info!(path = %path.as_ref().display(), "Database opened");
        Ok(db)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection for a short, non-transactional statement.
    pub(crate) async fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// Start an immediate (write-locking) transaction.
    ///
    /// # Postconditions
    /// - The connection stays locked until the transaction is committed,
    ///   rolled back or dropped
    pub async fn begin(&self) -> Result<Transaction> {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        conn.execute_batch("BEGIN IMMEDIATE").map_err(db_err)?;
        Ok(Transaction {
            conn,
            finished: false,
        })
    }
}

/// An open transaction that rolls back on drop unless committed.
///
/// Dereferences to the connection so the statement helpers in this crate
/// can run inside it.
pub struct Transaction {
    conn: OwnedMutexGuard<Connection>,
    finished: bool,
}

impl Transaction {
    pub fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT").map_err(db_err)?;
        self.finished = true;
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK").map_err(db_err)
    }
}

impl Deref for Transaction {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "Rollback on drop failed");
            }
        }
    }
}
