//! SQLite connection and schema

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

/// Current schema version, stored in `PRAGMA user_version`
const SCHEMA_VERSION: i32 = 1;

/// Database connection wrapper
///
/// One connection guarded by a mutex; every statement runs under the lock, so
/// writers are serialized.
pub struct Database {
    conn: Mutex<Connection>,
}

pub type SharedDatabase = Arc<Database>;

impl Database {
    /// Open (or create) the database at `path` and run migrations
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    fn migrate(conn: &Connection) -> Result<()> {
        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS last_read_position (
                     id INTEGER PRIMARY KEY CHECK (id = 1),
                     surah INTEGER NOT NULL,
                     ayah INTEGER NOT NULL,
                     page INTEGER NOT NULL,
                     scroll_y INTEGER NOT NULL,
                     timestamp INTEGER NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS daily_stat (
                     date TEXT PRIMARY KEY,
                     pages_read INTEGER NOT NULL DEFAULT 0 CHECK (pages_read >= 0),
                     seconds_read INTEGER NOT NULL DEFAULT 0 CHECK (seconds_read >= 0)
                 );",
            )
            .context("Failed to create schema")?;
        }

        if version != SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            tracing::info!(from = version, to = SCHEMA_VERSION, "Migrated database schema");
        }

        Ok(())
    }
}
