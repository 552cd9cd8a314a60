//! SQLite database wrapper
//!
//! Thin owner of a `rusqlite::Connection` with the pragmas every chunk store
//! connection needs. Domain wrappers (see `store::ChunkStore`) own one of these.

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use crate::error::StoreError;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(1);

/// SQLite database handle
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Open or create a SQLite database file
    ///
    /// Creates the parent directory if it does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Store(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            StoreError::Store(format!("Failed to open {}: {}", path.display(), e))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self { conn })
    }

    /// Create an in-memory database for testing
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Get reference to underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get mutable reference to underlying connection (for transactions)
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_parent_dir() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("nested").join("db").join("rag.db");

        let db = SqliteDatabase::open(&path)?;
        db.connection().execute_batch("CREATE TABLE t (id INTEGER)")?;

        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_basic_operations() -> anyhow::Result<()> {
        let db = SqliteDatabase::open_in_memory()?;

        db.connection().execute_batch("CREATE TABLE test (id INTEGER, name TEXT)")?;
        db.connection()
            .execute("INSERT INTO test VALUES (?, ?)", (1, "test"))?;

        let name: String = db
            .connection()
            .query_row("SELECT name FROM test WHERE id = ?", [1], |row| row.get(0))?;
        assert_eq!(name, "test");

        Ok(())
    }
}
