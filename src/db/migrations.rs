//! Versioned schema migrations for the chunk store
//!
//! The version lives in `PRAGMA user_version`. Every step is also idempotent
//! on its own, because stores written by the original ingestion scripts never
//! set a version: a version-0 store may already have the table, the unique
//! index, or the `priority` column.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::StoreError;

/// Schema version after all migrations have run
pub const SCHEMA_VERSION: i64 = 3;

/// Chunk table name
pub const CHUNKS_TABLE: &str = "rag_chunks";

struct Migration {
    version: i64,
    name: &'static str,
    apply: fn(&Connection) -> rusqlite::Result<()>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create rag_chunks",
        apply: create_chunks_table,
    },
    Migration {
        version: 2,
        name: "unique natural key",
        apply: create_natural_key_index,
    },
    Migration {
        version: 3,
        name: "priority column",
        apply: add_priority_column,
    },
];

fn create_chunks_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS rag_chunks (
            id TEXT PRIMARY KEY,
            source_path TEXT NOT NULL,
            kind TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            emb BLOB NOT NULL,
            dim INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_rag_source ON rag_chunks(source_path);
        CREATE INDEX IF NOT EXISTS idx_rag_kind ON rag_chunks(kind);",
    )
}

fn create_natural_key_index(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_rag_chunks_sp_kind_idx
         ON rag_chunks(source_path, kind, chunk_index)",
    )
}

fn add_priority_column(conn: &Connection) -> rusqlite::Result<()> {
    if !has_column(conn, CHUNKS_TABLE, "priority")? {
        conn.execute_batch(
            "ALTER TABLE rag_chunks ADD COLUMN priority TEXT NOT NULL DEFAULT 'normal'",
        )?;
    }
    Ok(())
}

/// Check whether `table` has a column named `column`
pub fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|n| n == column))
}

/// Current `user_version` of the database
pub fn schema_version(conn: &Connection) -> Result<i64, StoreError> {
    let version = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// Each pending step runs in its own transaction together with the version
/// bump, so a failed step leaves the store at the previous version.
/// Safe to call on every open: a current store is a no-op.
pub fn run(conn: &mut Connection) -> Result<(), StoreError> {
    // WAL cannot be switched inside a transaction
    conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
        .map_err(|e| StoreError::Schema(format!("enable WAL: {}", e)))?;

    let current = schema_version(conn)?;
    if current >= SCHEMA_VERSION {
        debug!(version = current, "schema up to date");
        return Ok(());
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Schema(format!("{}: {}", migration.name, e)))?;
        (migration.apply)(&tx)
            .and_then(|_| tx.pragma_update(None, "user_version", migration.version))
            .map_err(|e| StoreError::Schema(format!("{}: {}", migration.name, e)))?;
        tx.commit()
            .map_err(|e| StoreError::Schema(format!("{}: {}", migration.name, e)))?;

        info!(
            version = migration.version,
            name = migration.name,
            "applied schema migration"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_reaches_current_version() -> anyhow::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        run(&mut conn)?;

        assert_eq!(schema_version(&conn)?, SCHEMA_VERSION);
        assert!(has_column(&conn, CHUNKS_TABLE, "priority")?);
        Ok(())
    }

    #[test]
    fn test_run_twice_is_noop() -> anyhow::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        run(&mut conn)?;
        run(&mut conn)?;

        assert_eq!(schema_version(&conn)?, SCHEMA_VERSION);
        Ok(())
    }

    #[test]
    fn test_legacy_table_gains_priority_and_keeps_rows() -> anyhow::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        create_chunks_table(&conn)?;
        conn.execute(
            "INSERT INTO rag_chunks (id, source_path, kind, chunk_index, text, emb, dim, created_at)
             VALUES ('a', 'j.md', 'journal', 0, 'hello', x'0000803f', 1, '2024-01-01T00:00:00Z')",
            [],
        )?;

        run(&mut conn)?;

        let priority: String =
            conn.query_row("SELECT priority FROM rag_chunks WHERE id = 'a'", [], |r| r.get(0))?;
        assert_eq!(priority, "normal");
        Ok(())
    }

    #[test]
    fn test_legacy_duplicates_fail_as_schema_error() -> anyhow::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        create_chunks_table(&conn)?;
        for id in ["a", "b"] {
            conn.execute(
                "INSERT INTO rag_chunks (id, source_path, kind, chunk_index, text, emb, dim, created_at)
                 VALUES (?1, 'j.md', 'journal', 0, 'hello', x'0000803f', 1, 'now')",
                [id],
            )?;
        }

        let err = run(&mut conn).unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
        // Step 1 committed, step 2 rolled back
        assert_eq!(schema_version(&conn)?, 1);
        Ok(())
    }
}
