//! Database plumbing for the chunk store
//!
//! Simple SQLite wrapper plus the versioned migrations that shape it.
//!
//! # Example
//! ```no_run
//! use hearth::db::{migrations, SqliteDatabase};
//!
//! let mut db = SqliteDatabase::open("farm_memory/db/rag.db")?;
//! migrations::run(db.connection_mut())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod migrations;
pub mod sqlite;
pub mod vectors;

pub use sqlite::SqliteDatabase;
