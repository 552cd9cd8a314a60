//! Persistent chunk store
//!
//! One SQLite table (`rag_chunks`) holds every chunk with its embedding.
//! The natural key `(source_path, kind, chunk_index)` is unique; writes are
//! upserts on that key and preserve the row's `id`.
//!
//! # Example
//!
//! ```no_run
//! use hearth::storage::ChunkStore;
//!
//! let mut store = ChunkStore::open("farm_memory/db/rag.db")?;
//! store.ensure_schema()?;
//! println!("{} chunks", store.count()?);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod chunks;
pub mod types;

pub use chunks::ChunkStore;
pub use types::{ChunkKey, NewChunk, Priority, StoredChunk, StoredIdentity};
