//! hearth: personal semantic memory
//!
//! A durable SQLite chunk store, an in-memory snapshot of every chunk's
//! embedding, and exact top-k cosine retrieval over it. Writes are visible
//! to the next query: each store rebuilds the snapshot and swaps it in.

pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod paths;
pub mod service;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::ServiceError;
pub use index::{ScoredChunk, Snapshot};
pub use service::AppContext;
pub use storage::ChunkStore;
