//! In-memory vector index
//!
//! - `snapshot`: the index builder, store rows -> immutable columnar snapshot
//! - `search`: the retrieval engine, exact top-k cosine over a snapshot
//!
//! Snapshots are rebuilt wholesale and swapped by reference; nothing here
//! mutates a snapshot after it is built.

mod search;
mod snapshot;

pub use search::ScoredChunk;
pub use snapshot::Snapshot;
