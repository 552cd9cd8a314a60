//! Domain types for the chunk store
//!
//! These types don't know about SQLite; `ChunkStore` handles the row mapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Retrieval priority attached to a chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }

    /// Interpret a value read back from disk.
    ///
    /// Rows written by older tooling may hold NULL or free-form text; anything
    /// that isn't a known priority is served as `normal`.
    pub fn from_stored(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for Priority {
    type Err = String;

    /// Case- and whitespace-insensitive parse
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            _ => Err(format!(
                "Invalid priority: {}. Use 'normal' or 'high'.",
                s
            )),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural key of a chunk: identifies "the same chunk" across re-writes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub source_path: String,
    pub kind: String,
    pub chunk_index: i64,
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} #{})", self.source_path, self.kind, self.chunk_index)
    }
}

/// A chunk to be written. The store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub key: ChunkKey,
    pub priority: Priority,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A chunk row as persisted
///
/// The embedding stays in its on-disk byte form; decoding and dimension
/// checks belong to the index builder.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub key: ChunkKey,
    pub priority: Priority,
    pub text: String,
    pub emb: Vec<u8>,
    pub dim: i64,
    pub created_at: String,
}

/// Canonical identity of a persisted row, used to confirm a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredIdentity {
    pub id: String,
    pub dim: i64,
}
