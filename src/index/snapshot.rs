//! Columnar in-memory snapshot of the chunk store
//!
//! Parallel per-row arrays plus one contiguous `N x D` matrix of
//! unit-length embeddings, all aligned by row. Row order is store insertion
//! order. A snapshot is never mutated after `build`; a newer store state
//! always produces a new snapshot.

use ndarray::{Array2, ArrayView1};
use tracing::debug;

use crate::db::vectors::bytes_to_vec_f32;
use crate::embeddings::normalize_in_place;
use crate::error::{BuildError, StoreError};
use crate::storage::{ChunkStore, Priority, StoredChunk};

/// Immutable point-in-time copy of every chunk
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub(crate) source_paths: Vec<String>,
    pub(crate) kinds: Vec<String>,
    pub(crate) chunk_indices: Vec<i64>,
    pub(crate) priorities: Vec<Priority>,
    pub(crate) texts: Vec<String>,
    pub(crate) embeddings: Array2<f32>,
}

impl Snapshot {
    /// Load every record from `store` into a fresh snapshot
    pub fn build(store: &ChunkStore) -> Result<Self, BuildError> {
        Self::from_records(store.list_all()?)
    }

    /// Build from already-loaded records.
    ///
    /// The first record fixes `dim`; any disagreement fails the whole build.
    /// Rows are decoded before the matrix is allocated, so a bogus `dim`
    /// column surfaces as `CorruptEmbedding`. Each embedding is re-normalized,
    /// zero vectors pass through unchanged, non-finite values are rejected.
    pub fn from_records(records: Vec<StoredChunk>) -> Result<Self, BuildError> {
        let first = records.first().ok_or(BuildError::EmptyStore)?;
        let stored_dim = first.dim;
        let dim = usize::try_from(stored_dim).map_err(|_| corrupt(first, 0))?;

        let n = records.len();
        let mut values: Vec<f32> = Vec::new();
        let mut snapshot = Snapshot {
            source_paths: Vec::with_capacity(n),
            kinds: Vec::with_capacity(n),
            chunk_indices: Vec::with_capacity(n),
            priorities: Vec::with_capacity(n),
            texts: Vec::with_capacity(n),
            embeddings: Array2::zeros((0, 0)),
        };

        for record in records {
            if record.dim != stored_dim {
                return Err(BuildError::DimensionMismatch {
                    source_path: record.key.source_path,
                    kind: record.key.kind,
                    chunk_index: record.key.chunk_index,
                    expected: dim,
                    found: record.dim.max(0) as usize,
                });
            }

            let mut vector =
                bytes_to_vec_f32(&record.emb, dim).ok_or_else(|| corrupt(&record, dim))?;
            if !vector.iter().all(|x| x.is_finite()) {
                return Err(BuildError::NonFiniteEmbedding {
                    source_path: record.key.source_path,
                    kind: record.key.kind,
                    chunk_index: record.key.chunk_index,
                });
            }
            normalize_in_place(&mut vector);
            values.extend_from_slice(&vector);

            snapshot.source_paths.push(record.key.source_path);
            snapshot.kinds.push(record.key.kind);
            snapshot.chunk_indices.push(record.key.chunk_index);
            snapshot.priorities.push(record.priority);
            snapshot.texts.push(record.text);
        }

        snapshot.embeddings = Array2::from_shape_vec((n, dim), values)
            .map_err(|e| StoreError::Store(format!("snapshot matrix: {}", e)))?;

        debug!(rows = n, dim, "snapshot built");
        Ok(snapshot)
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Embedding dimension shared by every row
    pub fn dim(&self) -> usize {
        self.embeddings.ncols()
    }

    /// Normalized embedding of `row`
    pub fn embedding(&self, row: usize) -> ArrayView1<'_, f32> {
        self.embeddings.row(row)
    }
}

fn corrupt(record: &StoredChunk, dim: usize) -> BuildError {
    BuildError::CorruptEmbedding {
        source_path: record.key.source_path.clone(),
        kind: record.key.kind.clone(),
        chunk_index: record.key.chunk_index,
        expected_bytes: dim.saturating_mul(4),
        actual_bytes: record.emb.len(),
    }
}
