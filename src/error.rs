//! Error taxonomy for the memory core
//!
//! Each layer returns its own error type so the service frontend can map a
//! failure to a response without looking inside it:
//!
//! - [`StoreError`] - persistent store (schema, constraints, SQLite I/O)
//! - [`BuildError`] - index builder (empty store, mixed dimensions, bad blobs)
//! - [`SearchError`] - retrieval engine
//! - [`EmbeddingError`] - embedding provider boundary
//! - [`ServiceError`] - coordinator and lifecycle, wraps the above

use thiserror::Error;

/// Failures raised by the persistent chunk store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A migration step failed; the schema may be at an older version.
    #[error("schema migration failed: {0}")]
    Schema(String),

    /// A constraint violation the upsert conflict clause did not absorb.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Generic SQLite / I/O failure.
    #[error("store error: {0}")]
    Store(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => StoreError::Integrity(e.to_string()),
            _ => StoreError::Store(e.to_string()),
        }
    }
}

/// Failures raised while building a snapshot from the store.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("chunk store is empty")]
    EmptyStore,

    #[error(
        "inconsistent embedding dimension for {source_path} ({kind} #{chunk_index}): got {found}, expected {expected}"
    )]
    DimensionMismatch {
        source_path: String,
        kind: String,
        chunk_index: i64,
        expected: usize,
        found: usize,
    },

    #[error(
        "corrupt embedding for {source_path} ({kind} #{chunk_index}): {actual_bytes} bytes, expected {expected_bytes}"
    )]
    CorruptEmbedding {
        source_path: String,
        kind: String,
        chunk_index: i64,
        expected_bytes: usize,
        actual_bytes: usize,
    },

    #[error("non-finite value in embedding for {source_path} ({kind} #{chunk_index})")]
    NonFiniteEmbedding {
        source_path: String,
        kind: String,
        chunk_index: i64,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures raised by the retrieval engine.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query vector has dimension {found}, index has {expected}")]
    QueryDimension { expected: usize, found: usize },
}

/// The embedding provider failed or broke its contract.
#[derive(Debug, Error)]
#[error("embedding failed: {0}")]
pub struct EmbeddingError(pub String);

impl From<anyhow::Error> for EmbeddingError {
    fn from(e: anyhow::Error) -> Self {
        EmbeddingError(format!("{:#}", e))
    }
}

/// Errors surfaced by the application context to the service frontend.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad input shape or enum value. No state change.
    #[error("{0}")]
    Validation(String),

    /// Dependencies are not loaded yet. Retryable.
    #[error("{0}")]
    NotReady(String),

    /// Provider failure. Nothing was persisted.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("schema migration failed: {0}")]
    Schema(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Build(BuildError),

    /// The embedding dimension of a write disagrees with the loaded index.
    #[error("embedding dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Post-write verification could not find the row it just wrote.
    #[error("{0}")]
    Consistency(String),

    /// The write committed but the snapshot rebuild failed. The previous
    /// snapshot is still being served.
    #[error("stored {id} but index refresh failed: {source}")]
    StoredButNotRefreshed {
        id: String,
        dim: usize,
        #[source]
        source: BuildError,
    },

    /// An explicit reload failed; the previous snapshot is retained.
    #[error("reload failed: {0}")]
    ReloadFailed(BuildError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Schema(m) => ServiceError::Schema(m),
            StoreError::Integrity(m) => ServiceError::Integrity(m),
            StoreError::Store(m) => ServiceError::Store(m),
        }
    }
}

impl From<BuildError> for ServiceError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::Store(s) => s.into(),
            other => ServiceError::Build(other),
        }
    }
}

impl ServiceError {
    /// Stable machine-readable code for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::NotReady(_) => "not_ready",
            ServiceError::Embedding(_) => "embedding",
            ServiceError::Schema(_) => "schema",
            ServiceError::Integrity(_) => "integrity",
            ServiceError::Store(_) => "store",
            ServiceError::Build(BuildError::EmptyStore) => "empty_store",
            ServiceError::Build(BuildError::DimensionMismatch { .. }) => "dimension_mismatch",
            ServiceError::Build(BuildError::CorruptEmbedding { .. })
            | ServiceError::Build(BuildError::NonFiniteEmbedding { .. }) => "corrupt_embedding",
            ServiceError::Build(BuildError::Store(_)) => "store",
            ServiceError::DimensionMismatch { .. } => "dimension_mismatch",
            ServiceError::Consistency(_) => "consistency",
            ServiceError::StoredButNotRefreshed { .. } => "stored_not_refreshed",
            ServiceError::ReloadFailed(_) => "reload_failed",
            ServiceError::Search(_) => "dimension_mismatch",
        }
    }

    /// True when the failed operation still durably wrote its data.
    pub fn persisted(&self) -> bool {
        matches!(self, ServiceError::StoredButNotRefreshed { .. })
    }
}
