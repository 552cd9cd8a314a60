//! Application context: the state every request runs against
//!
//! One `AppContext` is built at startup and shared by reference (usually
//! `Arc<AppContext>`) with every connection thread. It owns the embedding
//! provider, the current snapshot and the lifecycle bookkeeping. Nothing
//! here is a process-wide global.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::api::{ReloadResponse, RetrieveRequest, StoreRequest, StoreResponse};
use super::lifecycle::{HealthReport, Status};
use super::upsert;
use crate::config::EmbeddingsConfig;
use crate::embeddings::{create_embedder, normalize_in_place, EmbeddingEngine};
use crate::error::{BuildError, EmbeddingError, ServiceError};
use crate::index::{ScoredChunk, Snapshot};
use crate::storage::ChunkStore;

/// Which side of an asymmetric model a text is embedded as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Purpose {
    Query,
    Passage,
}

/// Shared service state
pub struct AppContext {
    db_path: PathBuf,
    provider: Mutex<Option<Box<dyn EmbeddingEngine>>>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    status: Mutex<Status>,
    /// Serializes list_all + swap so an older build never replaces a newer one
    rebuild_lock: Mutex<()>,
}

impl AppContext {
    /// Fresh, uninitialized context for the database at `db_path`
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            provider: Mutex::new(None),
            snapshot: RwLock::new(None),
            status: Mutex::new(Status::default()),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Startup: load the configured provider, then see `start_with_provider`
    pub fn start(&self, config: &EmbeddingsConfig) -> Result<(), ServiceError> {
        self.status.lock().begin_loading();
        let provider = create_embedder(config)
            .map_err(|e| self.record_failure(EmbeddingError::from(e).into()))?;
        self.start_with_provider(provider)
    }

    /// Startup with an already-built provider.
    ///
    /// Provider and migration failures are returned. A snapshot failure is
    /// only recorded: the service stays up, not ready, and a later reload or
    /// store can still bring it to ready.
    pub fn start_with_provider(
        &self,
        provider: Box<dyn EmbeddingEngine>,
    ) -> Result<(), ServiceError> {
        self.install_provider(provider);
        self.migrate().map_err(|e| self.record_failure(e))?;

        match self.rebuild() {
            Ok(snapshot) => info!(
                chunks = snapshot.len(),
                dim = snapshot.dim(),
                db = %self.db_path.display(),
                "service ready"
            ),
            Err(e) => warn!(error = %e, "startup index build failed, service not ready"),
        }
        Ok(())
    }

    /// Replace the embedding provider
    pub fn install_provider(&self, provider: Box<dyn EmbeddingEngine>) {
        let model = provider.model_name().to_string();
        *self.provider.lock() = Some(provider);
        self.status.lock().provider_loaded(&model);
    }

    /// Apply pending schema migrations to the database
    pub fn migrate(&self) -> Result<(), ServiceError> {
        let mut store = self.open_store()?;
        store.ensure_schema()?;
        Ok(())
    }

    /// Provider loaded and a snapshot present
    pub fn is_ready(&self) -> bool {
        self.model_loaded() && self.snapshot.read().is_some()
    }

    /// Current snapshot, if any. The caller keeps it alive across swaps.
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().clone()
    }

    pub fn health(&self) -> HealthReport {
        let snapshot = self.current_snapshot();
        let status = self.status.lock();
        let model_loaded = status.model_name.is_some();
        let ready = model_loaded && snapshot.is_some();

        HealthReport {
            ready,
            status: if ready { "ok" } else { "starting" },
            phase: status.phase,
            model: status.model_name.clone(),
            model_loaded,
            index_loaded: snapshot.is_some(),
            chunk_count: snapshot.as_ref().map_or(0, |s| s.len()),
            dim: snapshot.as_ref().map_or(0, |s| s.dim()),
            loaded_at: status.loaded_at,
            stale: status.stale,
            last_error: status.last_error.clone(),
            db_path: self.db_path.clone(),
        }
    }

    /// Insert or update one chunk and refresh the snapshot
    pub fn store(&self, request: &StoreRequest) -> Result<StoreResponse, ServiceError> {
        upsert::store(self, request)
    }

    /// Top-k chunks for a free-text query
    pub fn retrieve(&self, request: &RetrieveRequest) -> Result<Vec<ScoredChunk>, ServiceError> {
        let k = request.validate()?;
        if !self.is_ready() {
            return Err(not_ready());
        }

        let query = self.embed(&request.query, Purpose::Query)?;
        let snapshot = self.current_snapshot().ok_or_else(not_ready)?;
        let hits = snapshot.search(&query, k, request.kind_filter())?;

        debug!(k, kind = ?request.kind_filter(), hits = hits.len(), "retrieve");
        Ok(hits)
    }

    /// Rebuild the snapshot from the store. The old one is kept on failure.
    pub fn reload(&self) -> Result<ReloadResponse, ServiceError> {
        if !self.model_loaded() {
            return Err(ServiceError::NotReady(
                "embedding provider not loaded".to_string(),
            ));
        }
        let snapshot = self.rebuild().map_err(ServiceError::ReloadFailed)?;
        Ok(ReloadResponse {
            ok: true,
            chunk_count: snapshot.len(),
        })
    }

    pub(crate) fn open_store(&self) -> Result<ChunkStore, ServiceError> {
        Ok(ChunkStore::open(&self.db_path)?)
    }

    /// Embed `text`, enforce the provider's declared dimension, normalize
    pub(crate) fn embed(&self, text: &str, purpose: Purpose) -> Result<Vec<f32>, ServiceError> {
        let mut guard = self.provider.lock();
        let provider = guard.as_mut().ok_or_else(|| {
            ServiceError::NotReady("embedding provider not loaded".to_string())
        })?;

        let expected = provider.dimension();
        let mut vector = match purpose {
            Purpose::Query => provider.embed_query(text),
            Purpose::Passage => provider.embed_passage(text),
        }
        .map_err(EmbeddingError::from)?;
        drop(guard);

        if vector.len() != expected {
            return Err(EmbeddingError(format!(
                "provider returned {} values, declared dimension is {}",
                vector.len(),
                expected
            ))
            .into());
        }
        if !vector.iter().all(|x| x.is_finite()) {
            return Err(EmbeddingError("provider returned a non-finite value".to_string()).into());
        }
        normalize_in_place(&mut vector);
        Ok(vector)
    }

    /// Build a new snapshot and swap it in
    pub(crate) fn rebuild(&self) -> Result<Arc<Snapshot>, BuildError> {
        let _guard = self.rebuild_lock.lock();
        self.status.lock().begin_loading();

        let built = ChunkStore::open(&self.db_path)
            .map_err(BuildError::from)
            .and_then(|store| Snapshot::build(&store));

        match built {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.snapshot.write() = Some(Arc::clone(&snapshot));
                self.status.lock().loaded(Utc::now());
                info!(
                    chunks = snapshot.len(),
                    dim = snapshot.dim(),
                    "index snapshot swapped"
                );
                Ok(snapshot)
            }
            Err(e) => {
                let has_snapshot = self.snapshot.read().is_some();
                self.status.lock().build_failed(e.to_string(), has_snapshot);
                warn!(error = %e, kept_previous = has_snapshot, "index rebuild failed");
                Err(e)
            }
        }
    }

    pub(crate) fn mark_stale(&self) {
        self.status.lock().stale = true;
    }

    fn model_loaded(&self) -> bool {
        self.status.lock().model_name.is_some()
    }

    fn record_failure(&self, error: ServiceError) -> ServiceError {
        let has_snapshot = self.snapshot.read().is_some();
        self.status.lock().build_failed(error.to_string(), has_snapshot);
        error
    }
}

fn not_ready() -> ServiceError {
    ServiceError::NotReady("index not loaded".to_string())
}
