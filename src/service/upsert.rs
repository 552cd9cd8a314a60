//! Store path
//!
//! validate -> embed -> persist -> verify -> rebuild + swap. Each step maps
//! its failure onto one `ServiceError`; only a rebuild failure happens after
//! the data is durable.

use tracing::{info, warn};

use super::api::{StoreRequest, StoreResponse};
use super::context::{AppContext, Purpose};
use crate::error::ServiceError;
use crate::storage::NewChunk;

pub(super) fn store(ctx: &AppContext, request: &StoreRequest) -> Result<StoreResponse, ServiceError> {
    let (key, priority) = request.validate()?;

    let embedding = ctx.embed(&request.text, Purpose::Passage)?;
    let mut store = ctx.open_store()?;

    // Without a snapshot the rows already on disk still fix the dimension
    let expected = match ctx.current_snapshot() {
        Some(snapshot) => Some(snapshot.dim()),
        None => store
            .stored_dim()?
            .map(|d| usize::try_from(d).unwrap_or(usize::MAX)),
    };
    if let Some(expected) = expected {
        if expected != embedding.len() {
            return Err(ServiceError::DimensionMismatch {
                expected,
                found: embedding.len(),
            });
        }
    }

    store.upsert(&NewChunk {
        key: key.clone(),
        priority,
        text: request.text.clone(),
        embedding,
    })?;
    let identity = store.get_by_key(&key)?.ok_or_else(|| {
        ServiceError::Consistency(format!("row for {} missing right after upsert", key))
    })?;
    drop(store);
    let dim = usize::try_from(identity.dim).unwrap_or(0);

    if let Err(source) = ctx.rebuild() {
        ctx.mark_stale();
        warn!(id = %identity.id, key = %key, error = %source, "stored chunk but index refresh failed");
        return Err(ServiceError::StoredButNotRefreshed {
            id: identity.id,
            dim,
            source,
        });
    }

    info!(id = %identity.id, key = %key, priority = %priority, dim, "chunk stored");
    Ok(StoreResponse {
        ok: true,
        id: identity.id,
        dim,
    })
}
