//! Memory service core
//!
//! Transport-free: the CLI and the HTTP frontend both drive an [`AppContext`].
//!
//! - `api`: request/response payloads and their validation
//! - `context`: shared state, retrieve, reload, health
//! - `lifecycle`: phases and the readiness report
//! - `upsert`: the store path

pub mod api;
mod context;
#[cfg(test)]
mod fixtures;
pub mod lifecycle;
mod upsert;

pub use api::{ReloadResponse, RetrieveRequest, StoreRequest, StoreResponse};
pub use context::AppContext;
pub use lifecycle::{HealthReport, Phase};
