//! Memory service daemon
//!
//! Serves health, version, store, retrieve and reload over HTTP. The
//! embedding provider and the index snapshot stay hot in one process.
//!
//! Design: Blocking HTTP microserver (no async/tokio)
//!
//! Transport model:
//! - Default: Unix domain socket at ~/.hearth/run/serve.sock
//! - Opt-in: TCP at --host/--port (bearer token required)

mod internal;
pub(crate) mod microserver;
mod runtime;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use hearth::config::Config;
use hearth::service::AppContext;

/// Options for the serve command
pub struct ServeOptions {
    /// Host to bind to (None = UDS only, no TCP)
    pub host: Option<String>,
    pub port: u16,
}

/// Load the provider and the index, then serve until interrupted.
///
/// A failed startup index build is not fatal: the daemon comes up not ready
/// and `/health` reports why.
pub fn execute(options: ServeOptions, config: &Config) -> Result<()> {
    let ctx = Arc::new(AppContext::new(&config.store.path));
    ctx.start(&config.embeddings)
        .context("Failed to start memory service")?;

    let health = ctx.health();
    info!(
        ready = health.ready,
        chunks = health.chunk_count,
        db = %health.db_path.display(),
        "memory service initialized"
    );
    internal::run_server(options, ctx)
}
