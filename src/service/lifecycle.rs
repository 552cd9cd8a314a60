//! Service lifecycle and readiness reporting

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Where the service is in its lifecycle
///
/// `Uninitialized -> Loading -> Ready`, re-entering `Loading` on every
/// rebuild. `Failed` means the last build failed while no snapshot was
/// loaded yet; a reload or a store can still bring the service to `Ready`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// Mutable lifecycle bookkeeping held by the application context
#[derive(Debug, Default)]
pub(crate) struct Status {
    pub phase: Phase,
    pub model_name: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
    /// Set when a write persisted but the snapshot could not be refreshed
    pub stale: bool,
    pub last_error: Option<String>,
}

impl Status {
    pub fn provider_loaded(&mut self, model_name: &str) {
        self.model_name = Some(model_name.to_string());
    }

    pub fn begin_loading(&mut self) {
        self.phase = Phase::Loading;
    }

    /// A snapshot was built and swapped in
    pub fn loaded(&mut self, at: DateTime<Utc>) {
        self.loaded_at = Some(at);
        self.stale = false;
        self.last_error = None;
        self.phase = if self.model_name.is_some() {
            Phase::Ready
        } else {
            Phase::Loading
        };
    }

    /// A build failed. With an older snapshot still in place and a provider
    /// loaded the service stays ready on the old data.
    pub fn build_failed(&mut self, error: String, has_snapshot: bool) {
        self.last_error = Some(error);
        self.phase = if has_snapshot && self.model_name.is_some() {
            Phase::Ready
        } else {
            Phase::Failed
        };
    }
}

/// Readiness probe payload
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub ready: bool,
    /// "ok" when ready, "starting" otherwise
    pub status: &'static str,
    pub phase: Phase,
    pub model: Option<String>,
    pub model_loaded: bool,
    pub index_loaded: bool,
    pub chunk_count: usize,
    pub dim: usize,
    pub loaded_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub last_error: Option<String>,
    pub db_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_needs_provider() {
        let mut status = Status::default();
        status.begin_loading();
        status.loaded(Utc::now());
        assert_eq!(status.phase, Phase::Loading);

        status.provider_loaded("hashing-8");
        status.begin_loading();
        status.loaded(Utc::now());
        assert_eq!(status.phase, Phase::Ready);
    }

    #[test]
    fn test_failed_startup_is_not_ready() {
        let mut status = Status::default();
        status.provider_loaded("hashing-8");
        status.begin_loading();
        status.build_failed("chunk store is empty".into(), false);
        assert_eq!(status.phase, Phase::Failed);
        assert_eq!(status.last_error.as_deref(), Some("chunk store is empty"));
    }

    #[test]
    fn test_failed_rebuild_keeps_old_snapshot_ready() {
        let mut status = Status::default();
        status.provider_loaded("hashing-8");
        status.loaded(Utc::now());
        status.stale = true;
        status.begin_loading();
        status.build_failed("boom".into(), true);
        assert_eq!(status.phase, Phase::Ready);
        assert!(status.stale);

        status.loaded(Utc::now());
        assert!(!status.stale);
        assert!(status.last_error.is_none());
    }
}
