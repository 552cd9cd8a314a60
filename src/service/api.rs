//! Request and response payloads for the memory service
//!
//! Transport-free: the HTTP frontend deserializes straight into these and
//! serializes the results back out.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::storage::{ChunkKey, Priority};

/// Default number of retrieve results
pub const DEFAULT_TOPK: i64 = 5;

/// Upper bound on retrieve results
pub const MAX_TOPK: i64 = 50;

/// Store (upsert) request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRequest {
    pub source_path: String,
    pub kind: String,
    pub chunk_index: i64,
    pub text: String,
    /// "normal" | "high"; missing or null means normal
    #[serde(default)]
    pub priority: Option<String>,
}

impl StoreRequest {
    pub fn new(source_path: &str, kind: &str, chunk_index: i64, text: &str) -> Self {
        Self {
            source_path: source_path.to_string(),
            kind: kind.to_string(),
            chunk_index,
            text: text.to_string(),
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: &str) -> Self {
        self.priority = Some(priority.to_string());
        self
    }

    /// Check field shapes and parse the priority
    pub fn validate(&self) -> Result<(ChunkKey, Priority), ServiceError> {
        if self.source_path.is_empty() {
            return Err(ServiceError::Validation("source_path must not be empty".into()));
        }
        if self.kind.is_empty() {
            return Err(ServiceError::Validation("kind must not be empty".into()));
        }
        if self.chunk_index < 0 {
            return Err(ServiceError::Validation(format!(
                "chunk_index must be >= 0, got {}",
                self.chunk_index
            )));
        }
        if self.text.is_empty() {
            return Err(ServiceError::Validation("text must not be empty".into()));
        }

        let priority = match self.priority.as_deref() {
            None => Priority::Normal,
            Some(p) => p.parse().map_err(ServiceError::Validation)?,
        };

        Ok((
            ChunkKey {
                source_path: self.source_path.clone(),
                kind: self.kind.clone(),
                chunk_index: self.chunk_index,
            },
            priority,
        ))
    }
}

/// Store response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreResponse {
    pub ok: bool,
    pub id: String,
    pub dim: usize,
}

/// Retrieve request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    #[serde(default = "default_topk")]
    pub topk: i64,
    /// Restrict to one category; empty means no filter
    #[serde(default)]
    pub kind: Option<String>,
}

fn default_topk() -> i64 {
    DEFAULT_TOPK
}

impl RetrieveRequest {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            topk: DEFAULT_TOPK,
            kind: None,
        }
    }

    pub fn with_topk(mut self, topk: i64) -> Self {
        self.topk = topk;
        self
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    /// Check field shapes; returns the result bound
    pub fn validate(&self) -> Result<usize, ServiceError> {
        if self.query.is_empty() {
            return Err(ServiceError::Validation("query must not be empty".into()));
        }
        if !(1..=MAX_TOPK).contains(&self.topk) {
            return Err(ServiceError::Validation(format!(
                "topk must be between 1 and {}, got {}",
                MAX_TOPK, self.topk
            )));
        }
        Ok(self.topk as usize)
    }

    /// Category filter, if any
    pub fn kind_filter(&self) -> Option<&str> {
        self.kind.as_deref().filter(|k| !k.is_empty())
    }
}

/// Reload response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub ok: bool,
    pub chunk_count: usize,
}
