//! Embeddings module - Generate semantic embeddings for text
//!
//! Trait-based abstraction over the embedding provider. The memory core only
//! sees `EmbeddingEngine`: text in, unit-length vector of fixed dimension out.

mod hashing;
mod onnx;
pub mod similarity;

pub use hashing::HashingEmbedder;
pub use onnx::OnnxEmbedder;
pub use similarity::{normalize_in_place, normalized};

use crate::config::{EmbeddingsConfig, ProviderKind};
use anyhow::Result;
use tracing::info;

/// Trait for embedding generation engines
///
/// Requires Send so the provider can live in the shared application context.
pub trait EmbeddingEngine: Send {
    /// Generate embedding for a single text
    fn embed(&mut self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding for a query text (with model-specific prefix if needed)
    ///
    /// For symmetric models this is identical to embed().
    fn embed_query(&mut self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    /// Generate embedding for a stored passage (with model-specific prefix if needed)
    fn embed_passage(&mut self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    /// Embedding dimension (e.g., 384 for MiniLM-L12)
    fn dimension(&self) -> usize;

    /// Model name
    fn model_name(&self) -> &str;
}

/// Create the configured embedder
pub fn create_embedder(config: &EmbeddingsConfig) -> Result<Box<dyn EmbeddingEngine>> {
    let embedder: Box<dyn EmbeddingEngine> = match config.provider {
        ProviderKind::Onnx => Box::new(OnnxEmbedder::from_config(config)?),
        ProviderKind::Hashing => Box::new(HashingEmbedder::new(config.dimension)?),
    };
    info!(
        model = embedder.model_name(),
        dim = embedder.dimension(),
        "embedding provider loaded"
    );
    Ok(embedder)
}
