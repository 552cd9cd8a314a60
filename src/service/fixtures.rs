//! Scripted embedding providers for service tests

use anyhow::{bail, Result};

use crate::embeddings::EmbeddingEngine;

/// Provider that returns `returned` copies of `fill` regardless of its
/// declared dimension, or fails outright
pub(crate) struct FixedEmbedder {
    pub declared: usize,
    pub returned: usize,
    pub fill: f32,
    pub fail: bool,
}

impl FixedEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            declared: dim,
            returned: dim,
            fill: 1.0,
            fail: false,
        }
    }

    pub fn failing(dim: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(dim)
        }
    }

    pub fn returning(mut self, returned: usize) -> Self {
        self.returned = returned;
        self
    }

    pub fn filled_with(mut self, fill: f32) -> Self {
        self.fill = fill;
        self
    }
}

impl EmbeddingEngine for FixedEmbedder {
    fn embed(&mut self, _text: &str) -> Result<Vec<f32>> {
        if self.fail {
            bail!("model crashed");
        }
        Ok(vec![self.fill; self.returned])
    }

    fn dimension(&self) -> usize {
        self.declared
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}
