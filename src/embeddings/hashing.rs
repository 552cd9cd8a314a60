//! Deterministic feature-hashing embedder
//!
//! Bag-of-words vectors: each lowercase alphanumeric token is hashed with
//! SHA-256 into a bucket and a sign, then the vector is L2-normalized.
//! No model files, no network, same output on every platform. Useful for
//! offline setups and as the stub provider in tests; it captures lexical
//! overlap only, not meaning.

use super::similarity::normalize_in_place;
use super::EmbeddingEngine;
use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

/// Hashing embedder with a fixed output dimension
pub struct HashingEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            bail!("Hashing embedder needs a dimension > 0");
        }
        Ok(Self {
            dimension,
            model_name: format!("hashing-{}", dimension),
        })
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
    }
}

impl EmbeddingEngine for HashingEmbedder {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in Self::tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize_in_place(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::similarity::l2_norm;
    use approx::assert_relative_eq;

    #[test]
    fn test_deterministic_and_unit_length() {
        let mut embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed("the cow gave birth today").unwrap();
        let b = embedder.embed("The cow gave birth today!").unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b, "case and punctuation don't change tokens");
        assert_relative_eq!(l2_norm(&a), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_overlap_scores_higher_than_disjoint() {
        let mut embedder = HashingEmbedder::new(256).unwrap();
        let base = embedder.embed("goats need fresh hay every morning").unwrap();
        let near = embedder.embed("fresh hay for the goats").unwrap();
        let far = embedder.embed("tractor engine oil change").unwrap();

        // Outputs are unit length, so the dot product is the cosine
        let cosine = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(cosine(&base, &near) > cosine(&base, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let mut embedder = HashingEmbedder::new(8).unwrap();
        assert_eq!(embedder.embed("  ...  ").unwrap(), vec![0.0; 8]);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }
}
