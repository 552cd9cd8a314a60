//! ONNX Runtime embedder for sentence-transformer models

use super::similarity::normalize_in_place;
use super::EmbeddingEngine;
use crate::config::EmbeddingsConfig;
use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array2;
use ort::{inputs, session::Session, value::Value};
use std::path::Path;
use tokenizers::Tokenizer;

/// ONNX-based embedding generator
pub struct OnnxEmbedder {
    session: Session,
    tokenizer: Tokenizer,
    dimension: usize,
    model_name: String,
    query_prefix: Option<String>,
    passage_prefix: Option<String>,
    /// BERT-style exports take token_type_ids, XLM-R exports don't
    wants_token_types: bool,
}

impl OnnxEmbedder {
    /// Create an embedder from configuration
    ///
    /// Prefers `model_quantized.onnx` over `model.onnx` when both exist.
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let quantized = config.model_dir.join("model_quantized.onnx");
        let model_path = if quantized.exists() {
            quantized
        } else {
            config.model_dir.join("model.onnx")
        };

        Self::new_from_paths(
            &model_path,
            &config.model_dir.join("tokenizer.json"),
            &config.model,
            config.dimension,
            config.query_prefix.clone(),
            config.passage_prefix.clone(),
        )
    }

    /// Create a new ONNX embedder from explicit paths
    ///
    /// # Arguments
    /// * `model_path` - Path to ONNX model file
    /// * `tokenizer_path` - Path to tokenizer.json file
    /// * `model_name` - Human-readable model name
    /// * `dimension` - Embedding dimension (384 for MiniLM-class models)
    /// * `query_prefix` - Optional prefix for query embeddings
    /// * `passage_prefix` - Optional prefix for passage embeddings
    pub fn new_from_paths(
        model_path: &Path,
        tokenizer_path: &Path,
        model_name: &str,
        dimension: usize,
        query_prefix: Option<String>,
        passage_prefix: Option<String>,
    ) -> Result<Self> {
        if !model_path.exists() {
            bail!(
                "ONNX model not found at: {}\n\n\
                Export one with:\n  \
                optimum-cli export onnx --model sentence-transformers/{} {}",
                model_path.display(),
                model_name,
                model_path.parent().unwrap_or(model_path).display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(model_path)
            .context("Failed to load ONNX model")?;

        let wants_token_types = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        if !tokenizer_path.exists() {
            bail!("Tokenizer not found at: {}", tokenizer_path.display());
        }

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        // 512 is the position limit of MiniLM / XLM-R exports
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: 512,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

        Ok(Self {
            session,
            tokenizer,
            dimension,
            model_name: model_name.to_string(),
            query_prefix,
            passage_prefix,
            wants_token_types,
        })
    }

    /// Tokenize text into input_ids and attention_mask
    fn tokenize(&self, text: &str) -> Result<(Vec<i64>, Vec<i64>)> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let input_ids = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let attention_mask = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| x as i64)
            .collect();

        Ok((input_ids, attention_mask))
    }

    /// Mean pooling - average token embeddings weighted by attention mask
    fn mean_pooling(&self, token_embeddings: &Array2<f32>, attention_mask: &[i64]) -> Vec<f32> {
        let mask_sum: f32 = attention_mask.iter().map(|&x| x as f32).sum();
        if mask_sum == 0.0 {
            return vec![0.0; self.dimension];
        }

        let mut pooled = vec![0.0; self.dimension];
        for (i, &mask) in attention_mask.iter().enumerate() {
            if mask == 1 && i < token_embeddings.nrows() {
                for (j, slot) in pooled.iter_mut().enumerate() {
                    *slot += token_embeddings[[i, j]];
                }
            }
        }

        pooled.iter().map(|&x| x / mask_sum).collect()
    }

    fn with_prefix(prefix: &Option<String>, text: &str) -> String {
        match prefix {
            Some(p) => format!("{}{}", p, text),
            None => text.to_string(),
        }
    }
}

impl EmbeddingEngine for OnnxEmbedder {
    fn embed_query(&mut self, text: &str) -> Result<Vec<f32>> {
        let input = Self::with_prefix(&self.query_prefix, text);
        self.embed(&input)
    }

    fn embed_passage(&mut self, text: &str) -> Result<Vec<f32>> {
        let input = Self::with_prefix(&self.passage_prefix, text);
        self.embed(&input)
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) = self.tokenize(text)?;
        let seq_len = input_ids.len();

        let input_ids_array = Array2::from_shape_vec((1, seq_len), input_ids)
            .context("Failed to create input_ids array")?;
        let attention_mask_array = Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .context("Failed to create attention_mask array")?;

        let token_embeddings_2d = {
            let outputs = (if self.wants_token_types {
                let token_type_ids_array = Array2::from_shape_vec((1, seq_len), vec![0i64; seq_len])
                    .context("Failed to create token_type_ids array")?;
                self.session.run(inputs![
                    "input_ids" => Value::from_array(input_ids_array)?,
                    "attention_mask" => Value::from_array(attention_mask_array)?,
                    "token_type_ids" => Value::from_array(token_type_ids_array)?
                ])
            } else {
                self.session.run(inputs![
                    "input_ids" => Value::from_array(input_ids_array)?,
                    "attention_mask" => Value::from_array(attention_mask_array)?
                ])
            })
            .context("ONNX inference failed")?;

            // Shape is [batch_size=1, seq_len, hidden_dim]
            let (shape, data) = outputs["last_hidden_state"]
                .try_extract_tensor::<f32>()
                .context("Failed to extract last_hidden_state tensor")?;

            let shape_dims = shape.as_ref();
            if shape_dims.len() != 3 {
                bail!("Expected 3D tensor, got shape: {:?}", shape_dims);
            }

            let out_len = shape_dims[1] as usize;
            let hidden_dim = shape_dims[2] as usize;
            if hidden_dim != self.dimension {
                bail!(
                    "Model {} produces {} dimensions, configured for {}",
                    self.model_name,
                    hidden_dim,
                    self.dimension
                );
            }

            Array2::from_shape_vec((out_len, hidden_dim), data[0..out_len * hidden_dim].to_vec())
                .context("Failed to reshape token embeddings")?
        };

        let mut embedding = self.mean_pooling(&token_embeddings_2d, &attention_mask);
        normalize_in_place(&mut embedding);
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
