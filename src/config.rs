//! Configuration for hearth
//!
//! One TOML file (default `~/.hearth/config.toml`). Every field has a
//! default, so a missing file or a partial file is fine.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub embeddings: EmbeddingsConfig,
    pub serve: ServeConfig,
}

/// Where the chunk database lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: paths::default_db_path(),
        }
    }
}

/// Which embedding provider to load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// ONNX Runtime sentence-transformer
    #[default]
    Onnx,
    /// Deterministic feature hashing (no model files)
    Hashing,
}

/// Embedding model selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: ProviderKind,
    /// Human-readable model name, reported by /health
    pub model: String,
    /// Directory holding `model.onnx` (or `model_quantized.onnx`) and `tokenizer.json`
    pub model_dir: PathBuf,
    pub dimension: usize,

    /// Query prefix for asymmetric models (e.g., "query: " for E5)
    pub query_prefix: Option<String>,

    /// Passage prefix for asymmetric models (e.g., "passage: " for E5)
    pub passage_prefix: Option<String>,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Onnx,
            model: "paraphrase-multilingual-MiniLM-L12-v2".to_string(),
            model_dir: PathBuf::from("resources/models/paraphrase-multilingual-minilm-l12-v2"),
            dimension: 384,
            query_prefix: None,
            passage_prefix: None,
        }
    }
}

/// TCP defaults for `hearth serve --host`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { port: 50051 }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (paths::config_path(), false),
        };

        if !config_path.exists() {
            if explicit {
                bail!("Config file not found: {}", config_path.display());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid config TOML")?;
        if config.embeddings.dimension == 0 {
            bail!("embeddings.dimension must be > 0");
        }
        Ok(config)
    }

    /// Write the default configuration to `path` unless a file already exists.
    ///
    /// Returns true if a file was written.
    pub fn write_default(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let body = toml::to_string_pretty(&Self::default()).context("Failed to render config")?;
        std::fs::write(path, format!("# hearth configuration\n{}", body))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(true)
    }
}
