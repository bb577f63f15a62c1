//! Runtime configuration for vizforge.
//!
//! Configuration can be built from defaults, environment variables or a YAML
//! file. Provider credentials are not part of this struct; they are looked up
//! by the provider registry when a client is constructed.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::ProviderKind;
use crate::retrieval::DistanceMetric;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// The configuration file could not be decoded.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the pipeline and its context store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    // Model settings
    /// Provider bound when the manager starts.
    pub provider: String,
    /// Model override; `None` uses the provider default.
    pub model: Option<String>,
    /// Retries after a retryable stage failure. 0 disables retrying.
    pub max_generation_retries: u32,
    /// Samples kept per column by the summarizer.
    pub n_samples: usize,

    // Response cache
    /// Maximum cached responses.
    pub cache_capacity: usize,
    /// Cached response lifetime in seconds.
    pub cache_ttl_secs: u64,

    // Context store
    /// Directory holding `index.json` and `docstore.json`.
    pub store_dir: PathBuf,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Embedding dimension, for the hash embedder or the remote model.
    pub embedding_dimension: usize,
    /// Remote embedding model; `None` uses the offline hash embedder.
    pub embedding_model: Option<String>,
    /// Endpoint for the remote embedder; defaults to the provider's.
    pub embedding_base_url: Option<String>,
    /// Distance metric used by the similarity index.
    pub distance_metric: DistanceMetric,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            max_generation_retries: 0,
            n_samples: 3,

            cache_capacity: 512,
            cache_ttl_secs: 3600,

            store_dir: PathBuf::from("./vectorstore"),
            chunk_size: 1000,
            chunk_overlap: 100,
            embedding_dimension: 256,
            embedding_model: None,
            embedding_base_url: None,
            distance_metric: DistanceMetric::Cosine,
        }
    }
}

impl VizConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from `VIZFORGE_*` environment variables,
    /// falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(provider) = env::var("VIZFORGE_PROVIDER") {
            config.provider = provider;
        }
        if let Ok(model) = env::var("VIZFORGE_MODEL") {
            config.model = Some(model);
        }
        if let Ok(dir) = env::var("VIZFORGE_STORE_DIR") {
            config.store_dir = PathBuf::from(dir);
        }
        if let Some(size) = parse_env("VIZFORGE_CHUNK_SIZE")? {
            config.chunk_size = size;
        }
        if let Some(overlap) = parse_env("VIZFORGE_CHUNK_OVERLAP")? {
            config.chunk_overlap = overlap;
        }
        if let Some(dimension) = parse_env("VIZFORGE_EMBEDDING_DIMENSION")? {
            config.embedding_dimension = dimension;
        }
        if let Ok(model) = env::var("VIZFORGE_EMBEDDING_MODEL") {
            config.embedding_model = Some(model);
        }
        if let Ok(base_url) = env::var("VIZFORGE_EMBEDDING_BASE_URL") {
            config.embedding_base_url = Some(base_url);
        }
        if let Some(retries) = parse_env("VIZFORGE_MAX_RETRIES")? {
            config.max_generation_retries = retries;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a YAML file. Missing keys take defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.parse::<ProviderKind>().is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "unknown provider '{}'",
                self.provider
            )));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::ValidationFailed(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::ValidationFailed(
                "embedding_dimension must be greater than 0".to_string(),
            ));
        }
        if matches!(self.embedding_model.as_deref(), Some(model) if model.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed(
                "embedding_model must not be empty".to_string(),
            ));
        }
        if self.n_samples == 0 {
            return Err(ConfigError::ValidationFailed(
                "n_samples must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Cached response lifetime.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Sets the store directory.
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = dir.into();
        self
    }

    /// Sets chunk size and overlap.
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    /// Selects a remote embedding model of the given dimension.
    pub fn with_embedding_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.embedding_model = Some(model.into());
        self.embedding_dimension = dimension;
        self
    }

    /// Sets the number of generation retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_generation_retries = retries;
        self
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
