//! Text embedding backends.
//!
//! [`HashEmbedder`] is deterministic and offline: lower-cased word unigrams
//! and bigrams are hashed with SHA-256 into a signed bag of features and the
//! result is L2-normalised. [`RemoteEmbedder`] calls an OpenAI-compatible
//! `/embeddings` endpoint.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ndarray::Array1;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use tracing::debug;

use crate::config::VizConfig;
use crate::error::{LlmError, VizResult};
use crate::llm::client::decode_api_error;
use crate::llm::ProviderKind;

/// Default embedding dimension.
pub const DEFAULT_DIMENSION: usize = 256;

/// Turns texts into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    fn dimension(&self) -> usize;

    /// Backend identifier, recorded with persisted indexes.
    fn name(&self) -> &str;
}

/// Deterministic feature-hashing embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embeds a single text.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = Array1::<f32>::zeros(self.dimension);

        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        for token in &tokens {
            let (idx, sign) = self.bucket(token);
            embedding[idx] += sign;
        }
        for pair in tokens.windows(2) {
            let (idx, sign) = self.bucket(&format!("{} {}", pair[0], pair[1]));
            embedding[idx] += 0.5 * sign;
        }

        let norm = embedding.dot(&embedding).sqrt();
        if norm > 1e-10 {
            embedding.mapv_inplace(|x| x / norm);
        }
        embedding.to_vec()
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let idx = (u64::from_be_bytes(head) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbedder {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl RemoteEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, LlmError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::RequestFailed(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            dimension,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self
            .http_client
            .post(format!("{}/embeddings", self.base_url))
            .header("Content-Type", "application/json");
        if let Some(ref api_key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::RequestFailed(format!("failed to read embeddings: {}", e)))?;
        if !status.is_success() {
            return Err(decode_api_error(status.as_u16(), &body));
        }
        decode_embeddings(&body, texts.len(), self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Decodes an `/embeddings` response body into vectors in input order.
fn decode_embeddings(body: &str, expected: usize, dimension: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    let mut decoded: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::ParseError(format!("Failed to parse embeddings: {}", e)))?;
    decoded.data.sort_by_key(|d| d.index);

    if decoded.data.len() != expected {
        return Err(LlmError::ParseError(format!(
            "expected {} embeddings, got {}",
            expected,
            decoded.data.len()
        )));
    }
    if let Some(bad) = decoded.data.iter().find(|d| d.embedding.len() != dimension) {
        return Err(LlmError::ParseError(format!(
            "embedding has dimension {}, expected {}",
            bad.embedding.len(),
            dimension
        )));
    }
    Ok(decoded.data.into_iter().map(|d| d.embedding).collect())
}

/// The embedder selected by `config`.
///
/// Without `embedding_model` this is a [`HashEmbedder`]. Otherwise a
/// [`RemoteEmbedder`] calls `embedding_base_url`, falling back to the
/// configured provider's endpoint, with the provider's API key if set.
pub fn embedder_from_config(config: &VizConfig) -> VizResult<Arc<dyn Embedder>> {
    let Some(model) = config.embedding_model.as_deref() else {
        return Ok(Arc::new(HashEmbedder::new(config.embedding_dimension)));
    };

    let kind: ProviderKind = config.provider.parse()?;
    let base_url = config
        .embedding_base_url
        .clone()
        .or_else(|| kind.base_url().map(str::to_string))
        .ok_or_else(|| LlmError::MissingApiBase("VIZFORGE_EMBEDDING_BASE_URL".to_string()))?;
    let api_key = env::var(kind.api_key_env()).ok();

    debug!(model, base_url = %base_url, dimension = config.embedding_dimension, "Using remote embedder");
    let embedder = RemoteEmbedder::new(base_url, api_key, model, config.embedding_dimension)?;
    Ok(Arc::new(embedder))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hash_embedding_is_deterministic_and_unit() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_text("Quarterly sales by region");
        let b = embedder.embed_text("Quarterly sales by region");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = HashEmbedder::new(16).embed_text("  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_related_text_scores_higher() {
        let embedder = HashEmbedder::default();
        let doc = embedder.embed_text("Sales in the north region grew during the holiday quarter");
        let related = embedder.embed_text("north region sales holiday quarter");
        let unrelated = embedder.embed_text("patient blood pressure measurements");
        assert!(cosine(&doc, &related) > cosine(&doc, &unrelated));
    }

    #[tokio::test]
    async fn test_batch_embed_preserves_order() {
        let embedder = HashEmbedder::new(32);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap();
        assert_eq!(vectors[0], embedder.embed_text("alpha"));
        assert_eq!(vectors[1], embedder.embed_text("beta"));
        assert_eq!(embedder.name(), "hash");
    }

    #[test]
    fn test_decode_embeddings_sorts_by_index() {
        let body = r#"{"data": [
            {"index": 1, "embedding": [0.0, 1.0]},
            {"index": 0, "embedding": [1.0, 0.0]}
        ]}"#;
        let vectors = decode_embeddings(body, 2, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_decode_embeddings_rejects_wrong_count_and_dimension() {
        let body = r#"{"data": [{"index": 0, "embedding": [1.0, 0.0]}]}"#;
        match decode_embeddings(body, 2, 2) {
            Err(LlmError::ParseError(msg)) => assert!(msg.contains("expected 2 embeddings, got 1")),
            other => panic!("expected parse error, got {:?}", other),
        }
        match decode_embeddings(body, 1, 3) {
            Err(LlmError::ParseError(msg)) => assert!(msg.contains("dimension 2, expected 3")),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(matches!(
            decode_embeddings("not json", 1, 2),
            Err(LlmError::ParseError(_))
        ));
    }

    #[test]
    fn test_config_selects_embedder() {
        let config = VizConfig::default();
        let embedder = embedder_from_config(&config).unwrap();
        assert_eq!(embedder.name(), "hash");
        assert_eq!(embedder.dimension(), config.embedding_dimension);

        let remote = VizConfig {
            embedding_model: Some("text-embedding-3-small".to_string()),
            embedding_base_url: Some("http://localhost:4000/v1/".to_string()),
            embedding_dimension: 1536,
            ..Default::default()
        };
        let embedder = embedder_from_config(&remote).unwrap();
        assert_eq!(embedder.name(), "text-embedding-3-small");
        assert_eq!(embedder.dimension(), 1536);
    }

    #[test]
    fn test_litellm_embedder_needs_base_url() {
        let config = VizConfig {
            provider: "litellm".to_string(),
            embedding_model: Some("local-embed".to_string()),
            ..Default::default()
        };
        assert!(embedder_from_config(&config).is_err());
    }
}
