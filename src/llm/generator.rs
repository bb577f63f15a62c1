//! Text generator bound to one provider and the shared response cache.

use std::sync::Arc;

use super::cache::{ContentHash, SharedResponseCache};
use super::types::{GenerationRequest, GenerationResponse, LlmProvider, Message};
use crate::datamodel::TextGenerationConfig;
use crate::error::LlmError;

/// What stage executors call to reach a model.
///
/// Cloning is cheap; clones share the provider and the cache.
#[derive(Clone)]
pub struct TextGenerator {
    provider: Arc<dyn LlmProvider>,
    cache: SharedResponseCache,
}

impl TextGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, cache: SharedResponseCache) -> Self {
        Self { provider, cache }
    }

    /// Name of the bound provider.
    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn provider(&self) -> Arc<dyn LlmProvider> {
        self.provider.clone()
    }

    pub fn cache(&self) -> &SharedResponseCache {
        &self.cache
    }

    /// Builds the provider request for `messages` under `config`.
    pub fn build_request(messages: Vec<Message>, config: &TextGenerationConfig) -> GenerationRequest {
        let mut request = GenerationRequest::new(config.model.clone().unwrap_or_default(), messages)
            .with_temperature(config.temperature);
        if config.n > 1 {
            request = request.with_n(config.n);
        }
        if let Some(max_tokens) = config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(top_p) = config.top_p {
            request = request.with_top_p(top_p);
        }
        request
    }

    /// Generates candidates for `messages`.
    ///
    /// The provider may return fewer candidates than `config.n`. When
    /// `config.use_cache` is set an identical earlier request is answered
    /// from the cache.
    pub async fn generate(
        &self,
        messages: Vec<Message>,
        config: &TextGenerationConfig,
    ) -> Result<GenerationResponse, LlmError> {
        self.generate_keyed(messages, config)
            .await
            .map(|(response, _)| response)
    }

    /// Like [`generate`](Self::generate), also returning the cache key the
    /// response is stored under, if any.
    pub async fn generate_keyed(
        &self,
        messages: Vec<Message>,
        config: &TextGenerationConfig,
    ) -> Result<(GenerationResponse, Option<ContentHash>), LlmError> {
        let request = Self::build_request(messages, config);

        if !config.use_cache {
            return Ok((self.provider.generate(request).await?, None));
        }

        let key = ContentHash::for_request(self.provider.provider_name(), &request);
        if let Some(response) = self.cache.get(&key) {
            let stats = self.cache.stats();
            tracing::debug!(
                provider = self.provider.provider_name(),
                hits = stats.hits,
                misses = stats.misses,
                hit_rate = format!("{:.2}%", stats.hit_rate() * 100.0),
                "Served generation from cache"
            );
            return Ok((response, Some(key)));
        }

        let response = self.provider.generate(request).await?;
        if response.choices.is_empty() {
            return Ok((response, None));
        }
        self.cache.put(key.clone(), response.clone());
        Ok((response, Some(key)))
    }

    /// Evicts a cached response, so the next identical request reaches the
    /// provider.
    pub fn invalidate(&self, key: &ContentHash) -> bool {
        self.cache.remove(key)
    }
}

impl std::fmt::Debug for TextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextGenerator")
            .field("provider", &self.provider.provider_name())
            .field("cached_entries", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::cache::ResponseCache;
    use crate::llm::testing::ScriptedProvider;

    fn generator(provider: Arc<ScriptedProvider>) -> TextGenerator {
        TextGenerator::new(provider, Arc::new(ResponseCache::new(16)))
    }

    #[tokio::test]
    async fn test_cache_serves_identical_request() {
        let provider = Arc::new(ScriptedProvider::new("openai", vec![vec!["first"], vec!["second"]]));
        let generator = generator(provider.clone());
        let config = TextGenerationConfig::default();

        let a = generator.generate(vec![Message::user("q")], &config).await.unwrap();
        let b = generator.generate(vec![Message::user("q")], &config).await.unwrap();

        assert_eq!(a.contents(), vec!["first"]);
        assert_eq!(b.contents(), vec!["first"]);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_bypassed_when_disabled() {
        let provider = Arc::new(ScriptedProvider::new("openai", vec![vec!["first"], vec!["second"]]));
        let generator = generator(provider.clone());
        let config = TextGenerationConfig::default().with_cache(false);

        generator.generate(vec![Message::user("q")], &config).await.unwrap();
        let b = generator.generate(vec![Message::user("q")], &config).await.unwrap();

        assert_eq!(b.contents(), vec!["second"]);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidated_response_is_regenerated() {
        let provider = Arc::new(ScriptedProvider::new("openai", vec![vec!["bad"], vec!["good"]]));
        let generator = generator(provider.clone());
        let config = TextGenerationConfig::default();

        let (first, key) = generator
            .generate_keyed(vec![Message::user("q")], &config)
            .await
            .unwrap();
        assert_eq!(first.contents(), vec!["bad"]);
        assert!(generator.invalidate(&key.unwrap()));

        let second = generator.generate(vec![Message::user("q")], &config).await.unwrap();
        assert_eq!(second.contents(), vec!["good"]);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_uncached_generation_has_no_key() {
        let provider = Arc::new(ScriptedProvider::single("openai", "x"));
        let generator = generator(provider);
        let config = TextGenerationConfig::default().with_cache(false);
        let (_, key) = generator
            .generate_keyed(vec![Message::user("q")], &config)
            .await
            .unwrap();
        assert!(key.is_none());
    }

    #[test]
    fn test_build_request_maps_config() {
        let config = TextGenerationConfig::default()
            .with_model("gpt-4o")
            .with_n(3)
            .with_temperature(0.5)
            .with_max_tokens(200);
        let request = TextGenerator::build_request(vec![Message::user("q")], &config);
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.n, Some(3));
        assert_eq!(request.temperature, Some(0.5));
        assert_eq!(request.max_tokens, Some(200));

        let single = TextGenerator::build_request(vec![], &TextGenerationConfig::default());
        assert_eq!(single.n, None);
        assert_eq!(single.model, "");
    }
}
