//! Text generation configuration threaded through every stage.

use serde::{Deserialize, Serialize};

/// Per-call generation settings.
///
/// Stage executors only read this value. The orchestrator fills in
/// `provider` when it is unset and rebinds its client when it differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextGenerationConfig {
    /// Provider name; `None` means "whatever is currently bound".
    pub provider: Option<String>,
    /// Model override; `None` uses the provider default.
    pub model: Option<String>,
    pub temperature: f64,
    /// Requested candidate count. Providers may return fewer.
    pub n: u32,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    /// Serve identical requests from the response cache.
    pub use_cache: bool,
}

impl Default for TextGenerationConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            temperature: 0.0,
            n: 1,
            max_tokens: None,
            top_p: None,
            use_cache: true,
        }
    }
}

impl TextGenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Sets the requested candidate count (at least 1).
    pub fn with_n(mut self, n: u32) -> Self {
        self.n = n.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}
