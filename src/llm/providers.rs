//! Provider registry.
//!
//! The set of providers is closed: each [`ProviderKind`] knows its endpoint,
//! credential variables, default model and whether it accepts `n > 1`.

use std::env;
use std::str::FromStr;
use std::sync::Arc;

use super::client::ChatCompletionsClient;
use super::types::LlmProvider;
use crate::error::{LlmError, VizError};

/// Supported model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    OpenRouter,
    Gemini,
    LiteLlm,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::OpenRouter,
        ProviderKind::Gemini,
        ProviderKind::LiteLlm,
    ];

    /// Name used in configuration and for rebind comparisons.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Gemini => "gemini",
            ProviderKind::LiteLlm => "litellm",
        }
    }

    /// Fixed endpoint; `None` for LiteLLM, whose base URL comes from
    /// `LITELLM_API_BASE`.
    pub fn base_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("https://api.openai.com/v1"),
            ProviderKind::OpenRouter => Some("https://openrouter.ai/api/v1"),
            ProviderKind::Gemini => {
                Some("https://generativelanguage.googleapis.com/v1beta/openai")
            }
            ProviderKind::LiteLlm => None,
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::LiteLlm => "LITELLM_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::OpenRouter => "openai/gpt-4o-mini",
            ProviderKind::Gemini => "gemini-1.5-flash",
            ProviderKind::LiteLlm => "gpt-4o-mini",
        }
    }

    /// Whether the provider honours a candidate count above one.
    pub fn supports_n(&self) -> bool {
        !matches!(self, ProviderKind::Gemini)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = VizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "litellm" => Ok(ProviderKind::LiteLlm),
            other => Err(VizError::Configuration(format!(
                "unsupported provider '{}', expected one of: openai, openrouter, gemini, litellm",
                other
            ))),
        }
    }
}

/// Creates provider clients for the orchestrator.
pub trait ProviderFactory: Send + Sync {
    /// Builds a client for `kind`, using `model` as its default when given.
    fn create(
        &self,
        kind: ProviderKind,
        model: Option<&str>,
    ) -> Result<Arc<dyn LlmProvider>, VizError>;
}

/// Factory reading credentials from the environment.
#[derive(Debug, Clone, Default)]
pub struct EnvProviderFactory;

impl EnvProviderFactory {
    pub fn new() -> Self {
        Self
    }

    /// Builds the concrete client for `kind`.
    pub fn build_client(
        &self,
        kind: ProviderKind,
        model: Option<&str>,
    ) -> Result<ChatCompletionsClient, LlmError> {
        let model = model.unwrap_or(kind.default_model());

        let client = match kind {
            ProviderKind::LiteLlm => {
                let base = env::var("LITELLM_API_BASE")
                    .map_err(|_| LlmError::MissingApiBase("LITELLM_API_BASE".to_string()))?;
                let key = env::var(kind.api_key_env()).ok();
                let model = env::var("LITELLM_DEFAULT_MODEL").unwrap_or_else(|_| model.to_string());
                ChatCompletionsClient::new(kind.name(), base, key, model)?
            }
            _ => {
                let key = env::var(kind.api_key_env())
                    .map_err(|_| LlmError::MissingApiKey(kind.api_key_env().to_string()))?;
                let base = kind.base_url().unwrap_or_default();
                ChatCompletionsClient::new(kind.name(), base, Some(key), model)?
            }
        };

        Ok(client.with_n_support(kind.supports_n()))
    }
}

impl ProviderFactory for EnvProviderFactory {
    fn create(
        &self,
        kind: ProviderKind,
        model: Option<&str>,
    ) -> Result<Arc<dyn LlmProvider>, VizError> {
        let client = self.build_client(kind, model)?;
        tracing::info!(
            provider = %kind,
            model = client.default_model(),
            key = %client.api_key_masked(),
            "Created provider client"
        );
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_providers() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.name().parse::<ProviderKind>().unwrap(), kind);
        }
        assert_eq!(
            " OpenAI ".parse::<ProviderKind>().unwrap(),
            ProviderKind::OpenAi
        );
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let err = "cohere".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, VizError::Configuration(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_gemini_does_not_support_n() {
        assert!(!ProviderKind::Gemini.supports_n());
        assert!(ProviderKind::OpenAi.supports_n());
    }

    #[test]
    fn test_only_litellm_needs_base_env() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.base_url().is_none(), kind == ProviderKind::LiteLlm);
        }
    }
}
