//! OpenAI-compatible chat completions client.
//!
//! One client type serves every supported provider; they differ only in base
//! URL, credentials, default model and whether `n > 1` is accepted.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::types::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use crate::error::LlmError;

/// Maximum number of attempts for transient failures.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Client for `/chat/completions` endpoints.
pub struct ChatCompletionsClient {
    http_client: Client,
    provider_name: String,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    /// Whether the endpoint accepts `n > 1`. When false `n` is omitted.
    supports_n: bool,
    max_attempts: u32,
}

impl ChatCompletionsClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::RequestFailed` if the HTTP client cannot be built.
    pub fn new(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::RequestFailed(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            provider_name: provider_name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            default_model: default_model.into(),
            supports_n: true,
            max_attempts: MAX_ATTEMPTS,
        })
    }

    /// Declares whether the endpoint honours `n > 1`.
    pub fn with_n_support(mut self, supports_n: bool) -> Self {
        self.supports_n = supports_n;
        self
    }

    /// Overrides the number of attempts for transient failures (at least 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn supports_n(&self) -> bool {
        self.supports_n
    }

    /// API key for logging, masked.
    pub fn api_key_masked(&self) -> String {
        match &self.api_key {
            None => "<none>".to_string(),
            Some(key) if key.chars().count() <= 8 => "*".repeat(key.chars().count()),
            Some(key) => {
                let chars: Vec<char> = key.chars().collect();
                let head: String = chars[..4].iter().collect();
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("{}...{}", head, tail)
            }
        }
    }

    fn build_api_request(&self, request: GenerationRequest) -> ApiRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model
        };

        let n = match request.n {
            Some(n) if n > 1 && self.supports_n => Some(n),
            Some(n) if n > 1 => {
                tracing::debug!(
                    provider = %self.provider_name,
                    requested = n,
                    "Provider does not support n > 1, requesting a single candidate"
                );
                None
            }
            _ => None,
        };

        ApiRequest {
            model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
            n,
        }
    }

    /// Executes a request with exponential backoff retry logic.
    async fn execute_with_retry(
        &self,
        request: &ApiRequest,
    ) -> Result<GenerationResponse, LlmError> {
        let mut last_error = None;
        let url = format!("{}/chat/completions", self.base_url);

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                // 1s, 2s, 4s
                let delay_ms = BASE_RETRY_DELAY_MS * (1 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                tracing::debug!(
                    provider = %self.provider_name,
                    attempt = attempt + 1,
                    delay_ms,
                    "Retrying chat completion after transient failure"
                );
            }

            match self.execute_request(&url, request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        provider = %self.provider_name,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "Transient error, will retry"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::RequestFailed("Max retries exceeded with no error captured".to_string())
        }))
    }

    /// Executes a single request.
    async fn execute_request(
        &self,
        url: &str,
        request: &ApiRequest,
    ) -> Result<GenerationResponse, LlmError> {
        let mut http_request = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json");

        if let Some(ref api_key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let http_response = http_request
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(decode_api_error(status_code, &error_text));
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        Ok(api_response.into_generation_response())
    }
}

#[async_trait]
impl LlmProvider for ChatCompletionsClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let api_request = self.build_api_request(request);
        self.execute_with_retry(&api_request).await
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }
}

/// Maps a non-success response body to an `LlmError`.
pub(crate) fn decode_api_error(status_code: u16, body: &str) -> LlmError {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(error_response) => error_response.error.message,
        Err(_) => body.to_string(),
    };

    if status_code == 429 {
        LlmError::RateLimited(message)
    } else {
        LlmError::ApiError {
            code: status_code,
            message,
        }
    }
}

/// Wire request for the chat completions API.
#[derive(Debug, Clone, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

impl ApiResponse {
    fn into_generation_response(self) -> GenerationResponse {
        let choices = self
            .choices
            .into_iter()
            .enumerate()
            .map(|(i, choice)| Choice {
                index: choice.index.unwrap_or(i as u32),
                message: Message::assistant(choice.message.content.unwrap_or_default()),
                finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            })
            .collect();

        let usage = self
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        GenerationResponse {
            id: self.id,
            model: self.model,
            choices,
            usage,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    index: Option<u32>,
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
