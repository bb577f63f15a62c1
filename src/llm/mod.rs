//! LLM integration for vizforge.
//!
//! Every provider speaks the OpenAI-compatible chat completions protocol, so
//! a single [`ChatCompletionsClient`] covers them all. The provider registry
//! decides endpoint, credentials and whether multi-candidate requests are
//! honoured.
//!
//! ```ignore
//! use std::sync::Arc;
//! use vizforge::llm::{EnvProviderFactory, ProviderFactory, ProviderKind, ResponseCache, TextGenerator};
//!
//! let provider = EnvProviderFactory::new().create(ProviderKind::OpenAi, None)?;
//! let generator = TextGenerator::new(provider, Arc::new(ResponseCache::new(512)));
//! let response = generator.generate(messages, &config).await?;
//! for candidate in response.contents() {
//!     println!("{}", candidate);
//! }
//! ```
//!
//! # Candidate counts
//!
//! `n` is a request, not a guarantee. Providers that reject `n > 1` are sent
//! a single-candidate request and callers see one choice.

pub mod cache;
pub mod client;
pub mod generator;
pub mod providers;
pub mod testing;
pub mod types;

pub use cache::{CacheConfig, CacheStats, ContentHash, ResponseCache, SharedResponseCache};
pub use client::ChatCompletionsClient;
pub use generator::TextGenerator;
pub use providers::{EnvProviderFactory, ProviderFactory, ProviderKind};
pub use testing::ScriptedProvider;
pub use types::{
    Choice, ContentPart, GenerationRequest, GenerationResponse, ImageUrl, LlmProvider, Message,
    MessageContent, Usage,
};
