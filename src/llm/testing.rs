//! Scripted provider for tests and offline runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::types::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use crate::error::LlmError;

/// Provider that replays canned completions.
///
/// Each call pops the next scripted response; a response is a list of
/// candidate texts, one per returned choice. Once the script runs out the
/// last response is repeated. Every request is recorded.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Vec<String>>>,
    last: Mutex<Vec<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn new<S: Into<String>>(name: impl Into<String>, script: Vec<Vec<S>>) -> Self {
        let script: VecDeque<Vec<String>> = script
            .into_iter()
            .map(|candidates| candidates.into_iter().map(Into::into).collect())
            .collect();
        Self {
            name: name.into(),
            script: Mutex::new(script),
            last: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider that always answers with one candidate.
    pub fn single(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self::new(name, vec![vec![text]])
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock poisoned").len()
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .last()
            .cloned()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request);

        let candidates = {
            let mut script = self.script.lock().expect("script lock poisoned");
            let mut last = self.last.lock().expect("last lock poisoned");
            if let Some(next) = script.pop_front() {
                *last = next;
            }
            last.clone()
        };

        Ok(GenerationResponse {
            id: "scripted".to_string(),
            model: "scripted-model".to_string(),
            choices: candidates
                .into_iter()
                .enumerate()
                .map(|(i, content)| Choice {
                    index: i as u32,
                    message: Message::assistant(content),
                    finish_reason: "stop".to_string(),
                })
                .collect(),
            usage: Usage::default(),
        })
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
