//! Error types for vizforge operations.
//!
//! Defines error types for the major subsystems:
//! - LLM provider interactions
//! - Dataset loading
//! - Stage execution (generation, parsing, validation)
//! - Context store ingestion
//! - Chart execution pass-through

use thiserror::Error;

use crate::config::ConfigError;
use crate::parser::{FailureKind, ResponseError};
use crate::prompts::Stage;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: {0} environment variable not set")]
    MissingApiKey(String),

    #[error("Missing API base URL: {0} environment variable not set")]
    MissingApiBase(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

impl LlmError {
    /// Whether a fresh attempt of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RequestFailed(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("timeout")
                    || msg.contains("timed out")
                    || msg.contains("connection")
                    || msg.contains("temporarily")
            }
            LlmError::RateLimited(_) => true,
            LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

/// Errors that can occur while loading or inspecting a tabular dataset.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Unsupported dataset format '{0}': expected .csv, .tsv or .json")]
    UnsupportedFormat(String),

    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Dataset has no columns")]
    NoColumns,

    #[error("Invalid JSON dataset: {0}")]
    InvalidRecords(String),

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by stage executors, the context store and the orchestrator.
#[derive(Debug, Error)]
pub enum VizError {
    /// Unsupported provider, library or setting. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Model output could not be decoded or did not match the stage schema.
    #[error("{stage} generation failed ({kind}): {reason}")]
    Generation {
        stage: Stage,
        kind: FailureKind,
        reason: String,
        /// Raw completion text that failed, kept for diagnosis.
        raw: String,
    },

    /// Some candidates parsed and some did not. Reported, never fatal.
    #[error("{stage}: {failed} of {total} candidates rejected", total = .succeeded + .failed)]
    PartialGeneration {
        stage: Stage,
        succeeded: usize,
        failed: usize,
    },

    /// Content/vector store insertion failed; both stores are unchanged.
    #[error("Ingestion of '{source_id}' failed: {reason}")]
    Ingestion { source_id: String, reason: String },

    /// The external chart executor reported an error for a piece of code.
    #[error("Chart execution failed: {error}")]
    Execution { code: String, error: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VizError {
    /// Converts a parser error into a stage-level generation failure.
    pub fn from_response(stage: Stage, err: ResponseError) -> Self {
        let kind = err.kind();
        let (reason, raw) = err.into_parts();
        VizError::Generation {
            stage,
            kind,
            reason,
            raw,
        }
    }

    /// Whether retrying with a fresh provider call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            VizError::Generation { .. } => true,
            VizError::Llm(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Raw model text attached to a generation failure, if any.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            VizError::Generation { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Result type alias for stage and orchestrator operations.
pub type VizResult<T> = Result<T, VizError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_llm_errors() {
        assert!(LlmError::RateLimited("slow down".to_string()).is_transient());
        assert!(LlmError::ApiError {
            code: 503,
            message: "unavailable".to_string()
        }
        .is_transient());
        assert!(!LlmError::ApiError {
            code: 401,
            message: "bad key".to_string()
        }
        .is_transient());
        assert!(LlmError::RequestFailed("Connection refused".to_string()).is_transient());
        assert!(!LlmError::MissingApiKey("OPENAI_API_KEY".to_string()).is_transient());
    }

    #[test]
    fn test_generation_failure_keeps_raw_text() {
        let err = VizError::from_response(
            Stage::Goals,
            ResponseError::Malformed {
                reason: "expected value".to_string(),
                raw: "not json".to_string(),
            },
        );
        assert!(err.is_retryable());
        assert_eq!(err.raw_output(), Some("not json"));
        assert!(matches!(
            err,
            VizError::Generation {
                kind: FailureKind::Malformed,
                ..
            }
        ));
    }

    #[test]
    fn test_configuration_is_not_retryable() {
        let err = VizError::Configuration("unknown library".to_string());
        assert!(!err.is_retryable());
        assert!(err.raw_output().is_none());
    }

    #[test]
    fn test_partial_generation_message() {
        let err = VizError::PartialGeneration {
            stage: Stage::Explain,
            succeeded: 2,
            failed: 1,
        };
        assert_eq!(err.to_string(), "explain: 1 of 3 candidates rejected");
    }
}
