//! Structured response parsing.
//!
//! Every completion is treated as untrusted text and passed through a strict
//! decode-then-validate boundary:
//!
//! 1. strip fence markers and language tags
//! 2. decode as JSON, failing with [`ResponseError::Malformed`]
//! 3. cast into the stage's target type, failing with
//!    [`ResponseError::SchemaMismatch`]
//!
//! When a provider returns several candidates each is parsed on its own and
//! collected into [`Candidates`], so one bad candidate never aborts the rest.

pub mod extraction;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::error::{VizError, VizResult};
use crate::prompts::Stage;

pub use extraction::{fenced_blocks, find_matching_close, strip_fences, FencedBlock};

/// Characters of raw output included in log lines.
const LOG_PREVIEW_CHARS: usize = 120;

/// Why a candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The text did not decode as JSON (or contained no usable payload).
    Malformed,
    /// Valid JSON of the wrong shape.
    SchemaMismatch,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Malformed => write!(f, "malformed output"),
            FailureKind::SchemaMismatch => write!(f, "schema mismatch"),
        }
    }
}

/// Parser-level error for a single candidate.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResponseError {
    #[error("Malformed output: {reason}")]
    Malformed { reason: String, raw: String },

    #[error("Schema mismatch: {reason}")]
    SchemaMismatch { reason: String, raw: String },
}

impl ResponseError {
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        ResponseError::Malformed {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }

    pub fn schema(reason: impl Into<String>, raw: &str) -> Self {
        ResponseError::SchemaMismatch {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ResponseError::Malformed { .. } => FailureKind::Malformed,
            ResponseError::SchemaMismatch { .. } => FailureKind::SchemaMismatch,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            ResponseError::Malformed { raw, .. } | ResponseError::SchemaMismatch { raw, .. } => raw,
        }
    }

    /// Splits the error into `(reason, raw)`.
    pub fn into_parts(self) -> (String, String) {
        match self {
            ResponseError::Malformed { reason, raw }
            | ResponseError::SchemaMismatch { reason, raw } => (reason, raw),
        }
    }
}

/// Decodes the JSON payload of one completion.
///
/// Fences are stripped first. If the stripped text does not decode, the
/// first balanced object or array inside it is tried before giving up.
pub fn decode_json(raw: &str) -> Result<Value, ResponseError> {
    let stripped = strip_fences(raw);
    if stripped.is_empty() {
        return Err(ResponseError::malformed("empty completion", raw));
    }

    match serde_json::from_str::<Value>(&stripped) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            if let Some(embedded) = extraction::locate_json(&stripped) {
                if let Ok(value) = serde_json::from_str::<Value>(embedded) {
                    return Ok(value);
                }
            }
            let reason = if extraction::looks_truncated(&stripped) {
                format!("truncated JSON: {}", first_err)
            } else {
                first_err.to_string()
            };
            Err(ResponseError::malformed(reason, raw))
        }
    }
}

/// Parses one completion into a single object of type `T`.
pub fn parse_object<T: DeserializeOwned>(raw: &str) -> Result<T, ResponseError> {
    let value = decode_json(raw)?;
    if !value.is_object() {
        return Err(ResponseError::schema(
            format!("expected a JSON object, found {}", json_type_name(&value)),
            raw,
        ));
    }
    serde_json::from_value(value).map_err(|e| ResponseError::schema(e.to_string(), raw))
}

/// Parses one completion into a list of `T`.
///
/// A single object where a list is expected is wrapped in a one-element
/// list. Every element must cast into `T`; the first element that does not
/// rejects the whole candidate.
pub fn parse_list<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, ResponseError> {
    let items = match decode_json(raw)? {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(ResponseError::schema(
                format!("expected a JSON list, found {}", json_type_name(&other)),
                raw,
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item)
                .map_err(|e| ResponseError::schema(format!("element {}: {}", i, e), raw))
        })
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Per-candidate parse results for one model invocation.
#[derive(Debug)]
pub struct Candidates<T> {
    pub stage: Stage,
    /// Successfully parsed candidates, in emission order.
    pub values: Vec<T>,
    /// Rejected candidates, in emission order.
    pub rejected: Vec<ResponseError>,
}

impl<T> Candidates<T> {
    /// Parses every candidate independently with `parse`.
    ///
    /// Rejected candidates are logged and kept in `rejected`; they never stop
    /// the remaining candidates from being parsed.
    pub fn parse<'a, I, F>(stage: Stage, raws: I, parse: F) -> Self
    where
        I: IntoIterator<Item = &'a str>,
        F: Fn(&str) -> Result<T, ResponseError>,
    {
        let mut values = Vec::new();
        let mut rejected = Vec::new();

        for (candidate, raw) in raws.into_iter().enumerate() {
            match parse(raw) {
                Ok(value) => values.push(value),
                Err(err) => {
                    tracing::warn!(
                        stage = %stage,
                        candidate,
                        kind = %err.kind(),
                        error = %err,
                        raw = %extraction::preview(raw, LOG_PREVIEW_CHARS),
                        "Dropping candidate that failed to parse"
                    );
                    rejected.push(err);
                }
            }
        }

        Self {
            stage,
            values,
            rejected,
        }
    }

    /// Total candidates seen.
    pub fn total(&self) -> usize {
        self.values.len() + self.rejected.len()
    }

    /// Partial failure report when some candidates parsed and some did not.
    pub fn partial_failure(&self) -> Option<VizError> {
        if self.values.is_empty() || self.rejected.is_empty() {
            return None;
        }
        Some(VizError::PartialGeneration {
            stage: self.stage,
            succeeded: self.values.len(),
            failed: self.rejected.len(),
        })
    }

    /// Returns the parsed values, or a generation failure if none parsed.
    ///
    /// The failure carries the first rejected candidate's reason and raw
    /// text. A partial failure is logged, not returned.
    pub fn into_result(self) -> VizResult<Vec<T>> {
        if let Some(partial) = self.partial_failure() {
            tracing::warn!(stage = %self.stage, "{}", partial);
        }

        if !self.values.is_empty() {
            return Ok(self.values);
        }

        match self.rejected.into_iter().next() {
            Some(err) => Err(VizError::from_response(self.stage, err)),
            None => Err(VizError::from_response(
                self.stage,
                ResponseError::malformed("provider returned no candidates", ""),
            )),
        }
    }
}
