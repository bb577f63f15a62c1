//! Stage executors.
//!
//! Each executor builds its prompt contract, invokes the model through a
//! [`TextGenerator`], and parses the candidates into typed results. Executors
//! hold configuration only; every call is independent, so they are safe to
//! share and to call concurrently.
//!
//! | Executor | Stage | Output |
//! |----------|-------|--------|
//! | [`Summarizer`] | summarize | [`Summary`](crate::datamodel::Summary) |
//! | [`GoalExplorer`] | goals | `Vec<Goal>` (at most n) |
//! | [`PersonaExplorer`] | personas | `Vec<Persona>` (at most n) |
//! | [`VizGenerator`] | visualize | code per candidate |
//! | [`VizEditor`] | edit | code per candidate |
//! | [`VizRecommender`] | recommend | at most n programs |
//! | [`VizExplainer`] | explain | three-section [`Explanation`](crate::datamodel::Explanation) |
//! | [`VizEvaluator`] | evaluate | [`Evaluation`](crate::datamodel::Evaluation) |
//! | [`ChartAnalyzer`] | analyze | prose |

pub mod analyzer;
pub mod evaluator;
pub mod explainer;
pub mod goals;
pub mod recommender;
pub mod summarizer;
pub mod visualizer;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::datamodel::TextGenerationConfig;
use crate::error::{VizError, VizResult};
use crate::llm::{ContentHash, Message, TextGenerator};
use crate::parser::extraction::preview;
use crate::parser::ResponseError;
use crate::prompts::Stage;

pub use analyzer::ChartAnalyzer;
pub use evaluator::VizEvaluator;
pub use explainer::VizExplainer;
pub use goals::{GoalExplorer, PersonaExplorer};
pub use recommender::VizRecommender;
pub use summarizer::{Summarizer, SummaryMethod};
pub use visualizer::{VizEditor, VizGenerator};

/// Candidates from one model call, tied to the cache entry they came from.
pub(crate) struct Completion<'a> {
    generator: &'a TextGenerator,
    stage: Stage,
    key: Option<ContentHash>,
    raws: Vec<String>,
}

impl Completion<'_> {
    /// Interprets the candidates with `parse`.
    ///
    /// A generation failure evicts the cached response, so an identical
    /// follow-up call reaches the provider instead of replaying bad text.
    pub(crate) fn parse<T, F>(self, parse: F) -> VizResult<T>
    where
        F: FnOnce(&[String]) -> VizResult<T>,
    {
        let result = parse(&self.raws);
        if let (Err(VizError::Generation { .. }), Some(key)) = (&result, &self.key) {
            if self.generator.invalidate(key) {
                debug!(stage = %self.stage, key = %key, "Evicted cached response that failed to parse");
            }
        }
        result
    }
}

/// Sends `messages` and collects the text of every candidate.
pub(crate) async fn complete<'a>(
    generator: &'a TextGenerator,
    stage: Stage,
    messages: Vec<Message>,
    config: &TextGenerationConfig,
) -> VizResult<Completion<'a>> {
    let (response, key) = generator.generate_keyed(messages, config).await?;
    let raws = response.contents();
    debug!(
        stage = %stage,
        provider = %generator.provider_name(),
        requested = config.n,
        count = raws.len(),
        "Received candidates"
    );
    Ok(Completion {
        generator,
        stage,
        key,
        raws,
    })
}

/// Parses candidates in order and returns the first that succeeds.
///
/// Candidates after the first success are not parsed. When none parses the
/// first rejection becomes the generation failure.
pub(crate) fn first_parsed<T, F>(stage: Stage, raws: &[String], parse: F) -> VizResult<T>
where
    F: Fn(&str) -> Result<T, ResponseError>,
{
    let mut first_error = None;
    for (candidate, raw) in raws.iter().enumerate() {
        match parse(raw) {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(
                    stage = %stage,
                    candidate,
                    kind = %err.kind(),
                    error = %err,
                    raw = %preview(raw, 200),
                    "Dropping candidate that failed to parse"
                );
                first_error.get_or_insert(err);
            }
        }
    }
    Err(VizError::from_response(
        stage,
        first_error
            .unwrap_or_else(|| ResponseError::malformed("provider returned no candidates", "")),
    ))
}

/// Validates a base64 image or `data:image/...;base64,` URL and returns it
/// as a data URL.
pub fn image_data_url(image: &str) -> VizResult<String> {
    let image = image.trim();
    if image.is_empty() {
        return Err(VizError::InvalidInput("image is empty".to_string()));
    }

    let (prefix, payload) = match image.strip_prefix("data:") {
        Some(rest) => {
            let (media, payload) = rest.split_once(";base64,").ok_or_else(|| {
                VizError::InvalidInput("data URL is not base64 encoded".to_string())
            })?;
            if !media.starts_with("image/") {
                return Err(VizError::InvalidInput(format!(
                    "data URL has media type '{}', expected an image",
                    media
                )));
            }
            (format!("data:{};base64,", media), payload)
        }
        None => ("data:image/png;base64,".to_string(), image),
    };

    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| VizError::InvalidInput(format!("image is not valid base64: {}", e)))?;
    Ok(format!("{}{}", prefix, payload))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use serde_json::json;

    use crate::datamodel::{Dtype, Field, FieldProperties, Summary};
    use crate::llm::{ResponseCache, ScriptedProvider, TextGenerator};

    pub fn generator(provider: ScriptedProvider) -> (TextGenerator, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        (
            TextGenerator::new(provider.clone(), Arc::new(ResponseCache::new(0))),
            provider,
        )
    }

    pub fn sales_summary() -> Summary {
        let field = |column: &str, dtype, samples| Field {
            column: column.to_string(),
            properties: FieldProperties {
                dtype,
                std: None,
                min: None,
                max: None,
                samples,
                num_unique_values: 3,
                semantic_type: String::new(),
                description: String::new(),
            },
        };
        Summary {
            name: "sales".to_string(),
            file_name: "sales.csv".to_string(),
            dataset_description: String::new(),
            fields: vec![
                field("Category", Dtype::Category, vec![json!("A"), json!("B")]),
                field("Sales", Dtype::Number, vec![json!(10), json!(20)]),
            ],
        }
    }

    /// A 1x1 transparent PNG.
    pub const PNG_BASE64: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::FailureKind;

    #[test]
    fn test_image_data_url_accepts_raw_and_url() {
        let raw = fixtures::PNG_BASE64;
        assert_eq!(
            image_data_url(raw).unwrap(),
            format!("data:image/png;base64,{}", raw)
        );
        let url = format!("data:image/jpeg;base64,{}", raw);
        assert_eq!(image_data_url(&url).unwrap(), url);
    }

    #[test]
    fn test_image_data_url_rejects_bad_input() {
        for bad in ["", "not base64!!", "data:text/plain;base64,aGk=", "data:image/png,abc"] {
            assert!(
                matches!(image_data_url(bad), Err(VizError::InvalidInput(_))),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_first_parsed_skips_bad_candidates() {
        let raws = vec!["bad".to_string(), "2".to_string(), "3".to_string()];
        let value = first_parsed(Stage::Goals, &raws, |raw| {
            raw.parse::<u32>()
                .map_err(|e| ResponseError::malformed(e.to_string(), raw))
        })
        .unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn test_first_parsed_reports_first_failure() {
        let raws = vec!["x".to_string(), "y".to_string()];
        let err = first_parsed::<u32, _>(Stage::Goals, &raws, |raw| {
            Err(ResponseError::schema("wrong shape", raw))
        })
        .unwrap_err();
        match err {
            VizError::Generation { kind, raw, .. } => {
                assert_eq!(kind, FailureKind::SchemaMismatch);
                assert_eq!(raw, "x");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = first_parsed::<u32, _>(Stage::Goals, &[], |raw| {
            Err(ResponseError::schema("unused", raw))
        })
        .unwrap_err();
        assert!(err.is_retryable());
    }
}
