//! Code and visual quality evaluation.

use serde::Deserialize;
use tracing::info;

use super::{complete, first_parsed, image_data_url};
use crate::datamodel::{
    Aspect, AspectEvaluation, DimensionScore, Evaluation, Goal, TextGenerationConfig,
};
use crate::error::{VizError, VizResult};
use crate::llm::TextGenerator;
use crate::parser::{parse_list, ResponseError};
use crate::prompts::{evaluate_messages, Stage};
use crate::scaffold::ChartLibrary;

const MIN_SCORE: f64 = 1.0;
const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Deserialize)]
struct RawAspect {
    aspect: String,
    evaluations: Vec<DimensionScore>,
    /// Ignored; the average is always recomputed.
    #[serde(default)]
    #[allow(dead_code)]
    average: Option<f64>,
}

/// Scores chart code and its rendered image.
#[derive(Debug, Clone, Copy, Default)]
pub struct VizEvaluator;

impl VizEvaluator {
    pub const AGENT_NAME: &'static str = "viz_evaluator";

    /// Evaluates `code` against `goal` using the rendered `image`.
    ///
    /// `image` is raw base64 or a `data:image/...;base64,` URL; anything else
    /// is rejected before the model is called.
    pub async fn evaluate(
        &self,
        generator: &TextGenerator,
        code: &str,
        goal: &Goal,
        image: &str,
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Evaluation> {
        let image_url = image_data_url(image)?;
        if code.trim().is_empty() {
            return Err(VizError::InvalidInput("code to evaluate is empty".to_string()));
        }

        let evaluation = complete(
            generator,
            Stage::Evaluate,
            evaluate_messages(code, goal, library, &image_url),
            config,
        )
        .await?
        .parse(|raws| first_parsed(Stage::Evaluate, raws, parse_evaluation))?;
        info!(
            library = %library,
            code_average = evaluation.code.average,
            visual_average = evaluation.visual.average,
            "Evaluated visualization"
        );
        Ok(evaluation)
    }
}

fn parse_evaluation(raw: &str) -> Result<Evaluation, ResponseError> {
    let aspects = parse_list::<RawAspect>(raw)?;
    if aspects.len() != 2 {
        return Err(ResponseError::schema(
            format!("expected 2 aspects, found {}", aspects.len()),
            raw,
        ));
    }
    Ok(Evaluation {
        code: aspect_evaluation(&aspects, Aspect::Code, raw)?,
        visual: aspect_evaluation(&aspects, Aspect::Visual, raw)?,
    })
}

/// Validates one aspect and orders its scores by [`Aspect::dimensions`].
fn aspect_evaluation(
    aspects: &[RawAspect],
    aspect: Aspect,
    raw: &str,
) -> Result<AspectEvaluation, ResponseError> {
    let mut matching = aspects
        .iter()
        .filter(|a| a.aspect.trim().eq_ignore_ascii_case(aspect.as_str()));
    let found = matching
        .next()
        .ok_or_else(|| ResponseError::schema(format!("missing {} aspect", aspect.as_str()), raw))?;
    if matching.next().is_some() {
        return Err(ResponseError::schema(
            format!("duplicate {} aspect", aspect.as_str()),
            raw,
        ));
    }

    let expected = aspect.dimensions();
    if found.evaluations.len() != expected.len() {
        return Err(ResponseError::schema(
            format!(
                "{} aspect has {} dimensions, expected {}",
                aspect.as_str(),
                found.evaluations.len(),
                expected.len()
            ),
            raw,
        ));
    }

    let mut ordered = Vec::with_capacity(expected.len());
    for dimension in expected {
        let mut scores = found
            .evaluations
            .iter()
            .filter(|e| e.dimension.trim().eq_ignore_ascii_case(dimension));
        let score = scores.next().ok_or_else(|| {
            ResponseError::schema(
                format!("{} aspect is missing dimension '{}'", aspect.as_str(), dimension),
                raw,
            )
        })?;
        if scores.next().is_some() {
            return Err(ResponseError::schema(
                format!("{} aspect repeats dimension '{}'", aspect.as_str(), dimension),
                raw,
            ));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&score.score) {
            return Err(ResponseError::schema(
                format!(
                    "score {} for '{}' is outside {}..={}",
                    score.score, dimension, MIN_SCORE, MAX_SCORE
                ),
                raw,
            ));
        }
        ordered.push(DimensionScore {
            dimension: dimension.to_string(),
            score: score.score,
            rationale: score.rationale.trim().to_string(),
        });
    }
    Ok(AspectEvaluation::new(ordered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::fixtures::{generator, PNG_BASE64};
    use crate::llm::ScriptedProvider;
    use crate::parser::FailureKind;
    use serde_json::json;

    fn reply(visual_scores: [f64; 4], average: f64) -> String {
        let code: Vec<_> = Aspect::Code
            .dimensions()
            .iter()
            .rev()
            .map(|d| json!({"dimension": d, "score": 8, "rationale": "fine"}))
            .collect();
        let visual: Vec<_> = Aspect::Visual
            .dimensions()
            .iter()
            .zip(visual_scores)
            .map(|(d, s)| json!({"dimension": d, "score": s, "rationale": "ok"}))
            .collect();
        let body = json!([
            {"aspect": "visual", "evaluations": visual, "average": average},
            {"aspect": "code", "evaluations": code, "average": average},
        ]);
        format!("```json\n{}\n```", body)
    }

    fn goal() -> Goal {
        Goal::new("Sales per Category?", "bar chart of Sales by Category", "")
    }

    #[tokio::test]
    async fn test_evaluation_recomputes_average() {
        let (gen, provider) = generator(ScriptedProvider::single("mock", reply([7.0, 8.0, 8.0, 6.0], 1.0)));
        let evaluation = VizEvaluator
            .evaluate(
                &gen,
                "def plot(data): ...",
                &goal(),
                PNG_BASE64,
                ChartLibrary::Seaborn,
                &TextGenerationConfig::default(),
            )
            .await
            .unwrap();

        assert_eq!(evaluation.visual.average, 7.25);
        assert_eq!(evaluation.code.average, 8.0);
        let dims: Vec<&str> = evaluation
            .code
            .evaluations
            .iter()
            .map(|e| e.dimension.as_str())
            .collect();
        assert_eq!(dims, Aspect::Code.dimensions().to_vec());

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages[1].content.image_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_image_rejected_before_model_call() {
        let (gen, provider) = generator(ScriptedProvider::single("mock", reply([7.0; 4], 7.0)));
        let err = VizEvaluator
            .evaluate(
                &gen,
                "code",
                &goal(),
                "not an image!!",
                ChartLibrary::Seaborn,
                &TextGenerationConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VizError::InvalidInput(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let err = parse_evaluation(&reply([7.0, 8.0, 11.0, 6.0], 8.0)).unwrap_err();
        assert_eq!(err.kind(), FailureKind::SchemaMismatch);
        let err = parse_evaluation(&reply([0.0, 8.0, 8.0, 6.0], 8.0)).unwrap_err();
        assert_eq!(err.kind(), FailureKind::SchemaMismatch);
    }

    #[test]
    fn test_missing_aspect_or_dimension_rejected() {
        let only_code = json!([{"aspect": "code", "evaluations": []}]).to_string();
        assert_eq!(parse_evaluation(&only_code).unwrap_err().kind(), FailureKind::SchemaMismatch);

        let short = json!([
            {"aspect": "code", "evaluations": [{"dimension": "bugs", "score": 5}]},
            {"aspect": "visual", "evaluations": [{"dimension": "clarity", "score": 5}]}
        ])
        .to_string();
        assert_eq!(parse_evaluation(&short).unwrap_err().kind(), FailureKind::SchemaMismatch);
    }
}
