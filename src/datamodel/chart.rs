//! Chart execution results, explanations and evaluations.

use serde::{Deserialize, Serialize};

use crate::error::{VizError, VizResult};

/// Result of running one piece of chart code through an external executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartExecutorResponse {
    pub code: String,
    /// Base64 PNG of the rendered chart, when execution produced one.
    #[serde(default)]
    pub raster: Option<String>,
    /// Error text reported by the executor.
    #[serde(default)]
    pub error: Option<String>,
    pub library: String,
}

impl ChartExecutorResponse {
    pub fn success(code: impl Into<String>, raster: Option<String>, library: &str) -> Self {
        Self {
            code: code.into(),
            raster,
            error: None,
            library: library.to_string(),
        }
    }

    pub fn failure(code: impl Into<String>, error: impl Into<String>, library: &str) -> Self {
        Self {
            code: code.into(),
            raster: None,
            error: Some(error.into()),
            library: library.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Surfaces an executor-reported error as [`VizError::Execution`].
    pub fn into_result(self) -> VizResult<Self> {
        match self.error {
            Some(error) => Err(VizError::Execution {
                code: self.code,
                error,
            }),
            None => Ok(self),
        }
    }
}

/// The three explanation sections, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Accessibility,
    Transformation,
    Visualization,
}

impl SectionKind {
    pub const ALL: [SectionKind; 3] = [
        SectionKind::Accessibility,
        SectionKind::Transformation,
        SectionKind::Visualization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Accessibility => "accessibility",
            SectionKind::Transformation => "transformation",
            SectionKind::Visualization => "visualization",
        }
    }
}

/// One section of a code explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationSection {
    pub section: SectionKind,
    /// Code excerpt the section refers to. Empty for accessibility.
    pub code: String,
    pub explanation: String,
}

/// A validated explanation: exactly one section per [`SectionKind`], ordered
/// accessibility, transformation, visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Explanation {
    pub sections: Vec<ExplanationSection>,
}

impl Explanation {
    pub fn section(&self, kind: SectionKind) -> Option<&ExplanationSection> {
        self.sections.iter().find(|s| s.section == kind)
    }
}

/// Evaluation aspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aspect {
    Code,
    Visual,
}

impl Aspect {
    /// Dimensions an evaluation of this aspect must score, in order.
    pub fn dimensions(&self) -> &'static [&'static str] {
        match self {
            Aspect::Code => &[
                "bugs",
                "transformation",
                "compliance",
                "encoding",
                "performance",
            ],
            Aspect::Visual => &["clarity", "aesthetics", "readability", "compliance"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Aspect::Code => "code",
            Aspect::Visual => "visual",
        }
    }
}

/// Score for one evaluation dimension, 1 to 10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: String,
    pub score: f64,
    #[serde(default)]
    pub rationale: String,
}

/// Scores for one aspect together with their average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectEvaluation {
    pub evaluations: Vec<DimensionScore>,
    /// Mean score rounded to two decimals, always recomputed locally.
    pub average: f64,
}

impl AspectEvaluation {
    /// Builds an aspect evaluation, discarding any model-reported average.
    pub fn new(evaluations: Vec<DimensionScore>) -> Self {
        let average = mean_rounded(&evaluations);
        Self {
            evaluations,
            average,
        }
    }

    pub fn score(&self, dimension: &str) -> Option<f64> {
        self.evaluations
            .iter()
            .find(|e| e.dimension == dimension)
            .map(|e| e.score)
    }
}

/// Code and visual evaluation of one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub code: AspectEvaluation,
    pub visual: AspectEvaluation,
}

impl Evaluation {
    pub fn aspect(&self, aspect: Aspect) -> &AspectEvaluation {
        match aspect {
            Aspect::Code => &self.code,
            Aspect::Visual => &self.visual,
        }
    }
}

fn mean_rounded(scores: &[DimensionScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64;
    (mean * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(dimension: &str, score: f64) -> DimensionScore {
        DimensionScore {
            dimension: dimension.to_string(),
            score,
            rationale: String::new(),
        }
    }

    #[test]
    fn test_average_rounded_to_two_decimals() {
        let aspect = AspectEvaluation::new(vec![
            score("clarity", 7.0),
            score("aesthetics", 8.0),
            score("readability", 8.0),
        ]);
        assert_eq!(aspect.average, 7.67);
        assert_eq!(aspect.score("aesthetics"), Some(8.0));
    }

    #[test]
    fn test_execution_error_surfaces() {
        let response = ChartExecutorResponse::failure("plot()", "NameError: plt", "seaborn");
        match response.into_result() {
            Err(VizError::Execution { code, error }) => {
                assert_eq!(code, "plot()");
                assert!(error.contains("NameError"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_section_kind_serializes_lowercase() {
        let json = serde_json::to_string(&SectionKind::Transformation).unwrap();
        assert_eq!(json, "\"transformation\"");
    }
}
