//! Goals and personas.

use serde::{Deserialize, Serialize};

use super::Summary;

/// Persona substituted when the caller does not supply one.
pub const DEFAULT_PERSONA: &str =
    "A highly skilled data analyst who can come up with complex, insightful goals about data";

/// An analytical target proposed for a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    #[serde(default)]
    pub index: usize,
    pub question: String,
    /// Chart type plus the referenced column names.
    pub visualization: String,
    pub rationale: String,
}

impl Goal {
    /// Creates a goal with index 0.
    pub fn new(
        question: impl Into<String>,
        visualization: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            index: 0,
            question: question.into(),
            visualization: visualization.into(),
            rationale: rationale.into(),
        }
    }

    /// Builds a goal from a free-text request, used both as question and
    /// visualization.
    pub fn from_question(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(text.clone(), text, "")
    }

    /// Summary columns mentioned by the question or visualization.
    ///
    /// This is advisory: models are told to reference exact column names but
    /// nothing enforces it.
    pub fn referenced_columns<'a>(&self, summary: &'a Summary) -> Vec<&'a str> {
        summary
            .fields
            .iter()
            .map(|f| f.column.as_str())
            .filter(|column| {
                !column.is_empty()
                    && (self.visualization.contains(column) || self.question.contains(column))
            })
            .collect()
    }
}

/// Steering context for goal generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub persona: String,
    pub rationale: String,
}

impl Persona {
    pub fn new(persona: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            rationale: rationale.into(),
        }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA, "")
    }
}

impl From<&str> for Persona {
    fn from(persona: &str) -> Self {
        Self::new(persona, "")
    }
}
