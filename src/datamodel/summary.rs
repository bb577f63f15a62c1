//! Dataset summary types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inferred logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Number,
    Boolean,
    Date,
    Category,
    String,
}

impl Dtype {
    /// Lowercase name used in prompts and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dtype::Number => "number",
            Dtype::Boolean => "boolean",
            Dtype::Date => "date",
            Dtype::Category => "category",
            Dtype::String => "string",
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-column statistics and semantic annotations.
///
/// `dtype`, `samples`, `num_unique_values` and the numeric/date bounds are
/// computed deterministically from the data. `semantic_type` and
/// `description` are the only fields an LLM may fill in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProperties {
    pub dtype: Dtype,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub std: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max: Option<Value>,
    pub samples: Vec<Value>,
    pub num_unique_values: usize,
    #[serde(default)]
    pub semantic_type: String,
    #[serde(default)]
    pub description: String,
}

/// One column of a summarized dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub column: String,
    pub properties: FieldProperties,
}

/// Structured description of a dataset, consumed by every downstream stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub name: String,
    pub file_name: String,
    #[serde(default)]
    pub dataset_description: String,
    pub fields: Vec<Field>,
}

impl Summary {
    /// Column names in dataset order.
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.column.as_str()).collect()
    }

    /// Looks up a field by column name.
    pub fn field(&self, column: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Serialized form embedded into prompts.
    pub fn to_prompt_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{:?}", self))
    }

    /// Plain-text rendering used when the summary is ingested as context.
    pub fn to_context_text(&self) -> String {
        let mut text = format!("Dataset: {}\n", self.name);
        text.push_str(&format!("Description: {}\n\n", self.dataset_description));
        text.push_str("Fields:\n");

        for field in &self.fields {
            let props = &field.properties;
            text.push_str(&format!("- {}: {}\n", field.column, props.dtype));
            if !props.description.is_empty() {
                text.push_str(&format!("  Description: {}\n", props.description));
            }
            if !props.semantic_type.is_empty() {
                text.push_str(&format!("  Semantic Type: {}\n", props.semantic_type));
            }
            if !props.samples.is_empty() {
                let samples: Vec<String> = props
                    .samples
                    .iter()
                    .take(3)
                    .map(|s| match s {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                text.push_str(&format!("  Samples: {}\n", samples.join(", ")));
            }
        }

        text
    }
}
