//! Dataset summarization.
//!
//! Statistics are always computed here, from the data. The model, when used,
//! only adds `dataset_description` and per-field `description` and
//! `semantic_type`.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{complete, first_parsed};
use crate::data::{distinct_samples, DataFrame, NumericStats};
use crate::datamodel::{Dtype, Field, FieldProperties, Summary, TextGenerationConfig};
use crate::error::{VizError, VizResult};
use crate::llm::TextGenerator;
use crate::parser::{parse_object, ResponseError};
use crate::prompts::{enrich_messages, Stage};

/// Date layouts recognised besides RFC 3339.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 1] = ["%Y-%m-%d %H:%M:%S"];

/// Unique-to-count ratio below which a text column is categorical.
const CATEGORY_RATIO: f64 = 0.5;

/// How much of the summary to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMethod {
    /// Deterministic statistics only.
    #[default]
    Default,
    /// Statistics plus model-written descriptions.
    Llm,
    /// Column names and dtypes, no statistics.
    Columns,
}

impl FromStr for SummaryMethod {
    type Err = VizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(SummaryMethod::Default),
            "llm" => Ok(SummaryMethod::Llm),
            "columns" => Ok(SummaryMethod::Columns),
            other => Err(VizError::Configuration(format!(
                "unknown summary method '{}', choose from default, llm, columns",
                other
            ))),
        }
    }
}

/// Produces [`Summary`] values from datasets.
#[derive(Debug, Clone)]
pub struct Summarizer {
    n_samples: usize,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Summarizer {
    pub const AGENT_NAME: &'static str = "summarizer";

    pub fn new(n_samples: usize) -> Self {
        Self { n_samples }
    }

    /// Summarizes `data` with the chosen `method`.
    ///
    /// Only [`SummaryMethod::Llm`] calls the model.
    pub async fn summarize(
        &self,
        generator: &TextGenerator,
        data: &DataFrame,
        file_name: &str,
        method: SummaryMethod,
        config: &TextGenerationConfig,
    ) -> VizResult<Summary> {
        if data.n_cols() == 0 {
            return Err(VizError::InvalidInput("dataset has no columns".to_string()));
        }

        let summary = match method {
            SummaryMethod::Columns => self.column_summary(data, file_name),
            SummaryMethod::Default => self.base_summary(data, file_name),
            SummaryMethod::Llm => {
                let base = self.base_summary(data, file_name);
                self.enrich(generator, base, config).await?
            }
        };
        info!(
            dataset = %summary.name,
            fields = summary.fields.len(),
            method = ?method,
            "Summarized dataset"
        );
        Ok(summary)
    }

    /// Deterministic per-column statistics.
    pub fn base_summary(&self, data: &DataFrame, file_name: &str) -> Summary {
        let fields = data
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| Field {
                column: column.clone(),
                properties: self.column_properties(&data.column_at(idx)),
            })
            .collect();
        Summary {
            name: data.name().to_string(),
            file_name: file_name.to_string(),
            dataset_description: String::new(),
            fields,
        }
    }

    /// Column names and dtypes only.
    pub fn column_summary(&self, data: &DataFrame, file_name: &str) -> Summary {
        let mut summary = self.base_summary(data, file_name);
        for field in &mut summary.fields {
            let dtype = field.properties.dtype;
            field.properties = FieldProperties {
                dtype,
                std: None,
                min: None,
                max: None,
                samples: Vec::new(),
                num_unique_values: 0,
                semantic_type: String::new(),
                description: String::new(),
            };
        }
        summary
    }

    fn column_properties(&self, cells: &[&Value]) -> FieldProperties {
        let non_null: Vec<&Value> = cells.iter().copied().filter(|v| !v.is_null()).collect();
        let num_unique_values = non_null
            .iter()
            .map(|v| v.to_string())
            .collect::<HashSet<_>>()
            .len();

        let mut properties = FieldProperties {
            dtype: Dtype::String,
            std: None,
            min: None,
            max: None,
            samples: distinct_samples(cells, self.n_samples),
            num_unique_values,
            semantic_type: String::new(),
            description: String::new(),
        };
        if non_null.is_empty() {
            return properties;
        }

        if non_null.iter().all(|v| v.is_number()) {
            let values: Vec<f64> = non_null.iter().filter_map(|v| v.as_f64()).collect();
            properties.dtype = Dtype::Number;
            if let Some(stats) = NumericStats::compute(&values) {
                properties.min = extreme(&non_null, stats.min);
                properties.max = extreme(&non_null, stats.max);
                properties.std = stats.std;
            }
        } else if non_null.iter().all(|v| v.is_boolean()) {
            properties.dtype = Dtype::Boolean;
        } else if non_null.iter().all(|v| v.is_string()) {
            let texts: Vec<&str> = non_null.iter().filter_map(|v| v.as_str()).collect();
            let dates: Option<Vec<NaiveDateTime>> = texts.iter().map(|t| parse_date(t)).collect();
            match dates {
                Some(dates) => {
                    properties.dtype = Dtype::Date;
                    let (min_i, max_i) = date_bounds(&dates);
                    properties.min = Some(Value::String(texts[min_i].to_string()));
                    properties.max = Some(Value::String(texts[max_i].to_string()));
                }
                None => {
                    let ratio = num_unique_values as f64 / non_null.len() as f64;
                    properties.dtype = if ratio < CATEGORY_RATIO {
                        Dtype::Category
                    } else {
                        Dtype::String
                    };
                }
            }
        }
        properties
    }

    /// Layers model-written descriptions onto `base`.
    async fn enrich(
        &self,
        generator: &TextGenerator,
        base: Summary,
        config: &TextGenerationConfig,
    ) -> VizResult<Summary> {
        let enrichment = complete(generator, Stage::Summarize, enrich_messages(&base), config)
            .await?
            .parse(|raws| first_parsed(Stage::Summarize, raws, parse_enrichment))?;
        Ok(merge_enrichment(base, enrichment))
    }
}

#[derive(Debug, Deserialize)]
struct Enrichment {
    #[serde(default)]
    dataset_description: Option<String>,
    fields: Vec<EnrichedField>,
}

#[derive(Debug, Deserialize)]
struct EnrichedField {
    column: String,
    #[serde(default)]
    properties: EnrichedProperties,
}

#[derive(Debug, Default, Deserialize)]
struct EnrichedProperties {
    #[serde(default)]
    semantic_type: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

fn parse_enrichment(raw: &str) -> Result<Enrichment, ResponseError> {
    parse_object::<Enrichment>(raw)
}

/// Copies descriptions and semantic types onto matching columns.
fn merge_enrichment(mut summary: Summary, enrichment: Enrichment) -> Summary {
    if let Some(description) = enrichment.dataset_description {
        summary.dataset_description = description.trim().to_string();
    }
    for enriched in enrichment.fields {
        match summary
            .fields
            .iter_mut()
            .find(|f| f.column == enriched.column)
        {
            Some(field) => {
                if let Some(semantic_type) = enriched.properties.semantic_type {
                    field.properties.semantic_type = semantic_type.trim().to_string();
                }
                if let Some(description) = enriched.properties.description {
                    field.properties.description = description.trim().to_string();
                }
            }
            None => warn!(
                column = %enriched.column,
                "Enrichment mentions a column that is not in the dataset, ignoring"
            ),
        }
    }
    summary
}

/// The original cell whose numeric value equals `target`.
fn extreme(cells: &[&Value], target: f64) -> Option<Value> {
    cells
        .iter()
        .find(|v| v.as_f64() == Some(target))
        .map(|v| (*v).clone())
}

fn date_bounds(dates: &[NaiveDateTime]) -> (usize, usize) {
    let mut min_i = 0;
    let mut max_i = 0;
    for (i, date) in dates.iter().enumerate() {
        if *date < dates[min_i] {
            min_i = i;
        }
        if *date > dates[max_i] {
            max_i = i;
        }
    }
    (min_i, max_i)
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}
