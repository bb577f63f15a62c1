//! In-memory tabular datasets.
//!
//! A [`DataFrame`] is an ordered list of named columns over rows of JSON
//! scalar cells (`null`, bool, number, string). It carries just enough
//! behavior for summarization and ingestion: column access, cleaning and a
//! textual statistical description.

mod loader;

use std::collections::HashSet;

use serde_json::Value;

use crate::error::DataError;

/// Descriptive statistics over the numeric cells of a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (ddof = 1); `None` below two values.
    pub std: Option<f64>,
}

impl NumericStats {
    /// Statistics over `values`, or `None` when empty.
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = (count >= 2).then(|| {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        });
        Some(Self {
            count,
            min,
            max,
            mean,
            std,
        })
    }
}

/// A named table of JSON scalar cells.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl DataFrame {
    /// Builds a frame, checking that every row has one cell per column.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, DataError> {
        if columns.is_empty() {
            return Err(DataError::NoColumns);
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DataError::RaggedRow {
                    row: i + 1,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self {
            name: name.into(),
            columns,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cells of `column` in row order.
    pub fn column(&self, column: &str) -> Result<Vec<&Value>, DataError> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| DataError::ColumnNotFound(column.to_string()))?;
        Ok(self.column_at(idx))
    }

    pub(crate) fn column_at(&self, idx: usize) -> Vec<&Value> {
        self.rows.iter().map(|row| &row[idx]).collect()
    }

    /// Drops rows whose cells are all null, then duplicate rows (first kept).
    pub fn clean(&self) -> DataFrame {
        let mut seen = HashSet::new();
        let rows = self
            .rows
            .iter()
            .filter(|row| !row.iter().all(Value::is_null))
            .filter(|row| seen.insert(Value::Array(row.to_vec()).to_string()))
            .cloned()
            .collect();
        DataFrame {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Textual description used when a dataset is ingested as context.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "Dataset Name: {}\nNumber of Rows: {}\nNumber of Columns: {}\n\nSummary Statistics:\n",
            self.name,
            self.n_rows(),
            self.n_cols()
        );

        for (idx, column) in self.columns.iter().enumerate() {
            let cells = self.column_at(idx);
            let non_null: Vec<&Value> = cells.iter().copied().filter(|v| !v.is_null()).collect();
            let unique: HashSet<String> = non_null.iter().map(|v| v.to_string()).collect();
            let numbers: Vec<f64> = non_null.iter().filter_map(|v| v.as_f64()).collect();

            if !numbers.is_empty() && numbers.len() == non_null.len() {
                if let Some(stats) = NumericStats::compute(&numbers) {
                    out.push_str(&format!(
                        "- {column} (numeric): count={}, unique={}, min={}, max={}, mean={:.4}",
                        stats.count,
                        unique.len(),
                        stats.min,
                        stats.max,
                        stats.mean
                    ));
                    if let Some(std) = stats.std {
                        out.push_str(&format!(", std={:.4}", std));
                    }
                    out.push('\n');
                }
            } else {
                let samples: Vec<String> = distinct_samples(&cells, 3)
                    .iter()
                    .map(|v| display_cell(v))
                    .collect();
                out.push_str(&format!(
                    "- {column} (text): count={}, unique={}, samples=[{}]\n",
                    non_null.len(),
                    unique.len(),
                    samples.join(", ")
                ));
            }
        }
        out
    }
}

/// First `limit` distinct non-null values in row order.
pub fn distinct_samples(cells: &[&Value], limit: usize) -> Vec<Value> {
    let mut seen = HashSet::new();
    cells
        .iter()
        .filter(|v| !v.is_null())
        .filter(|v| seen.insert(v.to_string()))
        .take(limit)
        .map(|v| (*v).clone())
        .collect()
}

fn display_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
