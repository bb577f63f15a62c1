//! CSV and JSON dataset loaders.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde_json::{Number, Value};

use super::{display_cell, DataFrame};
use crate::error::DataError;

impl DataFrame {
    /// Loads a dataset, choosing the format from the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Self::from_csv_reader(name, File::open(path)?, b','),
            "tsv" => Self::from_csv_reader(name, File::open(path)?, b'\t'),
            "json" => {
                let text = std::fs::read_to_string(path)?;
                Self::from_json_str(name, &text)
            }
            other => Err(DataError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Reads delimited text with a header row, sniffing each cell's type.
    pub fn from_csv_reader<R: Read>(
        name: impl Into<String>,
        reader: R,
        delimiter: u8,
    ) -> Result<Self, DataError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(DataError::NoColumns);
        }

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != columns.len() {
                return Err(DataError::RaggedRow {
                    row: i + 1,
                    expected: columns.len(),
                    found: record.len(),
                });
            }
            rows.push(record.iter().map(sniff_cell).collect());
        }

        DataFrame::new(name, columns, rows)
    }

    /// Parses a JSON array of records.
    ///
    /// Columns follow first appearance across records; missing keys become
    /// null and nested values are stored as their JSON text.
    pub fn from_json_str(name: impl Into<String>, text: &str) -> Result<Self, DataError> {
        let value: Value = serde_json::from_str(text)?;
        let records = value
            .as_array()
            .ok_or_else(|| DataError::InvalidRecords("expected an array of objects".to_string()))?;

        let mut columns: Vec<String> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or_else(|| {
                DataError::InvalidRecords(format!("record {} is not an object", i))
            })?;
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .filter_map(Value::as_object)
            .map(|object| {
                columns
                    .iter()
                    .map(|c| object.get(c).map(scalar).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        DataFrame::new(name, columns, rows)
    }

    /// Writes the frame as comma-separated text with a header row.
    ///
    /// Nulls are written as empty cells, so a write followed by
    /// [`DataFrame::from_csv_reader`] yields the same cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DataError> {
        let mut writer = WriterBuilder::new().from_writer(writer);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| match cell {
                Value::Null => String::new(),
                other => display_cell(other),
            }))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Types one CSV cell: empty → null, then integer, float, boolean, string.
pub(crate) fn sniff_cell(raw: &str) -> Value {
    let cell = raw.trim();
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = cell.parse::<f64>() {
        return Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
    }
    match cell.to_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

fn scalar(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_sniff_cell_types() {
        assert_eq!(sniff_cell(""), Value::Null);
        assert_eq!(sniff_cell(" 42 "), json!(42));
        assert_eq!(sniff_cell("3.5"), json!(3.5));
        assert_eq!(sniff_cell("TRUE"), json!(true));
        assert_eq!(sniff_cell("2024-01-01"), json!("2024-01-01"));
        assert_eq!(sniff_cell("NaN"), Value::Null);
    }

    #[test]
    fn test_csv_reader() {
        let data = "Category,Sales\nA,10\nB,20.5\n,\n";
        let frame = DataFrame::from_csv_reader("sales", data.as_bytes(), b',').unwrap();
        assert_eq!(frame.columns(), ["Category", "Sales"]);
        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.rows()[1], vec![json!("B"), json!(20.5)]);
        assert_eq!(frame.rows()[2], vec![Value::Null, Value::Null]);
    }

    #[test]
    fn test_write_csv_reads_back() {
        let data = "Category,Sales,Note\nA,10,\"x, y\"\nB,,z\n";
        let frame = DataFrame::from_csv_reader("sales", data.as_bytes(), b',').unwrap();
        let mut out = Vec::new();
        frame.write_csv(&mut out).unwrap();

        let again = DataFrame::from_csv_reader("sales", out.as_slice(), b',').unwrap();
        assert_eq!(again, frame);
        assert_eq!(again.rows()[0][2], json!("x, y"));
    }

    #[test]
    fn test_csv_ragged_row() {
        let data = "a,b\n1,2\n3\n";
        let err = DataFrame::from_csv_reader("x", data.as_bytes(), b',').unwrap_err();
        assert!(matches!(
            err,
            DataError::RaggedRow {
                row: 2,
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_json_records_keep_first_appearance_order() {
        let text = r#"[{"b": 1, "a": "x"}, {"a": "y", "c": [1, 2]}]"#;
        let frame = DataFrame::from_json_str("t", text).unwrap();
        assert_eq!(frame.columns(), ["b", "a", "c"]);
        assert_eq!(frame.rows()[0], vec![json!(1), json!("x"), Value::Null]);
        assert_eq!(frame.rows()[1][2], json!("[1,2]"));

        assert!(DataFrame::from_json_str("t", r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn test_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cars.tsv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "make\tmpg\nford\t21\nbmw\t30").unwrap();

        let frame = DataFrame::from_path(&path).unwrap();
        assert_eq!(frame.name(), "cars");
        assert_eq!(frame.column("mpg").unwrap(), vec![&json!(21), &json!(30)]);

        let err = DataFrame::from_path(dir.path().join("cars.xlsx")).unwrap_err();
        assert!(matches!(err, DataError::UnsupportedFormat(ext) if ext == "xlsx"));
    }
}
