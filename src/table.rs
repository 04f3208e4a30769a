//! The rows a lookup returns, and some plain renderings of them for command line use.
//!
//! A [SliceTable] keeps the column names once in its heading and each row as values in
//! heading order. Serialization for an API is left to whoever calls the lookup; the text,
//! CSV and JSON output here exists for the `slice` binary and for debugging.
use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;

use crate::slice_error::{config_error, SliceError};
use crate::value::Value;

#[derive(Clone, Debug, Serialize)]
pub enum TableFormat {
    Csv,
    Json,
    TextTable,
}

impl FromStr for TableFormat {
    type Err = SliceError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let tf = match name.to_ascii_lowercase().as_str() {
            "csv" => Self::Csv,
            "json" => Self::Json,
            "text" => Self::TextTable,
            _ => return Err(config_error!("unknown format name '{name}'")),
        };
        Ok(tf)
    }
}

/// One row viewed as a mapping from column name to value.
#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    heading: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.heading
            .iter()
            .position(|h| h == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.heading
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SliceTable {
    pub heading: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl SliceTable {
    pub fn new(heading: Vec<String>) -> Self {
        Self {
            heading,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.heading.iter().position(|h| h == column)
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            heading: &self.heading,
            values,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            heading: &self.heading,
            values,
        })
    }

    /// Every value of one column, in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Rows rendered as text tuples and sorted, for comparing results whose order isn't
    /// guaranteed.
    pub fn sorted_tuples(&self) -> Vec<Vec<String>> {
        let mut tuples = self
            .rows
            .iter()
            .map(|r| r.iter().map(|v| v.to_string()).collect::<Vec<String>>())
            .collect::<Vec<_>>();
        tuples.sort();
        tuples
    }

    pub fn output(&self, format: TableFormat) -> Result<String, SliceError> {
        match format {
            TableFormat::Csv => self.format_as_csv(),
            TableFormat::Json => self.format_as_json(),
            TableFormat::TextTable => Ok(self.format_as_text()),
        }
    }

    /// A JSON object with the rows under `data`, one object per row.
    pub fn format_as_json(&self) -> Result<String, SliceError> {
        let data = self.iter().map(|r| r.to_map()).collect::<Vec<_>>();
        serde_json::to_string_pretty(&serde_json::json!({ "data": data }))
            .map_err(|e| config_error!("cannot serialize result into json: {e}"))
    }

    pub fn format_as_csv(&self) -> Result<String, SliceError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.heading)?;
        for r in &self.rows {
            writer.write_record(r.iter().map(|v| match v {
                Value::Null => String::new(),
                other => other.to_string(),
            }))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| config_error!("cannot flush CSV output: {e}"))?;
        String::from_utf8(bytes).map_err(|e| config_error!("CSV output is not UTF-8: {e}"))
    }

    pub fn format_as_text(&self) -> String {
        let mut out = String::new();
        let widths = self.column_widths();
        for (column, name) in self.heading.iter().enumerate() {
            out.push_str(&format!("| {n:>w$} ", n = name, w = widths[column]));
        }
        out.push_str("|\n");
        out.push_str(&format!(
            "|{:}|",
            str::repeat("-", self.text_table_width().saturating_sub(2))
        ));
        out.push('\n');

        for r in &self.rows {
            for (column, item) in r.iter().enumerate() {
                let w = widths[column];
                out.push_str(&format!("| {value:>width$} ", value = item.to_string(), width = w));
            }
            out.push_str("|\n");
        }
        out
    }

    pub fn text_table_width(&self) -> usize {
        1 + 3 * self.heading.len() + self.column_widths().iter().sum::<usize>()
    }

    fn column_widths(&self) -> Vec<usize> {
        self.heading
            .iter()
            .enumerate()
            .map(|(column, name)| {
                let data_width = self
                    .rows
                    .iter()
                    .map(|r| r[column].to_string().chars().count())
                    .max()
                    .unwrap_or(0);
                name.chars().count().max(data_width)
            })
            .collect()
    }
}
