//! In-memory lookup over a columnar [DataFrame].
//!
//! The descriptor is compiled exactly as for the relational lookup. Each condition then
//! becomes a boolean mask over the rows and the masks are ANDed; the rows left standing
//! are copied out with every column. Over the same logical data this returns the same
//! rows as a [RelationalLookup](crate::relational::RelationalLookup), possibly in a
//! different order.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

use crate::lookup::{LookupStrategy, SliceDefinition};
use crate::predicate::{compile, Condition};
use crate::query::QueryDescriptor;
use crate::schema::{ColumnDef, TableSchema};
use crate::slice_error::SliceError;
use crate::table::SliceTable;
use crate::value::Value;

/// Column oriented storage: one `Vec<Value>` per column, all the same length.
#[derive(Clone, Debug, Default)]
pub struct DataFrame {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
    n_rows: usize,
}

impl DataFrame {
    pub fn from_rows(heading: &[&str], rows: Vec<Vec<Value>>) -> Result<Self, SliceError> {
        let mut columns: Vec<Vec<Value>> = heading
            .iter()
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();
        let n_rows = rows.len();
        for (row_number, row) in rows.into_iter().enumerate() {
            if row.len() != heading.len() {
                return Err(SliceError::Data(format!(
                    "row {} has {} values but the heading has {} columns",
                    row_number,
                    row.len(),
                    heading.len()
                )));
            }
            for (column, value) in row.into_iter().enumerate() {
                columns[column].push(value);
            }
        }
        Ok(Self {
            names: heading.iter().map(|h| h.to_string()).collect(),
            columns,
            n_rows,
        })
    }

    /// Read a CSV file with a header line. Cell types are inferred per column: a column
    /// holding both numbers and text is kept entirely as text, integers mixed with floats
    /// become floats, and empty cells are NULL.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, SliceError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let names = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<String>>();
        let mut raw_columns: Vec<Vec<String>> = names.iter().map(|_| Vec::new()).collect();
        let mut n_rows = 0;
        for record in csv_reader.records() {
            let record = record?;
            for (column, field) in record.iter().enumerate() {
                raw_columns[column].push(field.to_string());
            }
            n_rows += 1;
        }

        let columns = names
            .iter()
            .zip(raw_columns)
            .map(|(name, raw)| infer_column(name, raw))
            .collect();
        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, SliceError> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, index: usize) -> Option<&[Value]> {
        self.columns.get(index).map(|c| c.as_slice())
    }

    /// A schema for this frame with type names the way DuckDB would report them.
    pub fn schema(&self, dataset: &str) -> TableSchema {
        let columns = self
            .names
            .iter()
            .zip(&self.columns)
            .map(|(name, values)| ColumnDef::new(name, Some(type_name(values))))
            .collect();
        TableSchema::new(dataset, columns)
    }

    fn mask(&self, condition: &Condition) -> Vec<bool> {
        match self.column(condition.column_index) {
            Some(values) => values.iter().map(|v| condition.matches(v)).collect(),
            None => vec![false; self.n_rows],
        }
    }

    fn take(&self, mask: &[bool]) -> SliceTable {
        let mut table = SliceTable::new(self.names.clone());
        for (row, keep) in mask.iter().enumerate() {
            if *keep {
                table
                    .rows
                    .push(self.columns.iter().map(|c| c[row].clone()).collect());
            }
        }
        table
    }
}

fn infer_column(name: &str, raw: Vec<String>) -> Vec<Value> {
    let values = raw.iter().map(|r| Value::infer(r)).collect::<Vec<Value>>();
    let has_text = values.iter().any(|v| matches!(v, Value::Text(_)));
    let has_number = values
        .iter()
        .any(|v| matches!(v, Value::Integer(_) | Value::Float(_)));
    let has_float = values.iter().any(|v| matches!(v, Value::Float(_)));

    if has_text && has_number {
        warn!(column = name, "column mixes numbers and text; reading it all as text");
        raw.into_iter()
            .zip(values)
            .map(|(r, v)| {
                if v.is_null() {
                    Value::Null
                } else {
                    Value::Text(r.trim().to_string())
                }
            })
            .collect()
    } else if has_float {
        values
            .into_iter()
            .map(|v| match v {
                Value::Integer(i) => Value::Float(i as f64),
                other => other,
            })
            .collect()
    } else {
        values
    }
}

fn type_name(values: &[Value]) -> &'static str {
    match values.iter().find(|v| !v.is_null()) {
        Some(Value::Boolean(_)) => "BOOLEAN",
        Some(Value::Integer(_)) => "BIGINT",
        Some(Value::Float(_)) => "DOUBLE",
        Some(Value::Text(_)) | Some(Value::Null) | None => "VARCHAR",
    }
}

pub struct TabularLookup {
    schema: TableSchema,
    frame: DataFrame,
}

impl TabularLookup {
    pub fn new(dataset: &str, frame: DataFrame) -> Self {
        Self {
            schema: frame.schema(dataset),
            frame,
        }
    }

    pub fn from_csv_path(dataset: &str, path: &Path) -> Result<Self, SliceError> {
        Ok(Self::new(dataset, DataFrame::from_csv_path(path)?))
    }

    pub fn with_level_column(mut self, identifier: &str, level: &str) -> Self {
        self.schema = self.schema.with_level_column(identifier, level);
        self
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }
}

impl LookupStrategy for TabularLookup {
    fn fetch(
        &self,
        slice_def: &SliceDefinition,
        query: &QueryDescriptor,
    ) -> Result<SliceTable, SliceError> {
        let compiled = compile(&self.schema, query)?;

        let mut keep = vec![true; self.frame.n_rows()];
        for condition in &compiled.conditions {
            for (k, matched) in keep.iter_mut().zip(self.frame.mask(condition)) {
                *k = *k && matched;
            }
        }
        let table = self.frame.take(&keep);

        info!(
            slice = %slice_def.name,
            dataset = %self.schema.dataset,
            rows = table.len(),
            "tabular fetch"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FacetFilter, FacetReference, YearRange};

    const TRADE_CSV: &str = "\
location_id,location_level,product_id,product_level,year,value
5,country,650,4digit,2010,10.5
5,country,650,4digit,2013,11
5,country,12,section,2011,3.25
6,country,650,4digit,2011,7.0
5,department,650,4digit,2011,1.5
";

    fn trade_lookup() -> TabularLookup {
        let frame = DataFrame::from_csv_reader(TRADE_CSV.as_bytes()).expect("valid CSV");
        TabularLookup::new("trade", frame)
    }

    fn slice() -> SliceDefinition {
        SliceDefinition::new("product_by_location", "trade")
    }

    #[test]
    fn test_csv_inference() {
        let frame = DataFrame::from_csv_reader(TRADE_CSV.as_bytes()).expect("valid CSV");
        assert_eq!(frame.n_rows(), 5);
        assert_eq!(frame.column_names().len(), 6);
        let schema = frame.schema("trade");
        let types = schema
            .columns()
            .iter()
            .map(|c| c.data_type.clone().unwrap_or_default())
            .collect::<Vec<String>>();
        assert_eq!(
            types,
            vec!["BIGINT", "VARCHAR", "BIGINT", "VARCHAR", "BIGINT", "DOUBLE"]
        );
        // 11 reads as an integer by itself but the rest of the column is floats.
        assert_eq!(frame.column(5).expect("value column")[1], Value::Float(11.0));
    }

    #[test]
    fn test_mixed_column_reads_as_text() {
        let frame =
            DataFrame::from_csv_reader("code,n\n5,1\nARG,\n".as_bytes()).expect("valid CSV");
        let codes = frame.column(0).expect("code column");
        assert_eq!(codes, &[Value::from("5"), Value::from("ARG")]);
        assert_eq!(frame.column(1).expect("n column")[1], Value::Null);
    }

    #[test]
    fn test_from_rows_width_mismatch() {
        let result = DataFrame::from_rows(&["a", "b"], vec![vec![Value::Integer(1)]]);
        assert!(matches!(result, Err(SliceError::Data(_))));
    }

    #[test]
    fn test_fetch_example_descriptor() {
        let query = QueryDescriptor::new(FacetReference::new("product_id", "4digit"))
            .with_argument("loc", FacetFilter::new("location_id", 5, "country"))
            .with_year_range(YearRange::new(Some(2010), Some(2012)).expect("valid range"));
        let table = trade_lookup().fetch(&slice(), &query).expect("should fetch");
        assert_eq!(table.len(), 1);
        let row = table.row(0).expect("one row");
        assert_eq!(row.get("product_id"), Some(&Value::Integer(650)));
        assert_eq!(row.get("year"), Some(&Value::Integer(2010)));
        assert_eq!(table.heading.len(), 6);
    }

    #[test]
    fn test_fetch_everything_at_result_level() {
        let query = QueryDescriptor::new(FacetReference::new("product_id", "4digit"));
        let table = trade_lookup().fetch(&slice(), &query).expect("should fetch");
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_fetch_text_value_on_integer_column() {
        let query = QueryDescriptor::new(FacetReference::new("product_id", "4digit"))
            .with_argument("loc", FacetFilter::new("location_id", " 5", "country"));
        let table = trade_lookup().fetch(&slice(), &query).expect("should fetch");
        assert_eq!(table.len(), 2);

        let bad = QueryDescriptor::new(FacetReference::new("product_id", "4digit"))
            .with_argument("loc", FacetFilter::new("location_id", "ARG", "country"));
        let result = trade_lookup().fetch(&slice(), &bad);
        assert!(matches!(result, Err(SliceError::InvalidQuery(_))));
    }

    #[test]
    fn test_fetch_unknown_column() {
        let query = QueryDescriptor::new(FacetReference::new("product_id", "4digit"))
            .with_argument("partner", FacetFilter::new("partner_id", 1, "country"));
        let result = trade_lookup().fetch(&slice(), &query);
        assert!(matches!(result, Err(SliceError::UnknownColumn { .. })));
    }

    #[test]
    fn test_schema_level_mapping() {
        let csv = "geo_id,geo_kind,product_id,product_level,year\n\
                   1,country,7,4digit,2010\n\
                   1,region,7,4digit,2010\n";
        let frame = DataFrame::from_csv_reader(csv.as_bytes()).expect("valid CSV");
        let lookup = TabularLookup::new("geo", frame).with_level_column("geo_id", "geo_kind");
        let query = QueryDescriptor::new(FacetReference::new("product_id", "4digit"))
            .with_argument("geo", FacetFilter::new("geo_id", 1, "region"));
        let table = lookup.fetch(&slice(), &query).expect("should fetch");
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.row(0).and_then(|r| r.get("geo_kind").cloned()),
            Some(Value::from("region"))
        );
    }
}
