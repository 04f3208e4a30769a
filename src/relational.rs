//! Lookup against a relational store through DuckDB.
//!
//! The connection is owned by the caller and lent to the lookup for as long as the
//! lookup lives, so transaction scope stays with whoever opened it. Results are fully
//! materialized; there is no streaming or paging.
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use duckdb::types::{TimeUnit, Value as DuckValue};
use duckdb::Connection;
use tracing::info;

use crate::lookup::{LookupStrategy, SliceDefinition};
use crate::predicate::compile;
use crate::query::QueryDescriptor;
use crate::query_gen::{describe_query, select_query, DataSource};
use crate::schema::{ColumnDef, TableSchema};
use crate::slice_error::SliceError;
use crate::table::SliceTable;
use crate::value::Value;

pub struct RelationalLookup<'conn> {
    conn: &'conn Connection,
    source: DataSource,
    schema: TableSchema,
}

impl<'conn> RelationalLookup<'conn> {
    /// Bind to a source and read its column list from the database.
    pub fn new(conn: &'conn Connection, source: DataSource) -> Result<Self, SliceError> {
        let schema = introspect(conn, &source)?;
        Ok(Self {
            conn,
            source,
            schema,
        })
    }

    /// Bind to a source whose schema the caller already knows.
    pub fn with_schema(conn: &'conn Connection, source: DataSource, schema: TableSchema) -> Self {
        Self {
            conn,
            source,
            schema,
        }
    }

    pub fn with_level_column(mut self, identifier: &str, level: &str) -> Self {
        self.schema = self.schema.with_level_column(identifier, level);
        self
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }
}

fn introspect(conn: &Connection, source: &DataSource) -> Result<TableSchema, SliceError> {
    let mut stmt = conn.prepare(&describe_query(source))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let data_type: String = row.get(1)?;
        columns.push(ColumnDef::new(&name, Some(&data_type)));
    }
    Ok(TableSchema::new(source.name(), columns))
}

// 1970-01-01 counted in days from 0001-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn from_duckdb(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Boolean(b),
        DuckValue::TinyInt(i) => Value::Integer(i.into()),
        DuckValue::SmallInt(i) => Value::Integer(i.into()),
        DuckValue::Int(i) => Value::Integer(i.into()),
        DuckValue::BigInt(i) => Value::Integer(i),
        DuckValue::HugeInt(i) => i64::try_from(i)
            .map(Value::Integer)
            .unwrap_or(Value::Float(i as f64)),
        DuckValue::UTinyInt(i) => Value::Integer(i.into()),
        DuckValue::USmallInt(i) => Value::Integer(i.into()),
        DuckValue::UInt(i) => Value::Integer(i.into()),
        DuckValue::UBigInt(i) => i64::try_from(i)
            .map(Value::Integer)
            .unwrap_or(Value::Float(i as f64)),
        DuckValue::Float(f) => Value::Float(f.into()),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::Text(text))
        }
        DuckValue::Text(s) | DuckValue::Enum(s) => Value::Text(s),
        DuckValue::Date32(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map_or(Value::Integer(days.into()), |d| Value::Text(d.to_string())),
        DuckValue::Timestamp(unit, t) => DateTime::<Utc>::from_timestamp_micros(unit.to_micros(t))
            .map_or(Value::Integer(t), |ts| Value::Text(ts.naive_utc().to_string())),
        DuckValue::Time64(unit, t) => time_of_day(unit, t),
        DuckValue::Interval {
            months,
            days,
            nanos,
        } => Value::Text(format!(
            "P{months}M{days}DT{}S",
            Value::Float(nanos as f64 / 1e9)
        )),
        DuckValue::Blob(bytes) => Value::Text(escape_blob(&bytes)),
        // Lists, structs, maps and unions have no scalar form.
        other => Value::Text(format!("{other:?}")),
    }
}

fn time_of_day(unit: TimeUnit, t: i64) -> Value {
    let micros = unit.to_micros(t);
    let secs = u32::try_from(micros / 1_000_000).ok();
    let nanos = u32::try_from((micros % 1_000_000) * 1_000).ok();
    match secs
        .zip(nanos)
        .and_then(|(s, n)| NaiveTime::from_num_seconds_from_midnight_opt(s, n))
    {
        Some(time) => Value::Text(time.to_string()),
        None => Value::Integer(t),
    }
}

// Printable ASCII as is, everything else as \xHH, the way DuckDB prints a BLOB.
fn escape_blob(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| {
            if b.is_ascii_graphic() || *b == b' ' {
                char::from(*b).to_string()
            } else {
                format!("\\x{b:02X}")
            }
        })
        .collect()
}

impl LookupStrategy for RelationalLookup<'_> {
    fn fetch(
        &self,
        slice_def: &SliceDefinition,
        query: &QueryDescriptor,
    ) -> Result<SliceTable, SliceError> {
        let compiled = compile(&self.schema, query)?;
        let sql = select_query(&self.source, &compiled)?;

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let width = compiled.projection.len();
        let mut output = SliceTable::new(compiled.projection);
        // Column names come from the compiled projection rather than the statement
        // because DuckDB's statement column_names() isn't reliable before stepping.
        while let Some(row) = rows.next()? {
            let mut this_row = Vec::with_capacity(width);
            for column_number in 0..width {
                let item: DuckValue = row.get(column_number)?;
                this_row.push(from_duckdb(item));
            }
            output.rows.push(this_row);
        }

        info!(
            slice = %slice_def.name,
            dataset = %self.schema.dataset,
            rows = output.len(),
            "relational fetch"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FacetFilter, FacetReference, YearRange};

    fn trade_db() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory DuckDB");
        conn.execute_batch(
            "CREATE TABLE trade (
                location_id BIGINT,
                location_level VARCHAR,
                product_id BIGINT,
                product_level VARCHAR,
                year INTEGER,
                value DOUBLE
            );
            INSERT INTO trade VALUES
                (5, 'country', 650, '4digit', 2009, 1.0),
                (5, 'country', 650, '4digit', 2010, 10.5),
                (5, 'country', 651, '4digit', 2012, 2.25),
                (5, 'country', 12, 'section', 2011, 3.25),
                (6, 'country', 650, '4digit', 2011, 7.0),
                (5, 'department', 650, '4digit', 2011, 1.5);",
        )
        .expect("fixture SQL should run");
        conn
    }

    fn slice() -> SliceDefinition {
        SliceDefinition::new("product_by_location", "trade")
    }

    #[test]
    fn test_introspected_schema() {
        let conn = trade_db();
        let lookup = RelationalLookup::new(&conn, DataSource::new("trade", None).expect("table"))
            .expect("should describe table");
        let schema = lookup.schema();
        assert_eq!(
            schema.column_names(),
            vec![
                "location_id",
                "location_level",
                "product_id",
                "product_level",
                "year",
                "value"
            ]
        );
        assert_eq!(
            schema.column("year").expect("year").data_type.as_deref(),
            Some("INTEGER")
        );
    }

    #[test]
    fn test_fetch_example_descriptor() {
        let conn = trade_db();
        let lookup = RelationalLookup::new(&conn, DataSource::new("trade", None).expect("table"))
            .expect("should describe table");
        let query = QueryDescriptor::new(FacetReference::new("product_id", "4digit"))
            .with_argument("loc", FacetFilter::new("location_id", 5, "country"))
            .with_year_range(YearRange::new(Some(2010), Some(2012)).expect("valid range"));

        let table = lookup.fetch(&slice(), &query).expect("should fetch");
        assert_eq!(table.len(), 2);
        let mut products = table
            .column_values("product_id")
            .expect("product_id projected")
            .into_iter()
            .cloned()
            .collect::<Vec<Value>>();
        products.sort_by(|a, b| a.compare(b).unwrap_or(std::cmp::Ordering::Equal));
        assert_eq!(products, vec![Value::Integer(650), Value::Integer(651)]);
    }

    #[test]
    fn test_fetch_without_arguments_or_years() {
        let conn = trade_db();
        let lookup = RelationalLookup::new(&conn, DataSource::new("trade", None).expect("table"))
            .expect("should describe table");
        let query = QueryDescriptor::new(FacetReference::new("product_id", "section"));
        let table = lookup.fetch(&slice(), &query).expect("should fetch");
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.row(0).and_then(|r| r.get("value").cloned()),
            Some(Value::Float(3.25))
        );
    }

    #[test]
    fn test_fetch_unknown_column_runs_nothing() {
        let conn = trade_db();
        let schema = TableSchema::from_names("trade", &["product_id", "product_level"]);
        // The source doesn't exist; a query against it would fail with a DuckDB error.
        let lookup = RelationalLookup::with_schema(
            &conn,
            DataSource::new("missing_table", None).expect("table"),
            schema,
        );
        let query = QueryDescriptor::new(FacetReference::new("product_id", "4digit"))
            .with_argument("loc", FacetFilter::new("location_id", 5, "country"));
        let result = lookup.fetch(&slice(), &query);
        assert!(matches!(
            result,
            Err(SliceError::UnknownColumn { ref column, .. }) if column == "location_id"
        ));
    }

    #[test]
    fn test_fetch_from_parquet_file() {
        let conn = trade_db();
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("trade.parquet");
        conn.execute_batch(&format!(
            "COPY trade TO '{}' (FORMAT PARQUET);",
            path.display()
        ))
        .expect("should write parquet");

        let source = DataSource::new("trade", Some(path.as_path())).expect("parquet source");
        let lookup = RelationalLookup::new(&conn, source).expect("should describe parquet");
        let query = QueryDescriptor::new(FacetReference::new("product_id", "4digit"))
            .with_year_range(YearRange::new(Some(2011), None).expect("valid range"));
        let table = lookup.fetch(&slice(), &query).expect("should fetch");
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_from_duckdb_values() {
        assert_eq!(from_duckdb(DuckValue::Int(7)), Value::Integer(7));
        assert_eq!(from_duckdb(DuckValue::Null), Value::Null);
        assert_eq!(
            from_duckdb(DuckValue::Text("country".to_string())),
            Value::from("country")
        );
        assert_eq!(from_duckdb(DuckValue::UBigInt(u64::MAX)), Value::Float(u64::MAX as f64));
    }

    #[test]
    fn test_blob_and_enum_values() {
        assert_eq!(
            from_duckdb(DuckValue::Blob(vec![b'a', b'b', 0xAA])),
            Value::from("ab\\xAA")
        );
        assert_eq!(
            from_duckdb(DuckValue::Enum("country".to_string())),
            Value::from("country")
        );
    }

    fn select_values(sql: &str, width: usize) -> Vec<Value> {
        let conn = Connection::open_in_memory().expect("in-memory DuckDB");
        let mut stmt = conn.prepare(sql).expect("valid SQL");
        let mut rows = stmt.query([]).expect("should run");
        let row = rows.next().expect("should step").expect("one row");
        (0..width)
            .map(|column| from_duckdb(row.get::<_, DuckValue>(column).expect("cell")))
            .collect()
    }

    #[test]
    fn test_decimal_values_are_numbers() {
        assert_eq!(
            select_values(
                "SELECT CAST(10.50 AS DECIMAL(10,2)), CAST(-0.05 AS DECIMAL(4,2))",
                2
            ),
            vec![Value::Float(10.5), Value::Float(-0.05)]
        );
    }

    #[test]
    fn test_temporal_values_are_iso_text() {
        assert_eq!(
            select_values(
                "SELECT DATE '2010-01-01', TIMESTAMP '2010-01-01 12:30:00', TIME '12:30:00'",
                3
            ),
            vec![
                Value::from("2010-01-01"),
                Value::from("2010-01-01 12:30:00"),
                Value::from("12:30:00"),
            ]
        );
    }

    #[test]
    fn test_interval_values() {
        assert_eq!(
            select_values("SELECT INTERVAL '1 month 2 days 3 seconds'", 1),
            vec![Value::from("P1M2DT3S")]
        );
    }

    #[test]
    fn test_fetch_decimal_and_date_columns() {
        let conn = Connection::open_in_memory().expect("in-memory DuckDB");
        conn.execute_batch(
            "CREATE TABLE prices (
                product_id BIGINT,
                product_level VARCHAR,
                year INTEGER,
                price DECIMAL(10,2),
                observed DATE
            );
            INSERT INTO prices VALUES (650, '4digit', 2010, 10.50, DATE '2010-01-01');",
        )
        .expect("fixture SQL should run");
        let lookup = RelationalLookup::new(&conn, DataSource::new("prices", None).expect("table"))
            .expect("should describe table");
        let query = QueryDescriptor::new(FacetReference::new("product_id", "4digit"));
        let table = lookup.fetch(&slice(), &query).expect("should fetch");
        assert_eq!(
            table.rows,
            vec![vec![
                Value::Integer(650),
                Value::from("4digit"),
                Value::Integer(2010),
                Value::Float(10.5),
                Value::from("2010-01-01"),
            ]]
        );
    }
}
