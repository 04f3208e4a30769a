//! SQL generation for the relational lookup.
//!
//! Column names have already been resolved against the schema by the time anything here
//! runs, so the generator only has to render them. Identifiers are double quoted and text
//! values are escaped with `sql_builder::quote`.
//!
//! TODO bind filter values as prepared statement parameters instead of splicing literals.
use std::path::{Path, PathBuf};

use sql_builder::SqlBuilder;
use tracing::debug;

use crate::predicate::CompiledQuery;
use crate::slice_error::{config_error, invalid_query, SliceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Parquet { name: String, full_path: PathBuf },
    NativeTable { name: String },
    Csv { name: String, full_path: PathBuf },
}

impl DataSource {
    /// A data file is typed by its extension; with no path it's a table already in the
    /// database.
    pub fn new(name: &str, full_path: Option<&Path>) -> Result<Self, SliceError> {
        let Some(p) = full_path else {
            return Ok(Self::NativeTable {
                name: name.to_string(),
            });
        };
        match p.extension().and_then(|e| e.to_str()) {
            Some("parquet") => Ok(Self::Parquet {
                name: name.to_string(),
                full_path: p.to_path_buf(),
            }),
            Some("csv") => Ok(Self::Csv {
                name: name.to_string(),
                full_path: p.to_path_buf(),
            }),
            _ => Err(config_error!(
                "can't construct data source '{}' from {}",
                name,
                p.display()
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Parquet { name, .. } | Self::Csv { name, .. } | Self::NativeTable { name } => {
                name
            }
        }
    }

    // DuckDB reads external files named in single quotes in the FROM clause; native
    // tables are referenced by name.
    pub fn from_clause(&self) -> String {
        match self {
            Self::Parquet { full_path, .. } | Self::Csv { full_path, .. } => {
                sql_builder::quote(full_path.display())
            }
            Self::NativeTable { name } => quote_identifier(name),
        }
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The single statement a relational fetch runs: every schema column, all conditions
/// ANDed.
pub fn select_query(source: &DataSource, compiled: &CompiledQuery) -> Result<String, SliceError> {
    let fields = compiled
        .projection
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<String>>();
    if fields.is_empty() {
        return Err(invalid_query!(
            "dataset '{}' has no columns to project",
            compiled.dataset
        ));
    }

    let mut builder = SqlBuilder::select_from(source.from_clause());
    builder.fields(&fields[..]);
    for condition in &compiled.conditions {
        builder.and_where(condition.to_sql());
    }
    let sql = builder
        .sql()
        .map_err(|e| invalid_query!("cannot build SQL for '{}': {}", compiled.dataset, e))?;
    debug!(dataset = %compiled.dataset, %sql, "generated slice SQL");
    Ok(sql)
}

/// Ask DuckDB for the column names and types of a source without reading its rows.
pub fn describe_query(source: &DataSource) -> String {
    format!("DESCRIBE SELECT * FROM {}", source.from_clause())
}
