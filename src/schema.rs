//! Column metadata for a dataset, and resolution of the names a descriptor uses.
//!
//! Every name a descriptor mentions must resolve to a column here before any query is
//! built. A miss is a hard [SliceError::UnknownColumn], never a silently empty result.
use std::collections::HashMap;

use crate::query::derived_level_column;
use crate::slice_error::SliceError;

/// The column a year range applies to.
pub const YEAR_COLUMN: &str = "year";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: Option<String>, // backend type name like BIGINT, VARCHAR
}

impl ColumnDef {
    pub fn new(name: &str, data_type: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.map(str::to_string),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        self.data_type
            .as_deref()
            .map_or(ColumnKind::Unknown, ColumnKind::from_type_name)
    }
}

/// The broad family of a column's backend type, used to bring filter values to the
/// column's type before either backend compares anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Boolean,
    /// Dates, times, nested types, or no type information at all.
    Unknown,
}

impl ColumnKind {
    /// Classify a DuckDB type name as reported by `DESCRIBE`.
    pub fn from_type_name(type_name: &str) -> Self {
        let upper = type_name.trim().to_ascii_uppercase();
        let base = upper.split('(').next().unwrap_or_default().trim();
        match base {
            "TINYINT" | "SMALLINT" | "INTEGER" | "INT" | "BIGINT" | "HUGEINT" | "UTINYINT"
            | "USMALLINT" | "UINTEGER" | "UBIGINT" | "UHUGEINT" => Self::Integer,
            "FLOAT" | "REAL" | "DOUBLE" | "DECIMAL" | "NUMERIC" => Self::Float,
            "VARCHAR" | "TEXT" | "STRING" | "CHAR" | "BPCHAR" => Self::Text,
            "BOOLEAN" | "BOOL" => Self::Boolean,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TableSchema {
    pub dataset: String,
    columns: Vec<ColumnDef>,
    by_name: HashMap<String, usize>,
    // identifier column -> level column, consulted before the textual derivation
    level_columns: HashMap<String, String>,
}

impl TableSchema {
    pub fn new(dataset: &str, columns: Vec<ColumnDef>) -> Self {
        let by_name = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self {
            dataset: dataset.to_string(),
            columns,
            by_name,
            level_columns: HashMap::new(),
        }
    }

    pub fn from_names(dataset: &str, names: &[&str]) -> Self {
        let columns = names.iter().map(|n| ColumnDef::new(n, None)).collect();
        Self::new(dataset, columns)
    }

    /// Pair an identifier column with a level column explicitly instead of relying on
    /// the `_id` -> `_level` naming convention.
    pub fn with_level_column(mut self, identifier: &str, level: &str) -> Self {
        self.level_columns
            .insert(identifier.to_string(), level.to_string());
        self
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Result<usize, SliceError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SliceError::unknown_column(name, &self.dataset))
    }

    pub fn column(&self, name: &str) -> Result<&ColumnDef, SliceError> {
        self.index_of(name).map(|i| &self.columns[i])
    }

    /// Name of the level column for `field_name`: the explicit name when given, then
    /// any mapping registered on the schema, then the textual derivation.
    pub fn level_column_name(&self, field_name: &str, explicit: Option<&str>) -> String {
        if let Some(name) = explicit {
            return name.to_string();
        }
        match self.level_columns.get(field_name) {
            Some(mapped) => mapped.clone(),
            None => derived_level_column(field_name),
        }
    }

    pub fn resolve_level_column(
        &self,
        field_name: &str,
        explicit: Option<&str>,
    ) -> Result<&ColumnDef, SliceError> {
        self.column(&self.level_column_name(field_name, explicit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade_schema() -> TableSchema {
        TableSchema::from_names(
            "trade",
            &[
                "location_id",
                "location_level",
                "product_id",
                "product_level",
                "year",
                "value",
            ],
        )
    }

    #[test]
    fn test_column_resolution() {
        let schema = trade_schema();
        assert_eq!(schema.index_of("product_id").expect("exists"), 2);
        assert_eq!(schema.column("year").expect("exists").name, YEAR_COLUMN);
    }

    #[test]
    fn test_column_kinds() {
        assert_eq!(ColumnKind::from_type_name("BIGINT"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_type_name("DECIMAL(10,2)"), ColumnKind::Float);
        assert_eq!(ColumnKind::from_type_name("varchar"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_type_name("BOOLEAN"), ColumnKind::Boolean);
        assert_eq!(ColumnKind::from_type_name("DATE"), ColumnKind::Unknown);
        assert_eq!(ColumnDef::new("year", None).kind(), ColumnKind::Unknown);
    }

    #[test]
    fn test_unknown_column_error() {
        let schema = trade_schema();
        match schema.column("partner_id") {
            Err(SliceError::UnknownColumn { column, dataset }) => {
                assert_eq!(column, "partner_id");
                assert_eq!(dataset, "trade");
            }
            other => panic!("expected UnknownColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_level_column_name_precedence() {
        let schema = trade_schema().with_level_column("location_id", "product_level");
        assert_eq!(
            schema.level_column_name("location_id", Some("explicit")),
            "explicit"
        );
        assert_eq!(
            schema.level_column_name("location_id", None),
            "product_level"
        );
        assert_eq!(
            schema.level_column_name("product_id", None),
            "product_level"
        );
    }

    #[test]
    fn test_resolve_level_column_fails_loudly_for_non_id_names() {
        let schema = trade_schema();
        let result = schema.resolve_level_column("value", None);
        assert!(matches!(
            result,
            Err(SliceError::UnknownColumn { ref column, .. }) if column == "va_level"
        ));
    }
}
