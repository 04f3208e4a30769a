//! Compile a [QueryDescriptor] into a list of conjunctive conditions over a [TableSchema].
//!
//! Both lookup strategies run the same compiled conditions: the relational one turns them
//! into a WHERE clause, the tabular one evaluates them as boolean masks. Sharing the
//! compilation step is what keeps the two backends returning the same rows.
//!
//! Conditions are emitted in this order and are all ANDed together:
//!
//! 1. for each facet filter, in argument order: `field_name = value`, then
//!    `level column = level`
//! 2. the result facet's level column `= result.level` (its identifier is projected, not
//!    filtered)
//! 3. `year >= start` when the range has a start
//! 4. `year <= end` when the range has an end
//!
//! Each value is cast to the type of the column it's compared with, see
//! [Value::cast_to].
use std::cmp::Ordering;
use std::fmt;

use tracing::debug;

use crate::query::QueryDescriptor;
use crate::query_gen::quote_identifier;
use crate::schema::{TableSchema, YEAR_COLUMN};
use crate::slice_error::{invalid_query, SliceError};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOperation {
    Equal,
    GreaterEqual,
    LessEqual,
}

impl CompareOperation {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::GreaterEqual => ">=",
            Self::LessEqual => "<=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Self::Equal => ordering == Ordering::Equal,
            Self::GreaterEqual => ordering != Ordering::Less,
            Self::LessEqual => ordering != Ordering::Greater,
        }
    }
}

/// A single resolved predicate: `column <op> compare_to`.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub column_index: usize, // position in the schema's column list
    pub comparison: CompareOperation,
    pub compare_to: Value,
}

impl Condition {
    /// Evaluate against one cell. NULL on either side never matches.
    pub fn matches(&self, cell: &Value) -> bool {
        cell.compare(&self.compare_to)
            .map_or(false, |ord| self.comparison.accepts(ord))
    }

    /// The condition as it appears in the generated WHERE clause.
    pub fn to_sql(&self) -> String {
        format!(
            "{} {} {}",
            quote_identifier(&self.column),
            self.comparison.symbol(),
            self.compare_to.sql_literal()
        )
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

#[derive(Clone, Debug)]
pub struct CompiledQuery {
    pub dataset: String,
    /// Always the full column list of the schema, in schema order.
    pub projection: Vec<String>,
    pub conditions: Vec<Condition>,
}

impl CompiledQuery {
    pub fn where_clause(&self) -> String {
        self.conditions
            .iter()
            .map(Condition::to_sql)
            .collect::<Vec<String>>()
            .join(" AND ")
    }
}

// A condition waiting for its column to be resolved.
struct Pending {
    column: String,
    comparison: CompareOperation,
    compare_to: Value,
}

impl Pending {
    fn new(column: String, comparison: CompareOperation, compare_to: Value) -> Self {
        Self {
            column,
            comparison,
            compare_to,
        }
    }
}

/// Resolve every column the descriptor mentions and build the conditions. The first name
/// that doesn't resolve fails the whole compilation.
pub fn compile(schema: &TableSchema, query: &QueryDescriptor) -> Result<CompiledQuery, SliceError> {
    let mut pending = Vec::new();

    for facet in query.arguments().filters() {
        pending.push(Pending::new(
            facet.field_name.clone(),
            CompareOperation::Equal,
            facet.value.clone(),
        ));
        let level_column =
            schema.level_column_name(&facet.field_name, facet.level_field_name.as_deref());
        pending.push(Pending::new(
            level_column,
            CompareOperation::Equal,
            Value::Text(facet.level.clone()),
        ));
    }

    let result = query.result();
    // The result identifier has to exist even though it isn't filtered on.
    schema.column(&result.field_name)?;
    pending.push(Pending::new(
        schema.level_column_name(&result.field_name, None),
        CompareOperation::Equal,
        Value::Text(result.level.clone()),
    ));

    let years = query.year_range();
    if let Some(start) = years.start() {
        pending.push(Pending::new(
            YEAR_COLUMN.to_string(),
            CompareOperation::GreaterEqual,
            Value::Integer(start),
        ));
    }
    if let Some(end) = years.end() {
        pending.push(Pending::new(
            YEAR_COLUMN.to_string(),
            CompareOperation::LessEqual,
            Value::Integer(end),
        ));
    }

    let resolved = pending
        .into_iter()
        .map(|p| Ok((schema.index_of(&p.column)?, p)))
        .collect::<Result<Vec<(usize, Pending)>, SliceError>>()?;

    // Values are brought to the column's type here so every backend compares the same
    // thing; a value the column type can't hold is the caller's mistake.
    let conditions = resolved
        .into_iter()
        .map(|(column_index, p)| {
            let kind = schema.columns()[column_index].kind();
            let compare_to = p.compare_to.cast_to(kind).ok_or_else(|| {
                invalid_query!(
                    "value {} can't be compared with column '{}' of type {} on dataset '{}'",
                    p.compare_to.sql_literal(),
                    p.column,
                    schema.columns()[column_index]
                        .data_type
                        .as_deref()
                        .unwrap_or("unknown"),
                    schema.dataset
                )
            })?;
            Ok(Condition {
                column: p.column,
                column_index,
                comparison: p.comparison,
                compare_to,
            })
        })
        .collect::<Result<Vec<Condition>, SliceError>>()?;

    let compiled = CompiledQuery {
        dataset: schema.dataset.clone(),
        projection: schema.column_names(),
        conditions,
    };
    debug!(
        dataset = %compiled.dataset,
        predicate = %compiled.where_clause(),
        "compiled slice query"
    );
    Ok(compiled)
}
