//! The shape of a slice query.
//!
//! A [QueryDescriptor] fixes every facet named in its `arguments` to a value at a level,
//! asks for the values of one more facet (the `result`) at a given level, and optionally
//! bounds the years. It carries no behavior beyond construction and validation; the
//! lookup strategies decide how to run it.
//!
//! Descriptors usually arrive as JSON from an API layer:
//!
//! ```
//! use atlas_core::query::QueryDescriptor;
//!
//! let json = r#"{
//!     "arguments": {"loc": {"field_name": "location_id", "value": 5, "level": "country"}},
//!     "result": {"field_name": "product_id", "level": "4digit"},
//!     "year_range": {"start": 2010, "end": 2012}
//! }"#;
//! let query = QueryDescriptor::from_json(json).unwrap();
//! assert_eq!(query.arguments().len(), 1);
//! ```
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::slice_error::{invalid_query, SliceError};
use crate::value::Value;

/// Number of trailing characters replaced when deriving a level column, as in `_id`.
const IDENTIFIER_SUFFIX_LEN: usize = 3;
const LEVEL_SUFFIX: &str = "_level";

/// Derive the level column paired with an identifier column: `location_id` becomes
/// `location_level`. This is purely textual; names without a 3 character suffix derive
/// to a column that won't resolve.
pub fn derived_level_column(field_name: &str) -> String {
    let keep = field_name
        .char_indices()
        .rev()
        .nth(IDENTIFIER_SUFFIX_LEN - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    format!("{}{}", &field_name[..keep], LEVEL_SUFFIX)
}

/// One entry of a descriptor's `arguments`: fix `field_name` to `value` at `level`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FacetFilter {
    pub field_name: String,
    pub value: Value,
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_field_name: Option<String>,
}

impl FacetFilter {
    pub fn new(field_name: &str, value: impl Into<Value>, level: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            value: value.into(),
            level: level.to_string(),
            level_field_name: None,
        }
    }

    pub fn with_level_field_name(mut self, level_field_name: &str) -> Self {
        self.level_field_name = Some(level_field_name.to_string());
        self
    }

    /// The explicit level column if one was given, otherwise the derived one.
    pub fn level_column_name(&self) -> String {
        match self.level_field_name {
            Some(ref name) => name.clone(),
            None => derived_level_column(&self.field_name),
        }
    }
}

/// The facet being sliced. Only its level is constrained.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FacetReference {
    pub field_name: String,
    pub level: String,
}

impl FacetReference {
    pub fn new(field_name: &str, level: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            level: level.to_string(),
        }
    }

    pub fn level_column_name(&self) -> String {
        derived_level_column(&self.field_name)
    }
}

/// Inclusive bounds on the `year` column. Either side may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "YearRangeRaw", into = "YearRangeRaw")]
pub struct YearRange {
    start: Option<i64>,
    end: Option<i64>,
}

impl YearRange {
    pub fn new(start: Option<i64>, end: Option<i64>) -> Result<Self, SliceError> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(invalid_query!(
                    "year_range: a start of {s} and end of {e} do not satisfy start <= end"
                ));
            }
        }
        Ok(Self { start, end })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn start(&self) -> Option<i64> {
        self.start
    }

    pub fn end(&self) -> Option<i64> {
        self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, year: i64) -> bool {
        self.start.map_or(true, |s| year >= s) && self.end.map_or(true, |e| year <= e)
    }
}

#[derive(Deserialize, Serialize)]
struct YearRangeRaw {
    #[serde(default)]
    start: Option<i64>,
    #[serde(default)]
    end: Option<i64>,
}

impl TryFrom<YearRangeRaw> for YearRange {
    type Error = SliceError;

    fn try_from(value: YearRangeRaw) -> Result<Self, Self::Error> {
        Self::new(value.start, value.end)
    }
}

impl From<YearRange> for YearRangeRaw {
    fn from(value: YearRange) -> Self {
        Self {
            start: value.start,
            end: value.end,
        }
    }
}

/// Keyed facet filters in insertion order. JSON objects keep their document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments(Vec<(String, FacetFilter)>);

impl Arguments {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FacetFilter> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FacetFilter)> {
        self.0.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn filters(&self) -> impl Iterator<Item = &FacetFilter> {
        self.0.iter().map(|(_, f)| f)
    }

    // A repeated key replaces the earlier filter but keeps its position.
    fn insert(&mut self, key: String, filter: FacetFilter) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = filter,
            None => self.0.push((key, filter)),
        }
    }
}

impl Serialize for Arguments {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, filter) in &self.0 {
            map.serialize_entry(key, filter)?;
        }
        map.end()
    }
}

struct ArgumentsVisitor;

impl<'de> Visitor<'de> for ArgumentsVisitor {
    type Value = Arguments;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of keys to facet filters")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut arguments = Arguments::default();
        while let Some((key, filter)) = access.next_entry::<String, FacetFilter>()? {
            arguments.insert(key, filter);
        }
        Ok(arguments)
    }
}

impl<'de> Deserialize<'de> for Arguments {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ArgumentsVisitor)
    }
}

/// A slice query. Built once per request and never modified by the code that runs it.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct QueryDescriptor {
    #[serde(default)]
    arguments: Arguments,
    result: FacetReference,
    #[serde(default, deserialize_with = "year_range_from_nullable_field")]
    year_range: YearRange,
}

/// A `"year_range": null` means unbounded, the same as leaving the field out. serde
/// treats missing and null fields differently so `#[serde(default)]` alone isn't enough.
fn year_range_from_nullable_field<'de, D>(deserializer: D) -> Result<YearRange, D::Error>
where
    D: Deserializer<'de>,
{
    let maybe_range = Option::deserialize(deserializer)?;
    Ok(maybe_range.unwrap_or_default())
}

impl QueryDescriptor {
    pub fn new(result: FacetReference) -> Self {
        Self {
            arguments: Arguments::default(),
            result,
            year_range: YearRange::unbounded(),
        }
    }

    pub fn with_argument(mut self, key: &str, filter: FacetFilter) -> Self {
        self.arguments.insert(key.to_string(), filter);
        self
    }

    pub fn with_year_range(mut self, year_range: YearRange) -> Self {
        self.year_range = year_range;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, SliceError> {
        serde_json::from_str(json)
            .map_err(|e| invalid_query!("cannot parse query descriptor: {e}"))
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn result(&self) -> &FacetReference {
        &self.result
    }

    pub fn year_range(&self) -> &YearRange {
        &self.year_range
    }
}
