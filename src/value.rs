//! Scalar values shared by descriptors, predicates and result rows.
//!
//! Every backend converts its native cell type into [Value] so that rows coming out of
//! different storage engines can be compared with each other.
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::ColumnKind;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Compare two values the way a SQL engine would: integers and floats compare
    /// numerically, NULL compares to nothing and mismatched kinds don't compare.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Render as a literal suitable for splicing into generated SQL.
    pub fn sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Boolean(true) => "TRUE".to_string(),
            Self::Boolean(false) => "FALSE".to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => format!("{f:?}"),
            Self::Text(s) => sql_builder::quote(s),
        }
    }

    /// Parse a raw text field (from a CSV file for instance) into the narrowest value.
    /// Surrounding whitespace is dropped and empty fields are NULL. Spellings like `inf`
    /// or `NaN` stay text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Null
        } else if let Ok(i) = trimmed.parse::<i64>() {
            Self::Integer(i)
        } else if let Some(f) = parse_finite(trimmed) {
            Self::Float(f)
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    /// Convert to the type of a column of the given kind, the way DuckDB casts a literal
    /// compared against that column. `None` when the value can't be converted. NULL and
    /// columns of unknown kind take the value unchanged.
    pub fn cast_to(&self, kind: ColumnKind) -> Option<Value> {
        let cast = match (kind, self) {
            (_, Self::Null) | (ColumnKind::Unknown, _) => self.clone(),
            (ColumnKind::Integer, Self::Integer(_) | Self::Float(_)) => self.clone(),
            (ColumnKind::Integer, Self::Text(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Self::Integer(i),
                Err(_) => Self::Float(parse_finite(s.trim())?),
            },
            (ColumnKind::Float, Self::Integer(i)) => Self::Float(*i as f64),
            (ColumnKind::Float, Self::Float(_)) => self.clone(),
            (ColumnKind::Float, Self::Text(s)) => Self::Float(parse_finite(s.trim())?),
            (ColumnKind::Text, Self::Text(_)) => self.clone(),
            (ColumnKind::Text, Self::Integer(_) | Self::Float(_) | Self::Boolean(_)) => {
                Self::Text(self.to_string())
            }
            (ColumnKind::Boolean, Self::Boolean(_)) => self.clone(),
            (ColumnKind::Boolean, Self::Text(s)) => match s.trim().to_ascii_lowercase().as_str()
            {
                "true" | "t" => Self::Boolean(true),
                "false" | "f" => Self::Boolean(false),
                _ => return None,
            },
            (ColumnKind::Integer | ColumnKind::Float, Self::Boolean(_))
            | (ColumnKind::Boolean, Self::Integer(_) | Self::Float(_)) => return None,
        };
        Some(cast)
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
