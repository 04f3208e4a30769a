//! Errors produced while resolving and executing slice queries.
//!
//! Column resolution failures are client-input errors and are raised before any
//! predicate is built or any query runs. Everything else is either a malformed
//! descriptor, a backend that can't serve the request, or a failure inside the
//! storage engine itself.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SliceError {
    /// A descriptor named a column the dataset doesn't have.
    #[error("column '{column}' doesn't exist on dataset '{dataset}'")]
    UnknownColumn { column: String, dataset: String },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// The backend exists but can't do what was asked of it yet.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("no lookup registered for dataset '{0}'")]
    UnknownDataset(String),
    #[error("configuration error: {0}")]
    Config(String),
    /// In-memory data that doesn't fit its own heading.
    #[error("malformed data: {0}")]
    Data(String),
    #[error("DuckDB error: {0}")]
    Backend(#[from] duckdb::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SliceError {
    pub fn unknown_column(column: &str, dataset: &str) -> Self {
        Self::UnknownColumn {
            column: column.to_string(),
            dataset: dataset.to_string(),
        }
    }

    /// True for errors caused by the request rather than by the data store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownColumn { .. } | Self::InvalidQuery(_) | Self::UnknownDataset(_)
        )
    }
}

macro_rules! invalid_query {
    ($($arg:tt)+) => {
        $crate::slice_error::SliceError::InvalidQuery(format!($($arg)+))
    };
}

macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::slice_error::SliceError::Config(format!($($arg)+))
    };
}

pub(crate) use config_error;
pub(crate) use invalid_query;
