//! The lookup contract every storage backend implements, and the caller-side registry
//! that picks a backend per dataset.
//!
//! A strategy is bound to exactly one dataset when it's constructed. Callers keep one
//! strategy per dataset in a [LookupRegistry] and ask it to run a slice; strategies never
//! choose among themselves.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::query::QueryDescriptor;
use crate::relational::RelationalLookup;
use crate::slice_error::SliceError;
use crate::table::SliceTable;
use crate::tabular::TabularLookup;

/// Context about the slice being served. Strategies treat it as opaque apart from using
/// it in log output; the registry uses `dataset` to pick a strategy.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SliceDefinition {
    pub name: String,
    pub dataset: String,
}

impl SliceDefinition {
    pub fn new(name: &str, dataset: &str) -> Self {
        Self {
            name: name.to_string(),
            dataset: dataset.to_string(),
        }
    }
}

pub trait LookupStrategy {
    /// Return every row matching the descriptor. Rows come back in whatever order the
    /// backend produces them. Fails with [SliceError::UnknownColumn] before touching any
    /// data if the descriptor names a column the dataset doesn't have.
    fn fetch(
        &self,
        slice_def: &SliceDefinition,
        query: &QueryDescriptor,
    ) -> Result<SliceTable, SliceError>;
}

/// The backends a registry can hold.
pub enum Lookup<'conn> {
    Relational(RelationalLookup<'conn>),
    Tabular(TabularLookup),
}

impl Lookup<'_> {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Relational(_) => "relational",
            Self::Tabular(_) => "tabular",
        }
    }
}

impl LookupStrategy for Lookup<'_> {
    fn fetch(
        &self,
        slice_def: &SliceDefinition,
        query: &QueryDescriptor,
    ) -> Result<SliceTable, SliceError> {
        match self {
            Self::Relational(l) => l.fetch(slice_def, query),
            Self::Tabular(l) => l.fetch(slice_def, query),
        }
    }
}

impl<'conn> From<RelationalLookup<'conn>> for Lookup<'conn> {
    fn from(value: RelationalLookup<'conn>) -> Self {
        Self::Relational(value)
    }
}

impl From<TabularLookup> for Lookup<'_> {
    fn from(value: TabularLookup) -> Self {
        Self::Tabular(value)
    }
}

/// Dataset name -> the strategy serving it.
#[derive(Default)]
pub struct LookupRegistry<'conn> {
    lookups: HashMap<String, Lookup<'conn>>,
}

impl<'conn> LookupRegistry<'conn> {
    pub fn new() -> Self {
        Self {
            lookups: HashMap::new(),
        }
    }

    /// Register a strategy for a dataset, replacing any earlier one.
    pub fn register(&mut self, dataset: &str, lookup: impl Into<Lookup<'conn>>) {
        self.lookups.insert(dataset.to_string(), lookup.into());
    }

    pub fn get(&self, dataset: &str) -> Option<&Lookup<'conn>> {
        self.lookups.get(dataset)
    }

    pub fn datasets(&self) -> Vec<&str> {
        let mut names = self.lookups.keys().map(|k| k.as_str()).collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn fetch(
        &self,
        slice_def: &SliceDefinition,
        query: &QueryDescriptor,
    ) -> Result<SliceTable, SliceError> {
        let lookup = self
            .get(&slice_def.dataset)
            .ok_or_else(|| SliceError::UnknownDataset(slice_def.dataset.clone()))?;
        debug!(
            slice = %slice_def.name,
            dataset = %slice_def.dataset,
            backend = lookup.backend_name(),
            "dispatching slice query"
        );
        lookup.fetch(slice_def, query)
    }
}
