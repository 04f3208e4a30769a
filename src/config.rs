//! Dataset configuration: which datasets exist, which backend serves each, and where its
//! data lives.
//!
//! Configuration is a TOML file (or JSON, chosen by a `.json` extension):
//!
//! ```toml
//! database = "atlas.duckdb"   # optional; an in-memory database when absent
//!
//! [[datasets]]
//! name = "trade"
//! backend = "duckdb"
//! source = "parquet"
//! path = "data/trade.parquet"
//!
//! [[datasets]]
//! name = "population"
//! backend = "tabular"
//! source = "csv"
//! path = "data/population.csv"
//! level_columns = { geo_id = "geo_kind" }
//! ```
//!
//! Relative paths are taken relative to the directory holding the config file.
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use duckdb::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::lookup::{Lookup, LookupRegistry};
use crate::query_gen::DataSource;
use crate::relational::RelationalLookup;
use crate::slice_error::{config_error, SliceError};
use crate::tabular::TabularLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Duckdb,
    Tabular,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Table,
    Parquet,
    Csv,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetConfig {
    pub name: String,
    pub backend: Backend,
    #[serde(default)]
    pub source: SourceKind,
    /// Table name for `source = "table"`; defaults to the dataset name.
    pub table: Option<String>,
    /// Data file for parquet and csv sources.
    pub path: Option<PathBuf>,
    /// Identifier column -> level column, for datasets that don't follow the
    /// `_id` / `_level` naming convention.
    #[serde(default)]
    pub level_columns: BTreeMap<String, String>,
}

impl DatasetConfig {
    fn data_path(&self, base_dir: Option<&Path>) -> Result<PathBuf, SliceError> {
        let Some(ref path) = self.path else {
            return Err(config_error!(
                "dataset '{}' has source {:?} but no path",
                self.name,
                self.source
            ));
        };
        Ok(match base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.clone(),
        })
    }

    pub fn data_source(&self, base_dir: Option<&Path>) -> Result<DataSource, SliceError> {
        match self.source {
            SourceKind::Table => DataSource::new(self.table.as_deref().unwrap_or(&self.name), None),
            SourceKind::Parquet | SourceKind::Csv => {
                let path = self.data_path(base_dir)?;
                let source = DataSource::new(&self.name, Some(path.as_path()))?;
                let matches_kind = matches!(
                    (&source, self.source),
                    (DataSource::Parquet { .. }, SourceKind::Parquet)
                        | (DataSource::Csv { .. }, SourceKind::Csv)
                );
                if matches_kind {
                    Ok(source)
                } else {
                    Err(config_error!(
                        "dataset '{}': path {} doesn't look like a {:?} file",
                        self.name,
                        path.display(),
                        self.source
                    ))
                }
            }
        }
    }

    pub fn build_lookup<'conn>(
        &self,
        conn: &'conn Connection,
        base_dir: Option<&Path>,
    ) -> Result<Lookup<'conn>, SliceError> {
        let lookup = match self.backend {
            Backend::Duckdb => {
                let source = self.data_source(base_dir)?;
                let mut lookup = RelationalLookup::new(conn, source)?;
                for (identifier, level) in &self.level_columns {
                    lookup = lookup.with_level_column(identifier, level);
                }
                Lookup::from(lookup)
            }
            Backend::Tabular => {
                if self.source != SourceKind::Csv {
                    return Err(SliceError::NotImplemented(format!(
                        "tabular datasets can only be loaded from csv, '{}' has source {:?}",
                        self.name, self.source
                    )));
                }
                let path = self.data_path(base_dir)?;
                let mut lookup = TabularLookup::from_csv_path(&self.name, &path)?;
                for (identifier, level) in &self.level_columns {
                    lookup = lookup.with_level_column(identifier, level);
                }
                Lookup::from(lookup)
            }
        };
        Ok(lookup)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AtlasConfig {
    /// DuckDB database file; in memory when absent.
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl AtlasConfig {
    /// Load configuration from a file path (TOML or JSON based on extension)
    pub fn load_from_file(path: &Path) -> Result<Self, SliceError> {
        let content = std::fs::read_to_string(path)?;

        let mut config: Self = if path.extension().map_or(false, |ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| config_error!("invalid JSON config {}: {}", path.display(), e))?
        } else {
            Self::from_toml_str(&content)?
        };
        config.base_dir = path.parent().map(Path::to_path_buf);
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SliceError> {
        let config: Self =
            toml::from_str(content).map_err(|e| config_error!("invalid TOML config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SliceError> {
        let mut seen = HashSet::new();
        for dataset in &self.datasets {
            if !seen.insert(dataset.name.as_str()) {
                return Err(config_error!(
                    "dataset '{}' is configured more than once",
                    dataset.name
                ));
            }
        }
        Ok(())
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn open_connection(&self) -> Result<Connection, SliceError> {
        let conn = match self.database {
            Some(ref db) => {
                let path = match self.base_dir {
                    Some(ref dir) if db.is_relative() => dir.join(db),
                    _ => db.clone(),
                };
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };
        Ok(conn)
    }

    /// One lookup per configured dataset, all sharing `conn`.
    pub fn build_registry<'conn>(
        &self,
        conn: &'conn Connection,
    ) -> Result<LookupRegistry<'conn>, SliceError> {
        let mut registry = LookupRegistry::new();
        for dataset in &self.datasets {
            let lookup = dataset.build_lookup(conn, self.base_dir.as_deref())?;
            info!(
                dataset = %dataset.name,
                backend = lookup.backend_name(),
                "registered dataset"
            );
            registry.register(&dataset.name, lookup);
        }
        Ok(registry)
    }
}
