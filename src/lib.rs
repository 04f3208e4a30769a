//! # atlas-core: slice queries over pluggable storage
//!
//! ## Running a slice
//!
//! A slice query fixes some facets of a dataset (a location, a product...) to a value at a
//! level, and asks for every value of one remaining facet at a chosen level, optionally
//! within a range of years. The query is described by a
//! [QueryDescriptor](query::QueryDescriptor) and run by a
//! [LookupStrategy](lookup::LookupStrategy) bound to one dataset.
//!
//! Two strategies exist side by side. [RelationalLookup](relational::RelationalLookup)
//! compiles the descriptor into SQL and runs it through a DuckDB connection the caller owns.
//! [TabularLookup](tabular::TabularLookup) evaluates the same compiled conditions over an
//! in-memory [DataFrame](tabular::DataFrame). Over the same data they return the same rows.
//!
//! ```
//! use atlas_core::lookup::{LookupStrategy, SliceDefinition};
//! use atlas_core::query::{FacetFilter, FacetReference, QueryDescriptor, YearRange};
//! use atlas_core::tabular::{DataFrame, TabularLookup};
//!
//! let csv = "location_id,location_level,product_id,product_level,year,value\n\
//!            5,country,650,4digit,2011,10.5\n\
//!            5,country,12,section,2011,3.0\n";
//! let frame = DataFrame::from_csv_reader(csv.as_bytes()).unwrap();
//! let lookup = TabularLookup::new("trade", frame);
//!
//! let query = QueryDescriptor::new(FacetReference::new("product_id", "4digit"))
//!     .with_argument("loc", FacetFilter::new("location_id", 5, "country"))
//!     .with_year_range(YearRange::new(Some(2010), Some(2012)).unwrap());
//! let rows = lookup
//!     .fetch(&SliceDefinition::new("products_by_location", "trade"), &query)
//!     .unwrap();
//! assert_eq!(rows.len(), 1);
//! ```
//!
//! Applications usually describe their datasets in a [config](config::AtlasConfig) file
//! and dispatch through a [LookupRegistry](lookup::LookupRegistry).

pub mod config;
pub mod lookup;
pub mod predicate;
pub mod query;
pub mod query_gen;
pub mod relational;
pub mod schema;
pub mod slice_error;
pub mod table;
pub mod tabular;
pub mod value;
