//! Schema metadata model

mod builder;
mod definitions;
pub mod filter;
pub mod merger;
mod outcome;
mod schema_metadata;

pub use builder::build_metadata;
pub use definitions::*;
pub use filter::{FilterKind, SchemaFilter, SchemaFilterBuilder};
pub use merger::{DuplicatePolicy, SchemaMerger};
pub use outcome::{codes, ExtractionOutcome, LocatedIssue, Severity, ValidationIssue};
pub use schema_metadata::SchemaMetadata;
