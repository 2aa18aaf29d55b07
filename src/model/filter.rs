//! Declarative filtering of schema metadata
//!
//! ```no_run
//! use rust_pgschema::model::{FilterKind, SchemaFilterBuilder};
//!
//! let filter = SchemaFilterBuilder::new()
//!     .include_schema("sales")
//!     .exclude_names(FilterKind::Tables, "^tmp_")
//!     .exclude_system_objects()
//!     .build()?;
//! # Ok::<(), rust_pgschema::AnalyzerError>(())
//! ```

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::definitions::SchemaObject;
use super::schema_metadata::SchemaMetadata;
use crate::error::AnalyzerError;

/// Schema assumed for unqualified objects
pub const DEFAULT_SCHEMA: &str = "public";

/// Schemas owned by PostgreSQL itself
const SYSTEM_SCHEMAS: &[&str] = &["pg_catalog", "information_schema", "pg_toast"];

/// Per-session temporary schemas (`pg_temp_3`, `pg_toast_temp_3`)
const SYSTEM_SCHEMA_PREFIXES: &[&str] = &["pg_temp", "pg_toast_temp"];

/// Object names reserved for system objects
const SYSTEM_NAME_PREFIXES: &[&str] = &["pg_", "sql_"];

/// The metadata lists a filter can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Tables,
    Columns,
    Views,
    EnumTypes,
    CompositeTypes,
    DomainTypes,
    Functions,
    Indexes,
    Triggers,
    Constraints,
    Partitions,
    Comments,
}

impl FilterKind {
    pub const ALL: [FilterKind; 12] = [
        FilterKind::Tables,
        FilterKind::Columns,
        FilterKind::Views,
        FilterKind::EnumTypes,
        FilterKind::CompositeTypes,
        FilterKind::DomainTypes,
        FilterKind::Functions,
        FilterKind::Indexes,
        FilterKind::Triggers,
        FilterKind::Constraints,
        FilterKind::Partitions,
        FilterKind::Comments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Tables => "tables",
            FilterKind::Columns => "columns",
            FilterKind::Views => "views",
            FilterKind::EnumTypes => "enum_types",
            FilterKind::CompositeTypes => "composite_types",
            FilterKind::DomainTypes => "domain_types",
            FilterKind::Functions => "functions",
            FilterKind::Indexes => "indexes",
            FilterKind::Triggers => "triggers",
            FilterKind::Constraints => "constraints",
            FilterKind::Partitions => "partitions",
            FilterKind::Comments => "comments",
        }
    }
}

/// Whether a schema or object name belongs to PostgreSQL itself.
pub fn is_system_object(schema: &str, name: &str) -> bool {
    let schema = schema.to_lowercase();
    let name = name.to_lowercase();
    SYSTEM_SCHEMAS.contains(&schema.as_str())
        || SYSTEM_SCHEMA_PREFIXES.iter().any(|p| schema.starts_with(p))
        || SYSTEM_NAME_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Accumulates filter settings; [`build`](Self::build) validates them.
#[derive(Debug, Clone)]
pub struct SchemaFilterBuilder {
    include_schemas: Vec<String>,
    exclude_schemas: Vec<String>,
    include_names: Vec<(FilterKind, String)>,
    exclude_names: Vec<(FilterKind, String)>,
    kinds: Option<HashSet<FilterKind>>,
    exclude_system_objects: bool,
    include_comments: bool,
}

impl Default for SchemaFilterBuilder {
    fn default() -> Self {
        Self {
            include_schemas: Vec::new(),
            exclude_schemas: Vec::new(),
            include_names: Vec::new(),
            exclude_names: Vec::new(),
            kinds: None,
            exclude_system_objects: false,
            include_comments: true,
        }
    }
}

impl SchemaFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only objects in the listed schemas. Repeatable.
    pub fn include_schema(mut self, schema: impl Into<String>) -> Self {
        self.include_schemas.push(schema.into());
        self
    }

    pub fn include_schemas<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_schemas.extend(schemas.into_iter().map(Into::into));
        self
    }

    pub fn exclude_schema(mut self, schema: impl Into<String>) -> Self {
        self.exclude_schemas.push(schema.into());
        self
    }

    pub fn exclude_schemas<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_schemas.extend(schemas.into_iter().map(Into::into));
        self
    }

    /// Keep only `kind` objects whose name matches one of the include patterns.
    pub fn include_names(mut self, kind: FilterKind, pattern: impl Into<String>) -> Self {
        self.include_names.push((kind, pattern.into()));
        self
    }

    pub fn exclude_names(mut self, kind: FilterKind, pattern: impl Into<String>) -> Self {
        self.exclude_names.push((kind, pattern.into()));
        self
    }

    /// Keep only the listed kinds; everything else is emptied.
    pub fn only_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = FilterKind>,
    {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn only_tables(self) -> Self {
        self.only_kinds([FilterKind::Tables])
    }

    pub fn only_tables_and_views(self) -> Self {
        self.only_kinds([FilterKind::Tables, FilterKind::Views])
    }

    /// Drop PostgreSQL's own schemas and `pg_`/`sql_` prefixed objects.
    pub fn exclude_system_objects(mut self) -> Self {
        self.exclude_system_objects = true;
        self
    }

    pub fn include_comments(mut self, include: bool) -> Self {
        self.include_comments = include;
        self
    }

    /// Compile every pattern, failing on the first invalid one.
    pub fn build(self) -> Result<SchemaFilter, AnalyzerError> {
        Ok(SchemaFilter {
            include_schemas: lowercase_all(self.include_schemas),
            exclude_schemas: lowercase_all(self.exclude_schemas),
            include_names: compile_patterns(self.include_names)?,
            exclude_names: compile_patterns(self.exclude_names)?,
            kinds: self.kinds,
            exclude_system_objects: self.exclude_system_objects,
            include_comments: self.include_comments,
        })
    }
}

fn lowercase_all(values: Vec<String>) -> Vec<String> {
    values.into_iter().map(|v| v.to_lowercase()).collect()
}

fn compile_patterns(
    patterns: Vec<(FilterKind, String)>,
) -> Result<HashMap<FilterKind, Vec<Regex>>, AnalyzerError> {
    let mut compiled: HashMap<FilterKind, Vec<Regex>> = HashMap::new();
    for (kind, pattern) in patterns {
        let regex = Regex::new(&pattern).map_err(|source| AnalyzerError::InvalidFilterPattern {
            kind: kind.as_str().to_string(),
            pattern: pattern.clone(),
            source,
        })?;
        compiled.entry(kind).or_default().push(regex);
    }
    Ok(compiled)
}

/// A validated filter. Applying it never mutates its input.
#[derive(Debug, Clone)]
pub struct SchemaFilter {
    include_schemas: Vec<String>,
    exclude_schemas: Vec<String>,
    include_names: HashMap<FilterKind, Vec<Regex>>,
    exclude_names: HashMap<FilterKind, Vec<Regex>>,
    kinds: Option<HashSet<FilterKind>>,
    exclude_system_objects: bool,
    include_comments: bool,
}

impl SchemaFilter {
    /// A copy of `metadata` holding only the objects this filter keeps.
    pub fn apply(&self, metadata: &SchemaMetadata) -> SchemaMetadata {
        SchemaMetadata {
            tables: self.keep_all(FilterKind::Tables, &metadata.tables),
            columns: self.keep_all(FilterKind::Columns, &metadata.columns),
            views: self.keep_all(FilterKind::Views, &metadata.views),
            enum_types: self.keep_all(FilterKind::EnumTypes, &metadata.enum_types),
            composite_types: self.keep_all(FilterKind::CompositeTypes, &metadata.composite_types),
            domain_types: self.keep_all(FilterKind::DomainTypes, &metadata.domain_types),
            functions: self.keep_all(FilterKind::Functions, &metadata.functions),
            indexes: self.keep_all(FilterKind::Indexes, &metadata.indexes),
            triggers: self.keep_all(FilterKind::Triggers, &metadata.triggers),
            constraints: self.keep_all(FilterKind::Constraints, &metadata.constraints),
            partitions: self.keep_all(FilterKind::Partitions, &metadata.partitions),
            comments: if self.include_comments {
                self.keep_all(FilterKind::Comments, &metadata.comments)
            } else {
                Vec::new()
            },
            source_paths: metadata.source_paths.clone(),
            analyzed_at: metadata.analyzed_at,
            issues: metadata.issues.clone(),
        }
    }

    fn keep_all<T: SchemaObject + Clone>(&self, kind: FilterKind, items: &[T]) -> Vec<T> {
        if self.kinds.as_ref().is_some_and(|kinds| !kinds.contains(&kind)) {
            return Vec::new();
        }
        items
            .iter()
            .filter(|item| self.keeps(kind, *item))
            .cloned()
            .collect()
    }

    /// Whether one object passes every configured rule.
    pub fn keeps<T: SchemaObject>(&self, kind: FilterKind, object: &T) -> bool {
        let schema = object.schema().unwrap_or(DEFAULT_SCHEMA).to_lowercase();
        let name = object.name();

        if !self.include_schemas.is_empty() && !self.include_schemas.contains(&schema) {
            return false;
        }
        if self.exclude_schemas.contains(&schema) {
            return false;
        }
        if self.exclude_system_objects && is_system_object(&schema, name) {
            return false;
        }
        if let Some(patterns) = self.include_names.get(&kind) {
            if !patterns.iter().any(|p| p.is_match(name)) {
                return false;
            }
        }
        if let Some(patterns) = self.exclude_names.get(&kind) {
            if patterns.iter().any(|p| p.is_match(name)) {
                return false;
            }
        }
        true
    }
}
