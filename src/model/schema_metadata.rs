//! The schema metadata aggregate

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::definitions::*;
use super::outcome::{LocatedIssue, Severity};
use crate::error::AnalyzerError;

/// Everything extracted from one or more SQL sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub tables: Vec<TableDefinition>,
    /// Columns added with `ALTER TABLE ... ADD COLUMN`
    pub columns: Vec<ColumnDefinition>,
    pub views: Vec<ViewDefinition>,
    pub enum_types: Vec<EnumTypeDefinition>,
    pub composite_types: Vec<CompositeTypeDefinition>,
    pub domain_types: Vec<DomainTypeDefinition>,
    pub functions: Vec<FunctionDefinition>,
    pub indexes: Vec<IndexDefinition>,
    pub triggers: Vec<TriggerDefinition>,
    /// Constraints added with `ALTER TABLE ... ADD CONSTRAINT`
    pub constraints: Vec<ConstraintDefinition>,
    pub partitions: Vec<PartitionDefinition>,
    pub comments: Vec<CommentDefinition>,
    /// Distinct source files, in first-seen order
    pub source_paths: Vec<PathBuf>,
    pub analyzed_at: DateTime<Utc>,
    pub issues: Vec<LocatedIssue>,
}

impl SchemaMetadata {
    pub fn new() -> Self {
        Self {
            analyzed_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Number of extracted definitions across all kinds
    pub fn object_count(&self) -> usize {
        self.tables.len()
            + self.columns.len()
            + self.views.len()
            + self.enum_types.len()
            + self.composite_types.len()
            + self.domain_types.len()
            + self.functions.len()
            + self.indexes.len()
            + self.triggers.len()
            + self.constraints.len()
            + self.partitions.len()
            + self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_count() == 0
    }

    /// Find a table by name, optionally restricted to a schema (case-insensitive).
    pub fn table(&self, schema: Option<&str>, name: &str) -> Option<&TableDefinition> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name) && schema_matches(t.schema.as_deref(), schema))
    }

    pub fn view(&self, schema: Option<&str>, name: &str) -> Option<&ViewDefinition> {
        self.views
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name) && schema_matches(v.schema.as_deref(), schema))
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn errors(&self) -> impl Iterator<Item = &LocatedIssue> {
        self.issues_with(Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LocatedIssue> {
        self.issues_with(Severity::Warning)
    }

    fn issues_with(&self, severity: Severity) -> impl Iterator<Item = &LocatedIssue> {
        self.issues
            .iter()
            .filter(move |issue| issue.issue.severity == severity)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Record a source path unless it is already listed.
    pub fn add_source_path(&mut self, path: &Path) {
        if !self.source_paths.iter().any(|p| p.as_path() == path) {
            self.source_paths.push(path.to_path_buf());
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String, AnalyzerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Whether an object's schema satisfies an optional requested schema.
///
/// A missing requested schema matches anything; a missing object schema
/// counts as the default schema.
pub(crate) fn schema_matches(object_schema: Option<&str>, requested: Option<&str>) -> bool {
    match requested {
        None => true,
        Some(requested) => object_schema
            .unwrap_or(super::filter::DEFAULT_SCHEMA)
            .eq_ignore_ascii_case(requested),
    }
}
