//! TOML configuration
//!
//! ```toml
//! [intake]
//! extensions = ["sql", "pgsql"]
//! exclude = ["migrations/archive/*"]
//!
//! [filter]
//! exclude_schemas = ["audit"]
//! exclude_system_objects = true
//!
//! [[filter.exclude_names]]
//! kind = "tables"
//! pattern = "^tmp_"
//!
//! [merge]
//! duplicates = "keep_last"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AnalyzerError;
use crate::intake::IntakeOptions;
use crate::model::{DuplicatePolicy, FilterKind, SchemaFilterBuilder};

/// A name pattern bound to one metadata kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePattern {
    pub kind: FilterKind,
    pub pattern: String,
}

/// Serializable form of [`SchemaFilterBuilder`] settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub include_schemas: Vec<String>,
    pub exclude_schemas: Vec<String>,
    pub include_names: Vec<NamePattern>,
    pub exclude_names: Vec<NamePattern>,
    /// Kinds to keep; empty keeps every kind
    pub kinds: Vec<FilterKind>,
    pub exclude_system_objects: bool,
    pub include_comments: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_schemas: Vec::new(),
            exclude_schemas: Vec::new(),
            include_names: Vec::new(),
            exclude_names: Vec::new(),
            kinds: Vec::new(),
            exclude_system_objects: false,
            include_comments: true,
        }
    }
}

impl FilterConfig {
    /// Whether applying this filter would change nothing.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_builder(&self) -> SchemaFilterBuilder {
        let mut builder = SchemaFilterBuilder::new()
            .include_schemas(self.include_schemas.iter().cloned())
            .exclude_schemas(self.exclude_schemas.iter().cloned())
            .include_comments(self.include_comments);
        for name in &self.include_names {
            builder = builder.include_names(name.kind, name.pattern.clone());
        }
        for name in &self.exclude_names {
            builder = builder.exclude_names(name.kind, name.pattern.clone());
        }
        if !self.kinds.is_empty() {
            builder = builder.only_kinds(self.kinds.iter().copied());
        }
        if self.exclude_system_objects {
            builder = builder.exclude_system_objects();
        }
        builder
    }
}

impl From<&FilterConfig> for SchemaFilterBuilder {
    fn from(config: &FilterConfig) -> Self {
        config.to_builder()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub duplicates: DuplicatePolicy,
}

/// Top-level analyzer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub intake: IntakeOptions,
    pub filter: FilterConfig,
    pub merge: MergeConfig,
}

impl AnalyzerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, AnalyzerError> {
        toml::from_str(text).map_err(|source| AnalyzerError::ConfigParseError {
            message: source.message().to_string(),
            source,
        })
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, AnalyzerError> {
        let text = std::fs::read_to_string(path).map_err(|source| AnalyzerError::ConfigReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AnalyzerConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.intake.extensions, vec!["sql"]);
        assert!(config.intake.recursive);
        assert_eq!(config.intake.parallel_threshold, 8);
        assert_eq!(config.merge.duplicates, DuplicatePolicy::KeepAll);
        assert!(config.filter.is_noop());
    }

    #[test]
    fn test_full_config() {
        let config = AnalyzerConfig::from_toml_str(
            r#"
            [intake]
            extensions = ["sql", "pgsql"]
            recursive = false
            exclude = ["archive/*"]

            [filter]
            include_schemas = ["sales"]
            kinds = ["tables", "views"]
            exclude_system_objects = true

            [[filter.exclude_names]]
            kind = "tables"
            pattern = "^tmp_"

            [merge]
            duplicates = "keep_last"
            "#,
        )
        .unwrap();
        assert_eq!(config.intake.extensions, vec!["sql", "pgsql"]);
        assert!(!config.intake.recursive);
        assert_eq!(config.intake.parallel_threshold, 8);
        assert_eq!(config.filter.kinds, vec![FilterKind::Tables, FilterKind::Views]);
        assert_eq!(config.filter.exclude_names[0].pattern, "^tmp_");
        assert!(config.filter.include_comments);
        assert_eq!(config.merge.duplicates, DuplicatePolicy::KeepLast);
        assert!(config.filter.to_builder().build().is_ok());
    }

    #[test]
    fn test_parse_and_read_errors() {
        let err = AnalyzerConfig::from_toml_str("[merge]\nduplicates = \"sometimes\"").unwrap_err();
        assert!(matches!(err, AnalyzerError::ConfigParseError { .. }));

        let err = AnalyzerConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, AnalyzerError::ConfigReadError { .. }));
    }
}
