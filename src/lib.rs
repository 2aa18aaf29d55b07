//! rust-pgschema: Fast analysis of PostgreSQL DDL scripts
//!
//! This library turns DDL scripts into structured schema metadata: tables,
//! columns, views, types, indexes, constraints, triggers, functions,
//! partitions and comments, each with its source location and any issues
//! found while reading it.

pub mod config;
pub mod error;
pub mod intake;
pub mod model;
pub mod parser;
mod util;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

pub use config::AnalyzerConfig;
pub use error::AnalyzerError;
pub use intake::{IntakeOptions, SqlSource};
pub use model::{SchemaFilterBuilder, SchemaMerger, SchemaMetadata};

/// Options for analyzing a file or directory
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// A `.sql` file or a directory of them
    pub input_path: PathBuf,
    pub config: AnalyzerConfig,
}

impl AnalyzeOptions {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            config: AnalyzerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }
}

/// Analyze a SQL script held in memory.
pub fn analyze_sql(sql: &str) -> SchemaMetadata {
    model::build_metadata(&parser::extract_blocks(sql, None))
}

/// Analyze one source, tagging every definition with its path.
pub fn analyze_source(source: &SqlSource) -> SchemaMetadata {
    model::build_metadata(&parser::extract_blocks(&source.text, source.path.as_deref()))
}

/// Analyze a file or directory, then apply the configured filter and duplicate policy.
pub fn analyze(options: AnalyzeOptions) -> Result<SchemaMetadata> {
    let config = &options.config;
    let path = &options.input_path;

    // Step 1: Read and analyze the sources
    let metadata = if path.is_dir() {
        intake::analyze_directory(path, &config.intake)?
    } else {
        let source = SqlSource::from_file(path)?;
        intake::analyze_sources(&[source], config.intake.parallel_threshold)?
    };

    // Step 2: Resolve duplicates
    let metadata = if config.merge.duplicates == model::DuplicatePolicy::KeepAll {
        metadata
    } else {
        SchemaMerger::new()
            .with_policy(config.merge.duplicates)
            .merge(std::slice::from_ref(&metadata))
            .with_context(|| format!("Failed to merge schema metadata from {}", path.display()))?
    };

    // Step 3: Filter
    let metadata = if config.filter.is_noop() {
        metadata
    } else {
        config.filter.to_builder().build()?.apply(&metadata)
    };

    info!(
        path = %path.display(),
        objects = metadata.object_count(),
        issues = metadata.issues.len(),
        "Analysis complete"
    );
    Ok(metadata)
}
