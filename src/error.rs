//! Error types for rust-pgschema
//!
//! These cover caller misuse and missing resources only. Problems inside the
//! SQL text never surface here; they become
//! [`ValidationIssue`](crate::model::ValidationIssue)s on extraction outcomes.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading sources or configuring analysis
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("SQL file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("SQL directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to read SQL file: {path}")]
    SourceReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {kind} filter pattern '{pattern}'")]
    InvalidFilterPattern {
        kind: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid exclude glob '{pattern}'")]
    InvalidGlobPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Failed to read configuration file: {path}")]
    ConfigReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {message}")]
    ConfigParseError {
        message: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Duplicate {kind} '{key}' while merging schema metadata")]
    DuplicateObject { kind: String, key: String },

    #[error("Failed to serialize schema metadata")]
    Serialization(#[from] serde_json::Error),
}
