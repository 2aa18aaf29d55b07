//! Reading SQL sources from disk
//!
//! Files are decoded independently and analyzed in parallel once there are
//! enough of them to outweigh rayon's overhead.

use std::path::{Path, PathBuf};

use encoding_rs::WINDOWS_1252;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::AnalyzerError;
use crate::model::{SchemaMerger, SchemaMetadata};

/// Below this many files, sequential processing is faster.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 8;

/// One SQL document and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSource {
    pub path: Option<PathBuf>,
    pub text: String,
}

impl SqlSource {
    /// An in-memory source without a path.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            path: None,
            text: text.into(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Read a file, trying UTF-8 first, then Windows-1252 as fallback.
    pub fn from_file(path: &Path) -> Result<Self, AnalyzerError> {
        if !path.is_file() {
            return Err(AnalyzerError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path).map_err(|source| AnalyzerError::SourceReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let text = decode(&bytes).map_err(|source| AnalyzerError::SourceReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            text,
        })
    }
}

fn decode(bytes: &[u8]) -> std::io::Result<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            // Common for scripts saved by Windows editors
            let (decoded, _, had_errors) = WINDOWS_1252.decode(bytes);
            if had_errors {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "File contains invalid characters",
                ))
            } else {
                Ok(decoded.into_owned())
            }
        }
    }
}

/// How files are discovered and processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeOptions {
    /// File extensions to read, without the dot (case-insensitive)
    pub extensions: Vec<String>,
    pub recursive: bool,
    /// Glob patterns of paths to skip
    pub exclude: Vec<String>,
    pub parallel_threshold: usize,
}

impl Default for IntakeOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["sql".to_string()],
            recursive: true,
            exclude: Vec::new(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

/// List SQL files under `dir`, sorted.
pub fn discover_sql_files(dir: &Path, options: &IntakeOptions) -> Result<Vec<PathBuf>, AnalyzerError> {
    if !dir.is_dir() {
        return Err(AnalyzerError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let excludes = options
        .exclude
        .iter()
        .map(|pattern| {
            glob::Pattern::new(pattern).map_err(|source| AnalyzerError::InvalidGlobPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, &options.extensions))
        .filter(|path| {
            let relative = path.strip_prefix(dir).unwrap_or(path.as_path());
            !excludes
                .iter()
                .any(|p| p.matches_path(path) || p.matches_path(relative))
        })
        .collect();
    files.sort();

    for file in &files {
        debug!(path = %file.display(), "Discovered SQL file");
    }
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Analyze each source on its own, then merge in input order.
pub fn analyze_sources(
    sources: &[SqlSource],
    parallel_threshold: usize,
) -> Result<SchemaMetadata, AnalyzerError> {
    let results: Vec<SchemaMetadata> = if sources.len() >= parallel_threshold {
        sources.par_iter().map(analyze_logged).collect()
    } else {
        sources.iter().map(analyze_logged).collect()
    };
    SchemaMerger::new().merge(&results)
}

fn analyze_logged(source: &SqlSource) -> SchemaMetadata {
    let metadata = crate::analyze_source(source);
    if let Some(path) = &source.path {
        info!(
            path = %path.display(),
            objects = metadata.object_count(),
            issues = metadata.issues.len(),
            "Analyzed SQL file"
        );
    }
    metadata
}

/// Read and analyze a list of files.
pub fn analyze_files(paths: &[PathBuf], options: &IntakeOptions) -> Result<SchemaMetadata, AnalyzerError> {
    let sources: Vec<SqlSource> = if paths.len() >= options.parallel_threshold {
        paths
            .par_iter()
            .map(|path| SqlSource::from_file(path))
            .collect::<Result<_, _>>()?
    } else {
        paths
            .iter()
            .map(|path| SqlSource::from_file(path))
            .collect::<Result<_, _>>()?
    };
    analyze_sources(&sources, options.parallel_threshold)
}

/// Discover and analyze every SQL file under `dir`.
pub fn analyze_directory(dir: &Path, options: &IntakeOptions) -> Result<SchemaMetadata, AnalyzerError> {
    let files = discover_sql_files(dir, options)?;
    info!(dir = %dir.display(), files = files.len(), "Analyzing SQL directory");
    analyze_files(&files, options)
}
