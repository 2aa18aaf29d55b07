//! Common test utilities for rust-pgschema tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rust_pgschema::{AnalyzeOptions, AnalyzerConfig, SchemaMetadata};
use tempfile::TempDir;

/// Test context with temporary directory for isolated test execution
pub struct TestContext {
    /// Kept to prevent temp directory cleanup until TestContext is dropped
    _temp_dir: TempDir,
    pub root: PathBuf,
}

impl TestContext {
    /// Create a new test context by copying a fixture to a temp directory
    pub fn with_fixture(fixture_name: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        copy_dir_recursive(&fixture_path(fixture_name), &root).expect("Failed to copy fixture");
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    /// An empty context for tests that write their own files
    pub fn empty() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Analyze the whole context directory with `config`, panicking on failure.
    pub fn analyze_with(&self, config: AnalyzerConfig) -> SchemaMetadata {
        rust_pgschema::analyze(AnalyzeOptions::new(&self.root).with_config(config))
            .unwrap_or_else(|e| panic!("Analysis failed: {:#}", e))
    }

    pub fn analyze(&self) -> SchemaMetadata {
        self.analyze_with(AnalyzerConfig::default())
    }
}

/// Get the path to a test fixture
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Table names in aggregate order
pub fn table_names(metadata: &SchemaMetadata) -> Vec<&str> {
    metadata.tables.iter().map(|t| t.name.as_str()).collect()
}

/// Issue codes in aggregate order
pub fn issue_codes(metadata: &SchemaMetadata) -> Vec<&str> {
    metadata.issues.iter().map(|i| i.issue.code.as_str()).collect()
}
