//! Extraction results and diagnostics

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::parser::ObjectKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A problem or remark about one statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Stable machine-readable code, see [`codes`]
    pub code: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn new(code: &str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            severity,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, message, Severity::Error)
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, message, Severity::Warning)
    }

    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, message, Severity::Info)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.code, self.message)
    }
}

/// The result of running one extractor over one statement.
///
/// Success carries a definition and possibly warnings; failure carries no
/// definition and at least one error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome<T> {
    pub definition: Option<T>,
    pub issues: Vec<ValidationIssue>,
}

impl<T> ExtractionOutcome<T> {
    pub fn success(definition: T, issues: Vec<ValidationIssue>) -> Self {
        Self {
            definition: Some(definition),
            issues,
        }
    }

    pub fn failure(issue: ValidationIssue) -> Self {
        Self {
            definition: None,
            issues: vec![issue],
        }
    }

    /// Failure carrying every issue collected so far.
    pub fn failure_with(issues: Vec<ValidationIssue>) -> Self {
        Self {
            definition: None,
            issues,
        }
    }

    /// A definition is present and no issue is an error.
    pub fn is_success(&self) -> bool {
        self.definition.is_some() && !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(ValidationIssue::is_error)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }

    pub fn issue(&self, code: &str) -> Option<&ValidationIssue> {
        self.issues.iter().find(|issue| issue.code == code)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ExtractionOutcome<U> {
        ExtractionOutcome {
            definition: self.definition.map(f),
            issues: self.issues,
        }
    }
}

/// An issue tied to the statement it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedIssue {
    #[serde(flatten)]
    pub issue: ValidationIssue,
    pub object_kind: ObjectKind,
    pub start_line: usize,
    pub end_line: usize,
    pub source_path: Option<PathBuf>,
}

impl fmt::Display for LocatedIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_path {
            Some(path) => write!(f, "{}:{}: {}", path.display(), self.start_line, self.issue),
            None => write!(f, "line {}: {}", self.start_line, self.issue),
        }
    }
}

/// Stable issue codes
pub mod codes {
    // Framework
    pub const EMPTY_INPUT: &str = "EMPTY_INPUT";
    pub const NO_MATCHING_STATEMENT: &str = "NO_MATCHING_STATEMENT";
    pub const TOKENIZE_FAILED: &str = "TOKENIZE_FAILED";
    pub const IDENTIFIER_TOO_LONG: &str = "IDENTIFIER_TOO_LONG";

    // Tables and columns
    pub const TABLE_MISSING_NAME: &str = "TABLE_MISSING_NAME";
    pub const TABLE_MISSING_COLUMN_LIST: &str = "TABLE_MISSING_COLUMN_LIST";
    pub const TABLE_INVALID_COLUMN: &str = "TABLE_INVALID_COLUMN";
    pub const TABLE_NO_COLUMNS: &str = "TABLE_NO_COLUMNS";
    pub const TABLE_DUPLICATE_COLUMN: &str = "TABLE_DUPLICATE_COLUMN";
    pub const COLUMN_MISSING_TABLE: &str = "COLUMN_MISSING_TABLE";
    pub const COLUMN_NO_COLUMNS: &str = "COLUMN_NO_COLUMNS";
    pub const COLUMN_INVALID_DEFINITION: &str = "COLUMN_INVALID_DEFINITION";

    // Constraints
    pub const CONSTRAINT_MISSING_TABLE: &str = "CONSTRAINT_MISSING_TABLE";
    pub const CONSTRAINT_UNKNOWN_TYPE: &str = "CONSTRAINT_UNKNOWN_TYPE";
    pub const CONSTRAINT_EMPTY_COLUMNS: &str = "CONSTRAINT_EMPTY_COLUMNS";
    pub const CONSTRAINT_MISSING_REFERENCES: &str = "CONSTRAINT_MISSING_REFERENCES";
    pub const CONSTRAINT_MISSING_EXPRESSION: &str = "CONSTRAINT_MISSING_EXPRESSION";
    pub const CONSTRAINT_COLUMN_COUNT_MISMATCH: &str = "CONSTRAINT_COLUMN_COUNT_MISMATCH";
    pub const CONSTRAINT_MULTIPLE_ACTIONS: &str = "CONSTRAINT_MULTIPLE_ACTIONS";
    pub const CONSTRAINT_NAME_GENERATED: &str = "CONSTRAINT_NAME_GENERATED";

    // Indexes
    pub const INDEX_MISSING_TABLE: &str = "INDEX_MISSING_TABLE";
    pub const INDEX_EMPTY_COLUMNS: &str = "INDEX_EMPTY_COLUMNS";
    pub const INDEX_INVALID_ELEMENT: &str = "INDEX_INVALID_ELEMENT";
    pub const INDEX_UNKNOWN_METHOD: &str = "INDEX_UNKNOWN_METHOD";
    pub const INDEX_NAME_GENERATED: &str = "INDEX_NAME_GENERATED";

    // Views
    pub const VIEW_MISSING_NAME: &str = "VIEW_MISSING_NAME";
    pub const VIEW_MISSING_QUERY: &str = "VIEW_MISSING_QUERY";

    // Functions
    pub const FUNCTION_MISSING_NAME: &str = "FUNCTION_MISSING_NAME";
    pub const FUNCTION_INVALID_PARAMETER: &str = "FUNCTION_INVALID_PARAMETER";
    pub const FUNCTION_NO_BODY: &str = "FUNCTION_NO_BODY";
    pub const FUNCTION_TOO_MANY_PARAMETERS: &str = "FUNCTION_TOO_MANY_PARAMETERS";
    pub const FUNCTION_MISSING_LANGUAGE: &str = "FUNCTION_MISSING_LANGUAGE";
    pub const FUNCTION_MISSING_RETURN_TYPE: &str = "FUNCTION_MISSING_RETURN_TYPE";

    // Triggers
    pub const TRIGGER_MISSING_NAME: &str = "TRIGGER_MISSING_NAME";
    pub const TRIGGER_MISSING_TIMING: &str = "TRIGGER_MISSING_TIMING";
    pub const TRIGGER_MISSING_EVENTS: &str = "TRIGGER_MISSING_EVENTS";
    pub const TRIGGER_MISSING_TABLE: &str = "TRIGGER_MISSING_TABLE";
    pub const TRIGGER_MISSING_FUNCTION: &str = "TRIGGER_MISSING_FUNCTION";
    pub const TRIGGER_INSTEAD_OF_STATEMENT: &str = "TRIGGER_INSTEAD_OF_STATEMENT";

    // Enum types
    pub const ENUM_MISSING_NAME: &str = "ENUM_MISSING_NAME";
    pub const ENUM_EMPTY_VALUES: &str = "ENUM_EMPTY_VALUES";
    pub const ENUM_INVALID_VALUE: &str = "ENUM_INVALID_VALUE";
    pub const ENUM_DUPLICATE_VALUES: &str = "ENUM_DUPLICATE_VALUES";
    pub const ENUM_EMPTY_VALUE: &str = "ENUM_EMPTY_VALUE";
    pub const ENUM_TOO_MANY_VALUES: &str = "ENUM_TOO_MANY_VALUES";
    pub const ENUM_VALUE_TOO_LONG: &str = "ENUM_VALUE_TOO_LONG";

    // Composite types
    pub const COMPOSITE_MISSING_NAME: &str = "COMPOSITE_MISSING_NAME";
    pub const COMPOSITE_EMPTY_ATTRIBUTES: &str = "COMPOSITE_EMPTY_ATTRIBUTES";
    pub const COMPOSITE_INVALID_ATTRIBUTE: &str = "COMPOSITE_INVALID_ATTRIBUTE";
    pub const COMPOSITE_DUPLICATE_ATTRIBUTES: &str = "COMPOSITE_DUPLICATE_ATTRIBUTES";
    pub const COMPOSITE_TOO_MANY_ATTRIBUTES: &str = "COMPOSITE_TOO_MANY_ATTRIBUTES";

    // Domain types
    pub const DOMAIN_MISSING_NAME: &str = "DOMAIN_MISSING_NAME";
    pub const DOMAIN_MISSING_BASE_TYPE: &str = "DOMAIN_MISSING_BASE_TYPE";
    pub const DOMAIN_INVALID_NUMERIC_PARAMS: &str = "DOMAIN_INVALID_NUMERIC_PARAMS";
    pub const DOMAIN_EXCESSIVE_LENGTH: &str = "DOMAIN_EXCESSIVE_LENGTH";
    pub const DOMAIN_EXCESSIVE_PRECISION: &str = "DOMAIN_EXCESSIVE_PRECISION";
    pub const DOMAIN_TOO_MANY_CHECKS: &str = "DOMAIN_TOO_MANY_CHECKS";

    // Partitions
    pub const PARTITION_MISSING_NAME: &str = "PARTITION_MISSING_NAME";
    pub const PARTITION_MISSING_PARENT: &str = "PARTITION_MISSING_PARENT";
    pub const PARTITION_MISSING_BOUNDS: &str = "PARTITION_MISSING_BOUNDS";
    pub const PARTITION_RANGE_EQUAL_BOUNDS: &str = "PARTITION_RANGE_EQUAL_BOUNDS";
    pub const PARTITION_LIST_EMPTY: &str = "PARTITION_LIST_EMPTY";
    pub const PARTITION_LIST_DUPLICATE_VALUES: &str = "PARTITION_LIST_DUPLICATE_VALUES";
    pub const PARTITION_LIST_EMPTY_VALUE: &str = "PARTITION_LIST_EMPTY_VALUE";
    pub const PARTITION_LIST_TOO_MANY_VALUES: &str = "PARTITION_LIST_TOO_MANY_VALUES";
    pub const PARTITION_HASH_INVALID_MODULUS: &str = "PARTITION_HASH_INVALID_MODULUS";
    pub const PARTITION_HASH_INVALID_REMAINDER: &str = "PARTITION_HASH_INVALID_REMAINDER";
    pub const PARTITION_HASH_MISSING_PARAMS: &str = "PARTITION_HASH_MISSING_PARAMS";
    pub const PARTITION_DEFAULT: &str = "PARTITION_DEFAULT";

    // COMMENT ON
    pub const COMMENT_MISSING_TARGET: &str = "COMMENT_MISSING_TARGET";
    pub const COMMENT_MISSING_TEXT: &str = "COMMENT_MISSING_TEXT";
    pub const COMMENT_UNSUPPORTED_OBJECT: &str = "COMMENT_UNSUPPORTED_OBJECT";
    pub const COMMENT_CLEARED: &str = "COMMENT_CLEARED";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_definition_and_no_errors() {
        let ok = ExtractionOutcome::success(1, vec![ValidationIssue::warning("W", "careful")]);
        assert!(ok.is_success());

        let failed: ExtractionOutcome<i32> =
            ExtractionOutcome::failure(ValidationIssue::error(codes::EMPTY_INPUT, "nothing"));
        assert!(!failed.is_success());
        assert!(failed.has_code(codes::EMPTY_INPUT));

        let mixed = ExtractionOutcome::success(1, vec![ValidationIssue::error("E", "bad")]);
        assert!(!mixed.is_success());
    }

    #[test]
    fn test_located_issue_serializes_flat() {
        let located = LocatedIssue {
            issue: ValidationIssue::warning(codes::TABLE_NO_COLUMNS, "no columns"),
            object_kind: ObjectKind::Tables,
            start_line: 3,
            end_line: 4,
            source_path: None,
        };
        let json = serde_json::to_value(&located).unwrap();
        assert_eq!(json["code"], "TABLE_NO_COLUMNS");
        assert_eq!(json["severity"], "Warning");
        assert_eq!(json["start_line"], 3);
    }
}
