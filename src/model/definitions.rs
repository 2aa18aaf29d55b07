//! Schema object definitions produced by the extractors

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::parser::annotations::Annotations;
use crate::parser::type_expression::TypeExpression;

/// Where a definition came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub source_path: Option<PathBuf>,
    pub start_line: usize,
    pub end_line: usize,
}

/// Common accessors shared by every definition kind.
///
/// Filtering and merging work over this trait instead of matching on each
/// definition type.
pub trait SchemaObject {
    /// Human-readable kind name used in messages and keys
    const KIND: &'static str;

    fn name(&self) -> &str;
    fn schema(&self) -> Option<&str>;
    fn source(&self) -> &SourceLocation;

    /// Owning table for objects that live inside one
    fn parent(&self) -> Option<&str> {
        None
    }

    /// Identity used for duplicate detection: schema (default `public`),
    /// parent and name, compared case-insensitively.
    fn identity_key(&self) -> String {
        let schema = self.schema().unwrap_or(crate::model::filter::DEFAULT_SCHEMA);
        let mut key = format!("{}.", schema.to_lowercase());
        if let Some(parent) = self.parent() {
            key.push_str(&parent.to_lowercase());
            key.push('.');
        }
        key.push_str(&self.name().to_lowercase());
        key
    }
}

macro_rules! impl_schema_object {
    ($ty:ty, $kind:literal) => {
        impl SchemaObject for $ty {
            const KIND: &'static str = $kind;

            fn name(&self) -> &str {
                &self.name
            }

            fn schema(&self) -> Option<&str> {
                self.schema.as_deref()
            }

            fn source(&self) -> &SourceLocation {
                &self.source
            }
        }
    };
    ($ty:ty, $kind:literal, parent = $parent:ident) => {
        impl SchemaObject for $ty {
            const KIND: &'static str = $kind;

            fn name(&self) -> &str {
                &self.name
            }

            fn schema(&self) -> Option<&str> {
                self.schema.as_deref()
            }

            fn source(&self) -> &SourceLocation {
                &self.source
            }

            fn parent(&self) -> Option<&str> {
                self.$parent.as_deref()
            }
        }
    };
}

// ============================================================================
// Tables and columns
// ============================================================================

/// `CREATE TABLE`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub columns: Vec<ColumnDefinition>,
    pub constraints: Vec<ConstraintDefinition>,
    pub is_temporary: bool,
    pub is_unlogged: bool,
    pub if_not_exists: bool,
    /// Declared with `PARTITION BY`
    pub is_partitioned: bool,
    /// Declared with `PARTITION OF`
    pub is_partition: bool,
    pub partition_info: Option<PartitionScheme>,
    pub partition_of: Option<String>,
    pub partition_bound: Option<PartitionBound>,
    /// Composite type named by `OF type`
    pub of_type: Option<String>,
    pub inherits_from: Vec<String>,
    pub tablespace: Option<String>,
    /// `WITH (key = value, ...)` entries, verbatim
    pub storage_parameters: Vec<String>,
    pub annotations: Annotations,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl TableDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

impl_schema_object!(TableDefinition, "table");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityGeneration {
    Always,
    ByDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// Inline `REFERENCES` on a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnReference {
    pub table: String,
    pub schema: Option<String>,
    pub column: Option<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

/// A column in `CREATE TABLE` or `ALTER TABLE ... ADD COLUMN`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub table_name: Option<String>,
    /// Type as written
    pub data_type: String,
    pub type_expression: Option<TypeExpression>,
    pub max_length: Option<u32>,
    pub numeric_precision: Option<u32>,
    pub numeric_scale: Option<u32>,
    pub is_array: bool,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub default_value: Option<String>,
    pub is_identity: bool,
    pub identity_generation: Option<IdentityGeneration>,
    pub generated_expression: Option<String>,
    pub collation: Option<String>,
    pub check_expression: Option<String>,
    pub references: Option<ColumnReference>,
    pub annotations: Annotations,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl_schema_object!(ColumnDefinition, "column", parent = table_name);

// ============================================================================
// Constraints and indexes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintType {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
    Exclude,
}

impl ConstraintType {
    /// Suffix PostgreSQL uses when it names the constraint itself
    pub fn default_name_suffix(&self) -> &'static str {
        match self {
            ConstraintType::PrimaryKey => "pkey",
            ConstraintType::Unique => "key",
            ConstraintType::ForeignKey => "fkey",
            ConstraintType::Check => "check",
            ConstraintType::Exclude => "excl",
        }
    }
}

/// A table constraint, inline in `CREATE TABLE` or added by `ALTER TABLE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub table_name: String,
    pub constraint_type: ConstraintType,
    pub columns: Vec<String>,
    pub referenced_table: Option<String>,
    pub referenced_schema: Option<String>,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    pub match_type: Option<String>,
    pub is_deferrable: bool,
    pub initially_deferred: bool,
    pub check_expression: Option<String>,
    /// `EXCLUDE USING method (element WITH operator, ...)` body, verbatim
    pub exclude_elements: Option<String>,
    pub is_not_valid: bool,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl SchemaObject for ConstraintDefinition {
    const KIND: &'static str = "constraint";

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn source(&self) -> &SourceLocation {
        &self.source
    }

    fn parent(&self) -> Option<&str> {
        Some(&self.table_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMethod {
    #[default]
    Btree,
    Hash,
    Gin,
    Gist,
    Brin,
    Spgist,
    Other(String),
}

impl IndexMethod {
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "btree" => IndexMethod::Btree,
            "hash" => IndexMethod::Hash,
            "gin" => IndexMethod::Gin,
            "gist" => IndexMethod::Gist,
            "brin" => IndexMethod::Brin,
            "spgist" => IndexMethod::Spgist,
            _ => IndexMethod::Other(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrder {
    First,
    Last,
}

/// One element of an index key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Plain column name; `None` for expressions
    pub name: Option<String>,
    /// Expression or function call, verbatim
    pub expression: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub nulls_order: Option<NullsOrder>,
    pub operator_class: Option<String>,
    pub collation: Option<String>,
}

/// `CREATE INDEX`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub table_name: String,
    pub method: IndexMethod,
    pub columns: Vec<IndexColumn>,
    pub is_unique: bool,
    pub is_concurrent: bool,
    pub if_not_exists: bool,
    pub nulls_not_distinct: bool,
    pub where_clause: Option<String>,
    pub include_columns: Vec<String>,
    pub storage_parameters: Vec<String>,
    pub tablespace: Option<String>,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl SchemaObject for IndexDefinition {
    const KIND: &'static str = "index";

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn source(&self) -> &SourceLocation {
        &self.source
    }
}

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckOption {
    Local,
    Cascaded,
}

/// `CREATE [MATERIALIZED] VIEW`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub is_materialized: bool,
    pub is_or_replace: bool,
    pub is_temporary: bool,
    pub is_recursive: bool,
    pub if_not_exists: bool,
    pub columns: Vec<String>,
    pub query: String,
    pub check_option: Option<CheckOption>,
    /// `WITH DATA` (true) or `WITH NO DATA` (false); materialized views only
    pub with_data: Option<bool>,
    pub storage_parameters: Vec<String>,
    pub tablespace: Option<String>,
    pub referenced_tables: Vec<String>,
    pub annotations: Annotations,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl_schema_object!(ViewDefinition, "view");

// ============================================================================
// Functions and triggers
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    InOut,
    Variadic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: Option<String>,
    pub mode: ParameterMode,
    pub data_type: String,
    pub default_value: Option<String>,
}

/// A column of `RETURNS TABLE (...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnColumn {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Volatility {
    #[default]
    Volatile,
    Stable,
    Immutable,
}

/// `CREATE FUNCTION` / `CREATE PROCEDURE`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub parameters: Vec<FunctionParameter>,
    pub return_type: Option<String>,
    pub returns_set: bool,
    pub returns_table: Vec<ReturnColumn>,
    pub language: Option<String>,
    pub volatility: Volatility,
    pub is_strict: bool,
    pub security_definer: bool,
    pub is_leakproof: bool,
    pub parallel: Option<String>,
    pub body: String,
    pub is_procedure: bool,
    pub is_or_replace: bool,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl SchemaObject for FunctionDefinition {
    const KIND: &'static str = "function";

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn source(&self) -> &SourceLocation {
        &self.source
    }

    /// Overloads differ by their input parameter types.
    fn identity_key(&self) -> String {
        let schema = self.schema().unwrap_or(crate::model::filter::DEFAULT_SCHEMA);
        let params: Vec<String> = self
            .parameters
            .iter()
            .filter(|p| p.mode != ParameterMode::Out)
            .map(|p| p.data_type.to_lowercase())
            .collect();
        format!(
            "{}.{}({})",
            schema.to_lowercase(),
            self.name.to_lowercase(),
            params.join(",")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
    Truncate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerLevel {
    Row,
    #[default]
    Statement,
}

/// `CREATE [CONSTRAINT] TRIGGER`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub table_name: String,
    pub timing: TriggerTiming,
    pub events: Vec<TriggerEvent>,
    pub update_columns: Vec<String>,
    pub level: TriggerLevel,
    pub when_condition: Option<String>,
    pub function_name: String,
    pub function_schema: Option<String>,
    pub function_arguments: Vec<String>,
    pub is_constraint: bool,
    pub is_or_replace: bool,
    pub is_deferrable: bool,
    pub initially_deferred: bool,
    pub referencing: Vec<String>,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl SchemaObject for TriggerDefinition {
    const KIND: &'static str = "trigger";

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn source(&self) -> &SourceLocation {
        &self.source
    }

    fn parent(&self) -> Option<&str> {
        Some(&self.table_name)
    }
}

// ============================================================================
// User-defined types
// ============================================================================

/// `CREATE TYPE ... AS ENUM`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumTypeDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub values: Vec<String>,
    pub annotations: Annotations,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl_schema_object!(EnumTypeDefinition, "enum type");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeAttribute {
    pub name: String,
    pub data_type: String,
    pub type_expression: Option<TypeExpression>,
    pub collation: Option<String>,
    pub annotations: Annotations,
}

/// `CREATE TYPE ... AS (...)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeTypeDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub attributes: Vec<CompositeAttribute>,
    pub annotations: Annotations,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl_schema_object!(CompositeTypeDefinition, "composite type");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCheck {
    pub name: Option<String>,
    pub expression: String,
}

/// `CREATE DOMAIN`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainTypeDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub base_type: String,
    pub type_expression: Option<TypeExpression>,
    pub check_constraints: Vec<DomainCheck>,
    pub is_not_null: bool,
    pub default_value: Option<String>,
    pub collation: Option<String>,
    pub annotations: Annotations,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl_schema_object!(DomainTypeDefinition, "domain type");

// ============================================================================
// Partitions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionMethod {
    Range,
    List,
    Hash,
}

/// `PARTITION BY method (key, ...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionScheme {
    pub method: PartitionMethod,
    /// Key columns or expressions, verbatim
    pub keys: Vec<String>,
}

/// `FOR VALUES ...` or `DEFAULT`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionBound {
    Range { from: String, to: String },
    List { values: Vec<String> },
    Hash { modulus: i64, remainder: i64 },
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionStrategy {
    Range,
    List,
    Hash,
    Default,
}

/// `CREATE TABLE child PARTITION OF parent ...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub parent_table: String,
    pub parent_schema: Option<String>,
    pub strategy: PartitionStrategy,
    pub from_value: Option<String>,
    pub to_value: Option<String>,
    pub in_values: Vec<String>,
    pub modulus: Option<i64>,
    pub remainder: Option<i64>,
    pub is_default: bool,
    pub partition_by: Option<PartitionScheme>,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl SchemaObject for PartitionDefinition {
    const KIND: &'static str = "partition";

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn source(&self) -> &SourceLocation {
        &self.source
    }
}

// ============================================================================
// Comments
// ============================================================================

/// Object kinds `COMMENT ON` can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentObjectType {
    Table,
    Column,
    Index,
    View,
    Function,
    Trigger,
    Constraint,
    Type,
}

/// `COMMENT ON kind target IS '...'`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentDefinition {
    pub object_type: CommentObjectType,
    /// Commented object; the column name for column comments
    pub name: String,
    pub schema: Option<String>,
    /// Owning table for column, trigger and constraint comments
    pub table_name: Option<String>,
    /// `None` for `IS NULL`
    pub comment: Option<String>,
    pub original_sql: String,
    pub source: SourceLocation,
}

impl SchemaObject for CommentDefinition {
    const KIND: &'static str = "comment";

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn source(&self) -> &SourceLocation {
        &self.source
    }

    fn parent(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    /// Comments on a table and an index of the same name are different objects.
    fn identity_key(&self) -> String {
        let schema = self.schema().unwrap_or(crate::model::filter::DEFAULT_SCHEMA);
        let mut key = format!("{:?}:{}.", self.object_type, schema.to_lowercase());
        if let Some(parent) = self.parent() {
            key.push_str(&parent.to_lowercase());
            key.push('.');
        }
        key.push_str(&self.name.to_lowercase());
        key
    }
}
