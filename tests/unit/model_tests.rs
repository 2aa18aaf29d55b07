//! Aggregate building, filtering and merging

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use rust_pgschema::model::{DuplicatePolicy, FilterKind, SchemaObject};
use rust_pgschema::{AnalyzerError, SchemaFilterBuilder, SchemaMerger, SchemaMetadata, SqlSource};

const SCRIPT: &str = r#"
CREATE TABLE sales.orders (id int PRIMARY KEY, note text);

CREATE TABLE sales.tmp_import (id int);

CREATE TABLE audit.events (id int);

CREATE TABLE pg_stats_cache (id int);

CREATE VIEW sales.recent AS SELECT * FROM sales.orders;

CREATE INDEX orders_note_idx ON sales.orders (note);

COMMENT ON TABLE sales.orders IS 'Orders';
"#;

fn source(sql: &str, path: &str) -> SchemaMetadata {
    rust_pgschema::analyze_source(&SqlSource::new(sql).with_path(path))
}

fn names<T: SchemaObject>(items: &[T]) -> Vec<&str> {
    items.iter().map(|i| i.name()).collect()
}

#[test]
fn test_filter_by_schema_name_and_kind() {
    let metadata = rust_pgschema::analyze_sql(SCRIPT);

    let filter = SchemaFilterBuilder::new()
        .include_schema("sales")
        .exclude_names(FilterKind::Tables, "^tmp_")
        .only_tables_and_views()
        .build()
        .unwrap();
    let filtered = filter.apply(&metadata);

    assert_eq!(names(&filtered.tables), vec!["orders"]);
    assert_eq!(names(&filtered.views), vec!["recent"]);
    assert!(filtered.indexes.is_empty());
}

#[test]
fn test_system_objects_are_excluded() {
    let metadata = rust_pgschema::analyze_sql(SCRIPT);
    let filtered = SchemaFilterBuilder::new()
        .exclude_system_objects()
        .build()
        .unwrap()
        .apply(&metadata);
    assert_eq!(names(&filtered.tables), vec!["orders", "tmp_import", "events"]);
}

#[test]
fn test_filter_is_idempotent() {
    let metadata = rust_pgschema::analyze_sql(SCRIPT);
    let filter = SchemaFilterBuilder::new()
        .exclude_schema("audit")
        .include_comments(false)
        .build()
        .unwrap();

    let once = filter.apply(&metadata);
    let twice = filter.apply(&once);
    assert_eq!(once, twice);
    assert!(once.comments.is_empty());
}

#[test]
fn test_invalid_name_pattern_is_reported() {
    let err = SchemaFilterBuilder::new()
        .include_names(FilterKind::Views, "(")
        .build()
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::InvalidFilterPattern { .. }));
}

#[test]
fn test_merge_preserves_schema_and_source() {
    let a = source("CREATE TABLE sales.t1 (id int);", "a.sql");
    let b = source("CREATE TABLE t2 (id int);", "b.sql");
    let merged = SchemaMerger::new().merge(&[a, b]).unwrap();

    assert_eq!(names(&merged.tables), vec!["t1", "t2"]);
    assert_eq!(merged.tables[0].schema.as_deref(), Some("sales"));
    assert_eq!(merged.tables[1].schema, None);
    assert_eq!(
        merged.tables[0].source.source_path.as_deref(),
        Some(Path::new("a.sql"))
    );
    assert_eq!(
        merged.tables[1].source.source_path.as_deref(),
        Some(Path::new("b.sql"))
    );
    assert_eq!(
        merged.source_paths,
        vec![PathBuf::from("a.sql"), PathBuf::from("b.sql")]
    );
}

#[test]
fn test_keep_first_drops_later_definitions() {
    let a = source("CREATE TABLE t (id int);", "a.sql");
    let b = source("CREATE TABLE T (id int, extra text);", "b.sql");
    let merged = SchemaMerger::new()
        .with_policy(DuplicatePolicy::KeepFirst)
        .merge(&[a, b])
        .unwrap();
    assert_eq!(merged.tables.len(), 1);
    assert_eq!(merged.tables[0].columns.len(), 1);
}

#[test]
fn test_aggregate_accessors() {
    let metadata = rust_pgschema::analyze_sql(SCRIPT);
    assert_eq!(metadata.object_count(), 7);
    assert!(metadata.table(Some("SALES"), "Orders").is_some());
    assert!(metadata.table(None, "orders").is_some());
    assert!(metadata.table(Some("public"), "orders").is_none());
    assert!(metadata.table(Some("public"), "pg_stats_cache").is_some());
    assert_eq!(
        metadata.table(Some("sales"), "orders").unwrap().annotations.comment.as_deref(),
        Some("Orders")
    );
    assert!(!metadata.has_errors());
    assert_eq!(metadata.warnings().count(), 0);
}
