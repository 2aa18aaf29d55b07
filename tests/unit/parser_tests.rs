//! Parser behaviour through the public API

use pretty_assertions::assert_eq;
use rust_pgschema::model::{codes, CommentObjectType, Severity};
use rust_pgschema::parser::{
    detect_object_kind, extract_blocks, parse_type_expression, split_statements,
    CompositeTypeExtractor, EnumTypeExtractor, Extractor, FunctionExtractor, ObjectKind,
    PartitionExtractor, TableExtractor, TypeKind, ViewExtractor,
};

// ============================================================================
// Splitting
// ============================================================================

#[test]
fn test_statements_keep_source_order() {
    let metadata =
        rust_pgschema::analyze_sql("CREATE TABLE a (id int); CREATE TABLE b (id int);");
    let names: Vec<&str> = metadata.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_consecutive_statements_without_terminators() {
    let statements = split_statements("CREATE TABLE a1(id INT)\nCREATE TABLE a2(id INT)");
    assert_eq!(statements.len(), 2);
    for statement in &statements {
        assert_eq!(statement.matches("CREATE TABLE").count(), 1);
    }
}

#[test]
fn test_dollar_quoted_body_stays_whole() {
    let sql = "CREATE FUNCTION f() RETURNS void LANGUAGE plpgsql AS $$\nBEGIN\n    PERFORM 1;\n\n    PERFORM 2;\nEND;\n$$;\n\nCREATE TABLE after_f (id int);";
    let metadata = rust_pgschema::analyze_sql(sql);
    assert_eq!(metadata.functions.len(), 1);
    let body = &metadata.functions[0].body;
    assert!(body.contains("PERFORM 1;"));
    assert!(body.contains("PERFORM 2;"));
    assert_eq!(metadata.tables[0].name, "after_f");
}

#[test]
fn test_block_lines_and_header_comment() {
    let blocks = extract_blocks(
        "-- comment: Customer accounts\nCREATE TABLE accounts (\n    id int\n);\n\nSELECT 1;",
        None,
    );
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].start_line, 2);
    assert_eq!(blocks[0].end_line, 4);
    assert_eq!(
        blocks[0].header_annotations().comment.as_deref(),
        Some("Customer accounts")
    );
    assert_eq!(blocks[1].start_line, 6);
}

// ============================================================================
// Detection
// ============================================================================

#[test]
fn test_detection_is_total() {
    assert_eq!(detect_object_kind("CREATE TABLE t (id int)"), ObjectKind::Tables);
    assert_eq!(
        detect_object_kind("CREATE TABLE p PARTITION OF t DEFAULT"),
        ObjectKind::Partitions
    );
    assert_eq!(
        detect_object_kind("create type mood as enum ('ok')"),
        ObjectKind::Types(TypeKind::Enum)
    );
    assert_eq!(
        detect_object_kind("CREATE DOMAIN d AS int"),
        ObjectKind::Types(TypeKind::Domain)
    );
    assert_eq!(
        detect_object_kind("COMMENT ON COLUMN t.c IS 'x'"),
        ObjectKind::Comments(CommentObjectType::Column)
    );
    assert_eq!(detect_object_kind("ALTER TABLE t ADD COLUMN c int"), ObjectKind::Columns);
    assert_eq!(detect_object_kind("INSERT INTO t VALUES (1)"), ObjectKind::None);
    assert_eq!(detect_object_kind(""), ObjectKind::None);
    assert_eq!(detect_object_kind("CREATE"), ObjectKind::None);
}

#[test]
fn test_can_extract_agrees_with_detection() {
    let blocks = extract_blocks("CREATE VIEW v AS SELECT 1;", None);
    assert!(ViewExtractor.can_extract(&blocks));
    assert!(!TableExtractor.can_extract(&blocks));
}

// ============================================================================
// Extraction outcomes
// ============================================================================

#[test]
fn test_enum_validity() {
    let duplicate = EnumTypeExtractor.extract_sql("CREATE TYPE t AS ENUM ('a','a')");
    assert!(duplicate.is_success());
    assert_eq!(duplicate.issues.len(), 1);
    let warning = duplicate.issue(codes::ENUM_DUPLICATE_VALUES).unwrap();
    assert_eq!(warning.severity, Severity::Warning);
    assert!(warning.message.contains("'a'"));

    let empty = EnumTypeExtractor.extract_sql("CREATE TYPE t AS ENUM ()");
    assert!(!empty.is_success());
    assert!(empty.has_errors());
}

#[test]
fn test_hash_partition_bounds() {
    let invalid = PartitionExtractor.extract_sql(
        "CREATE TABLE p3 PARTITION OF t FOR VALUES WITH (MODULUS 4, REMAINDER 4)",
    );
    assert!(invalid.has_code(codes::PARTITION_HASH_INVALID_REMAINDER));
    assert!(invalid.definition.is_none());

    let valid = PartitionExtractor.extract_sql(
        "CREATE TABLE p3 PARTITION OF t FOR VALUES WITH (MODULUS 4, REMAINDER 3)",
    );
    assert!(valid.is_success());
    let partition = valid.definition.unwrap();
    assert_eq!((partition.modulus, partition.remainder), (Some(4), Some(3)));
}

#[test]
fn test_numeric_type_expression() {
    let expr = parse_type_expression("NUMERIC(12,2)").unwrap();
    assert_eq!(expr.base_type, "NUMERIC");
    assert_eq!(expr.precision, Some(12));
    assert_eq!(expr.scale, Some(2));

    let table = TableExtractor
        .extract_sql("CREATE TABLE prices (amount NUMERIC(12,2))")
        .definition
        .unwrap();
    assert_eq!(table.columns[0].numeric_precision, Some(12));
    assert_eq!(table.columns[0].numeric_scale, Some(2));
}

#[test]
fn test_empty_and_non_matching_input_fail_without_panic() {
    let empty = TableExtractor.extract_sql("");
    assert!(!empty.is_success());
    assert!(empty.has_code(codes::EMPTY_INPUT));

    let empty_blocks = FunctionExtractor.extract(&[]);
    assert!(empty_blocks.has_code(codes::EMPTY_INPUT));

    let other = CompositeTypeExtractor.extract_sql("SELECT 1;");
    assert!(!other.is_success());
    assert!(other.has_code(codes::NO_MATCHING_STATEMENT));
}

#[test]
fn test_column_order_matches_declaration() {
    let table = TableExtractor
        .extract_sql("CREATE TABLE t (z int, a int, m int)")
        .definition
        .unwrap();
    let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["z", "a", "m"]);
}
