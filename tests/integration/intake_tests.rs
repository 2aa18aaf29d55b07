//! File discovery and intake

use std::path::Path;

use pretty_assertions::assert_eq;
use rust_pgschema::intake::{analyze_files, analyze_sources, discover_sql_files};
use rust_pgschema::{AnalyzeOptions, AnalyzerConfig, AnalyzerError, IntakeOptions, SqlSource};

use crate::common::{table_names, TestContext};

fn relative(root: &Path, files: &[std::path::PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|f| {
            f.strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

#[test]
fn test_discovery_is_sorted_and_honours_excludes() {
    let ctx = TestContext::with_fixture("ecommerce");
    let options = IntakeOptions {
        exclude: vec!["archive/*".to_string()],
        ..Default::default()
    };
    let files = discover_sql_files(&ctx.root, &options).unwrap();
    assert_eq!(
        relative(&ctx.root, &files),
        vec![
            "schema/01_types.sql",
            "schema/02_tables.sql",
            "schema/03_views.sql",
            "schema/04_functions.sql",
            "schema/05_comments.sql",
        ]
    );

    let all = discover_sql_files(&ctx.root, &IntakeOptions::default()).unwrap();
    assert_eq!(all.len(), 6);
}

#[test]
fn test_non_recursive_and_extensions() {
    let ctx = TestContext::empty();
    ctx.write_file("top.SQL", "CREATE TABLE top (id int);");
    ctx.write_file("extra.pgsql", "CREATE TABLE extra (id int);");
    ctx.write_file("notes.txt", "CREATE TABLE ignored (id int);");
    ctx.write_file("nested/deep.sql", "CREATE TABLE deep (id int);");

    let options = IntakeOptions {
        extensions: vec!["sql".to_string(), "pgsql".to_string()],
        recursive: false,
        ..Default::default()
    };
    let files = discover_sql_files(&ctx.root, &options).unwrap();
    assert_eq!(relative(&ctx.root, &files), vec!["extra.pgsql", "top.SQL"]);

    let metadata = analyze_files(&files, &options).unwrap();
    assert_eq!(table_names(&metadata), vec!["extra", "top"]);
}

#[test]
fn test_missing_inputs() {
    let err = discover_sql_files(Path::new("/no/such/dir"), &IntakeOptions::default()).unwrap_err();
    assert!(matches!(err, AnalyzerError::DirectoryNotFound { .. }));

    let err = SqlSource::from_file(Path::new("/no/such/file.sql")).unwrap_err();
    assert!(matches!(err, AnalyzerError::FileNotFound { .. }));

    let ctx = TestContext::empty();
    let options = IntakeOptions {
        exclude: vec!["[".to_string()],
        ..Default::default()
    };
    let err = discover_sql_files(&ctx.root, &options).unwrap_err();
    assert!(matches!(err, AnalyzerError::InvalidGlobPattern { .. }));
}

#[test]
fn test_single_file_input() {
    let ctx = TestContext::with_fixture("ecommerce");
    let metadata =
        rust_pgschema::analyze(AnalyzeOptions::new(ctx.path("schema/03_views.sql"))).unwrap();
    assert_eq!(metadata.views.len(), 2);
    assert_eq!(metadata.source_paths.len(), 1);
    assert!(metadata.tables.is_empty());
}

#[test]
fn test_windows_1252_and_bom_are_decoded() {
    let ctx = TestContext::empty();
    let latin = ctx.path("latin.sql");
    std::fs::write(&latin, b"COMMENT ON TABLE t IS 'caf\xe9';").unwrap();
    let bom = ctx.path("bom.sql");
    std::fs::write(&bom, b"\xef\xbb\xbfCREATE TABLE t (id int);").unwrap();

    assert_eq!(SqlSource::from_file(&latin).unwrap().text, "COMMENT ON TABLE t IS 'caf\u{e9}';");
    assert!(SqlSource::from_file(&bom).unwrap().text.starts_with("CREATE"));

    let metadata = ctx.analyze();
    assert_eq!(table_names(&metadata), vec!["t"]);
    assert_eq!(metadata.tables[0].annotations.comment.as_deref(), Some("caf\u{e9}"));
}

#[test]
fn test_parallel_and_sequential_agree() {
    let sources: Vec<SqlSource> = (0..20)
        .map(|i| {
            SqlSource::new(format!("CREATE TABLE t{:02} (id int);", i))
                .with_path(format!("t{:02}.sql", i))
        })
        .collect();

    let sequential = analyze_sources(&sources, usize::MAX).unwrap();
    let parallel = analyze_sources(&sources, 1).unwrap();
    assert_eq!(table_names(&sequential), table_names(&parallel));
    assert_eq!(sequential.tables, parallel.tables);
    assert_eq!(sequential.source_paths.len(), 20);
}

#[test]
fn test_config_file_drives_analysis() {
    let ctx = TestContext::with_fixture("ecommerce");
    let config_path = ctx.write_file(
        "pgschema.toml",
        r#"
        [intake]
        exclude = ["archive/*"]

        [filter]
        kinds = ["views"]
        "#,
    );
    let config = AnalyzerConfig::load(&config_path).unwrap();
    let metadata = ctx.analyze_with(config);
    assert!(metadata.tables.is_empty());
    let names: Vec<&str> = metadata.views.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["open_orders", "daily_totals"]);
}
