//! Pipeline benchmarks for rust-pgschema
//!
//! Measures:
//! - Full pipeline: directory -> schema metadata
//! - Statement splitting and block extraction
//! - Metadata building
//! - Filtering and JSON output
//!
//! Run with: cargo bench
//! Compare against baseline: cargo bench -- --save-baseline before
//!                          (make changes)
//!                          cargo bench -- --baseline before

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_pgschema::model::{self, FilterKind};
use rust_pgschema::{intake, parser, AnalyzeOptions, IntakeOptions, SchemaFilterBuilder};
use std::path::PathBuf;
use tempfile::TempDir;

/// Get the path to a test fixture
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A script with `tables` tables, each with an index, a trigger function and comments.
fn generated_script(tables: usize) -> String {
    let mut sql = String::from("CREATE TYPE app.state AS ENUM ('new', 'active', 'closed');\n\n");
    for i in 0..tables {
        sql.push_str(&format!(
            "CREATE TABLE app.t{i} (\n    id bigint GENERATED ALWAYS AS IDENTITY PRIMARY KEY,\n    name varchar(200) NOT NULL, -- comment: Display name\n    state app.state NOT NULL DEFAULT 'new',\n    amount numeric(12, 2) CHECK (amount >= 0),\n    created_at timestamptz NOT NULL DEFAULT now()\n);\n\n\
             CREATE INDEX t{i}_name_idx ON app.t{i} USING btree (lower(name)) WHERE state <> 'closed';\n\n\
             CREATE FUNCTION app.t{i}_touch() RETURNS trigger LANGUAGE plpgsql AS $$\nBEGIN\n    NEW.created_at := now();\n    RETURN NEW;\nEND;\n$$;\n\n\
             CREATE TRIGGER t{i}_touch BEFORE UPDATE ON app.t{i} FOR EACH ROW EXECUTE FUNCTION app.t{i}_touch();\n\n\
             COMMENT ON TABLE app.t{i} IS 'Generated table {i}';\n\n"
        ));
    }
    sql
}

/// Benchmark the full pipeline: directory -> metadata
fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");

    let ecommerce = fixture_path("ecommerce");
    if ecommerce.exists() {
        group.bench_function("ecommerce", |b| {
            b.iter(|| rust_pgschema::analyze(AnalyzeOptions::new(black_box(&ecommerce))).unwrap())
        });
    }

    // Many files so the parallel path is taken
    let temp_dir = TempDir::new().unwrap();
    for i in 0..64 {
        std::fs::write(
            temp_dir.path().join(format!("{:03}.sql", i)),
            generated_script(5),
        )
        .unwrap();
    }
    let options = IntakeOptions::default();
    group.bench_function(BenchmarkId::new("generated_files", 64), |b| {
        b.iter(|| intake::analyze_directory(black_box(temp_dir.path()), &options).unwrap())
    });

    group.finish();
}

/// Benchmark statement splitting and block extraction
fn bench_block_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_extraction");

    for tables in [10, 100] {
        let sql = generated_script(tables);
        group.throughput(Throughput::Bytes(sql.len() as u64));
        group.bench_with_input(BenchmarkId::new("split", tables), &sql, |b, sql| {
            b.iter(|| parser::split_statements(black_box(sql)))
        });
        group.bench_with_input(BenchmarkId::new("extract_blocks", tables), &sql, |b, sql| {
            b.iter(|| parser::extract_blocks(black_box(sql), None))
        });
    }

    group.finish();
}

/// Benchmark metadata building from extracted blocks
fn bench_metadata_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("metadata_building");

    for tables in [10, 100] {
        let blocks = parser::extract_blocks(&generated_script(tables), None);
        group.throughput(Throughput::Elements(blocks.len() as u64));
        group.bench_with_input(BenchmarkId::new("build", blocks.len()), &blocks, |b, blocks| {
            b.iter(|| model::build_metadata(black_box(blocks)))
        });
    }

    group.finish();
}

/// Benchmark filtering and serialization of a built aggregate
fn bench_output(c: &mut Criterion) {
    let mut group = c.benchmark_group("output");

    let metadata = rust_pgschema::analyze_sql(&generated_script(100));
    group.throughput(Throughput::Elements(metadata.object_count() as u64));

    let filter = SchemaFilterBuilder::new()
        .only_kinds([FilterKind::Tables, FilterKind::Indexes])
        .exclude_names(FilterKind::Tables, "^t9")
        .build()
        .unwrap();
    group.bench_function("filter", |b| b.iter(|| filter.apply(black_box(&metadata))));

    group.bench_function("to_json", |b| b.iter(|| black_box(&metadata).to_json().unwrap()));

    group.finish();
}

criterion_group!(
    benches,
    bench_full_pipeline,
    bench_block_extraction,
    bench_metadata_building,
    bench_output,
);

criterion_main!(benches);
