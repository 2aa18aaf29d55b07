//! End-to-end analysis of the ecommerce fixture

use pretty_assertions::assert_eq;
use rust_pgschema::config::{FilterConfig, MergeConfig, NamePattern};
use rust_pgschema::model::{
    codes, ConstraintType, DuplicatePolicy, FilterKind, IdentityGeneration, IndexMethod,
    PartitionStrategy, ReferentialAction, TriggerEvent, TriggerLevel, TriggerTiming, Volatility,
};
use rust_pgschema::{AnalyzeOptions, AnalyzerConfig, AnalyzerError, IntakeOptions};

use crate::common::{issue_codes, table_names, TestContext};

fn schema_only() -> AnalyzerConfig {
    AnalyzerConfig {
        intake: IntakeOptions {
            exclude: vec!["archive/*".to_string()],
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_fixture_tables_and_columns() {
    let ctx = TestContext::with_fixture("ecommerce");
    let metadata = ctx.analyze_with(schema_only());

    assert_eq!(table_names(&metadata), vec!["customers", "orders"]);

    let customers = metadata.table(Some("sales"), "customers").unwrap();
    assert_eq!(customers.primary_key_columns(), vec!["id"]);
    let email = customers.column("email").unwrap();
    assert_eq!(email.max_length, Some(320));
    assert!(email.is_unique);
    assert!(!email.is_nullable);
    assert_eq!(email.annotations.comment.as_deref(), Some("Login address"));
    assert_eq!(
        customers.column("created_at").unwrap().default_value.as_deref(),
        Some("now()")
    );

    let orders = metadata.table(Some("sales"), "orders").unwrap();
    assert!(orders.is_partitioned);
    assert_eq!(orders.primary_key_columns(), vec!["id", "ordered_on"]);
    let id = orders.column("id").unwrap();
    assert!(id.is_identity);
    assert_eq!(id.identity_generation, Some(IdentityGeneration::Always));
    let customer = orders.column("customer_id").unwrap();
    let reference = customer.references.as_ref().unwrap();
    assert_eq!(reference.table, "customers");
    assert_eq!(reference.on_delete, Some(ReferentialAction::Cascade));
    let total = orders.column("total").unwrap();
    assert_eq!((total.numeric_precision, total.numeric_scale), (Some(12), Some(2)));
    assert!(orders
        .constraints
        .iter()
        .any(|c| c.constraint_type == ConstraintType::Check && c.name == "orders_total_check"));
}

#[test]
fn test_fixture_types_partitions_and_indexes() {
    let ctx = TestContext::with_fixture("ecommerce");
    let metadata = ctx.analyze_with(schema_only());

    let status = &metadata.enum_types[0];
    assert_eq!(status.values, vec!["pending", "paid", "shipped", "cancelled"]);
    assert_eq!(status.annotations.comment.as_deref(), Some("Lifecycle of an order"));

    let address = &metadata.composite_types[0];
    let names: Vec<&str> = address.attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["street", "city", "zip"]);
    assert_eq!(
        address.attributes[0].annotations.comment.as_deref(),
        Some("Street and number")
    );

    let amount = &metadata.domain_types[0];
    assert!(amount.is_not_null);
    assert_eq!(amount.check_constraints[0].expression, "VALUE > 0");

    assert_eq!(metadata.partitions.len(), 2);
    let range = &metadata.partitions[0];
    assert_eq!(range.strategy, PartitionStrategy::Range);
    assert_eq!(range.parent_table, "orders");
    assert_eq!(range.from_value.as_deref(), Some("'2024-01-01'"));
    assert!(metadata.partitions[1].is_default);

    assert_eq!(metadata.indexes.len(), 2);
    assert!(metadata.indexes[0].is_unique);
    assert_eq!(metadata.indexes[0].columns[0].expression.as_deref(), Some("lower(email)"));
    let generated = &metadata.indexes[1];
    assert_eq!(generated.name, "orders_customer_id_ordered_on_idx");
    assert_eq!(generated.method, IndexMethod::Btree);
    assert_eq!(generated.where_clause.as_deref(), Some("status <> 'cancelled'"));

    assert_eq!(metadata.constraints.len(), 1);
    assert_eq!(metadata.constraints[0].constraint_type, ConstraintType::ForeignKey);
    assert_eq!(metadata.constraints[0].referenced_table.as_deref(), Some("customers"));
}

#[test]
fn test_fixture_views_functions_triggers_comments() {
    let ctx = TestContext::with_fixture("ecommerce");
    let metadata = ctx.analyze_with(schema_only());

    let open = metadata.view(Some("sales"), "open_orders").unwrap();
    assert!(open.is_or_replace);
    assert!(open.referenced_tables.contains(&"sales.orders".to_string()));
    assert!(open.referenced_tables.contains(&"sales.customers".to_string()));
    assert_eq!(open.annotations.comment.as_deref(), Some("Orders not yet shipped"));

    let daily = metadata.view(Some("sales"), "daily_totals").unwrap();
    assert!(daily.is_materialized);
    assert_eq!(daily.with_data, Some(false));

    let touch = metadata.function("touch_updated_at").unwrap();
    assert_eq!(touch.language.as_deref(), Some("plpgsql"));
    assert!(touch.body.contains("RETURN NEW;"));

    let count = metadata.function("order_count").unwrap();
    assert_eq!(count.volatility, Volatility::Stable);
    assert_eq!(count.parameters.len(), 2);
    assert_eq!(count.parameters[1].default_value.as_deref(), Some("'2000-01-01'"));

    let trigger = &metadata.triggers[0];
    assert_eq!(trigger.timing, TriggerTiming::Before);
    assert_eq!(trigger.events, vec![TriggerEvent::Update]);
    assert_eq!(trigger.level, TriggerLevel::Row);
    assert_eq!(trigger.function_name, "touch_updated_at");

    let customers = metadata.table(Some("sales"), "customers").unwrap();
    assert_eq!(customers.annotations.comment.as_deref(), Some("People who place orders"));
    assert_eq!(
        customers.column("full_name").unwrap().annotations.comment.as_deref(),
        Some("Name as entered at signup")
    );
    assert_eq!(metadata.comments.len(), 3);
}

#[test]
fn test_fixture_provenance() {
    let ctx = TestContext::with_fixture("ecommerce");
    let metadata = ctx.analyze_with(schema_only());

    assert_eq!(metadata.source_paths.len(), 5);
    assert!(metadata.source_paths[0].ends_with("schema/01_types.sql"));

    let orders = metadata.table(Some("sales"), "orders").unwrap();
    assert!(orders
        .source
        .source_path
        .as_ref()
        .unwrap()
        .ends_with("schema/02_tables.sql"));
    assert_eq!(orders.source.start_line, 8);
    assert!(!metadata.has_errors(), "{:?}", issue_codes(&metadata));
}

#[test]
fn test_filter_and_duplicate_policy_from_config() {
    let ctx = TestContext::with_fixture("ecommerce");
    ctx.write_file("schema/06_redefine.sql", "CREATE TABLE sales.customers (id int);");

    let config = AnalyzerConfig {
        intake: IntakeOptions {
            exclude: vec!["archive/*".to_string()],
            ..Default::default()
        },
        filter: FilterConfig {
            kinds: vec![FilterKind::Tables],
            exclude_names: vec![NamePattern {
                kind: FilterKind::Tables,
                pattern: "^orders$".to_string(),
            }],
            ..Default::default()
        },
        merge: MergeConfig {
            duplicates: DuplicatePolicy::KeepLast,
        },
    };
    let metadata = ctx.analyze_with(config);

    assert_eq!(table_names(&metadata), vec!["customers"]);
    assert_eq!(metadata.tables[0].columns.len(), 1);
    assert!(metadata.views.is_empty());
    assert!(metadata.functions.is_empty());
}

#[test]
fn test_duplicate_error_policy_fails() {
    let ctx = TestContext::with_fixture("ecommerce");
    ctx.write_file("schema/06_redefine.sql", "CREATE TABLE sales.customers (id int);");

    let config = AnalyzerConfig {
        merge: MergeConfig {
            duplicates: DuplicatePolicy::Error,
        },
        ..Default::default()
    };
    let err = rust_pgschema::analyze(AnalyzeOptions::new(&ctx.root).with_config(config)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AnalyzerError>(),
        Some(AnalyzerError::DuplicateObject { .. })
    ));
}

#[test]
fn test_issues_are_located() {
    let ctx = TestContext::empty();
    ctx.write_file(
        "bad.sql",
        "CREATE TABLE ok (id int);\n\nCREATE TYPE empty AS ENUM ();\nCREATE TYPE twice AS ENUM ('a', 'a');",
    );
    let metadata = ctx.analyze();

    assert_eq!(table_names(&metadata), vec!["ok"]);
    assert_eq!(metadata.enum_types.len(), 1);
    assert_eq!(
        issue_codes(&metadata),
        vec![codes::ENUM_EMPTY_VALUES, codes::ENUM_DUPLICATE_VALUES]
    );
    let empty = &metadata.issues[0];
    assert_eq!(empty.start_line, 3);
    assert!(empty.source_path.as_ref().unwrap().ends_with("bad.sql"));
    assert!(metadata.issues[1].issue.message.contains("'a'"));
}

#[test]
fn test_json_output() {
    let metadata = rust_pgschema::analyze_sql("CREATE TABLE t (id int PRIMARY KEY);");
    let json = metadata.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["tables"][0]["name"], "t");
    assert_eq!(value["tables"][0]["columns"][0]["is_primary_key"], true);
    assert!(value["analyzed_at"].is_string());
}
