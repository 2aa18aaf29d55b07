//! Build schema metadata from statement blocks
//!
//! Each block is classified once and handed to exactly one extractor.
//! Failed blocks contribute their issues and nothing else; later blocks are
//! unaffected.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::definitions::CommentObjectType;
use super::outcome::{ExtractionOutcome, LocatedIssue};
use super::schema_metadata::{schema_matches, SchemaMetadata};
use crate::parser::{
    detect_object_kind, ColumnExtractor, CommentExtractor, CompositeTypeExtractor,
    ConstraintExtractor, DomainTypeExtractor, EnumTypeExtractor, Extractor, FunctionExtractor,
    IndexExtractor, ObjectKind, PartitionExtractor, StatementBlock, TableExtractor,
    TriggerExtractor, TypeKind, ViewExtractor,
};

/// Fold statement blocks into one metadata aggregate, in block order.
pub fn build_metadata(blocks: &[StatementBlock]) -> SchemaMetadata {
    let mut metadata = SchemaMetadata::new();

    for block in blocks {
        if let Some(path) = &block.source_path {
            metadata.add_source_path(path);
        }

        let kind = detect_object_kind(&block.content);
        let issues = &mut metadata.issues;
        match kind {
            ObjectKind::None => {
                trace!(line = block.start_line, "Skipping unsupported statement");
            }
            ObjectKind::Tables => metadata
                .tables
                .extend(record(issues, block, kind, TableExtractor.extract_block(block))),
            ObjectKind::Columns => metadata.columns.extend(
                record(issues, block, kind, ColumnExtractor.extract_block(block))
                    .into_iter()
                    .flatten(),
            ),
            ObjectKind::Views => metadata
                .views
                .extend(record(issues, block, kind, ViewExtractor.extract_block(block))),
            ObjectKind::Types(TypeKind::Enum) => metadata
                .enum_types
                .extend(record(issues, block, kind, EnumTypeExtractor.extract_block(block))),
            ObjectKind::Types(TypeKind::Composite) => metadata.composite_types.extend(record(
                issues,
                block,
                kind,
                CompositeTypeExtractor.extract_block(block),
            )),
            ObjectKind::Types(TypeKind::Domain) => metadata.domain_types.extend(record(
                issues,
                block,
                kind,
                DomainTypeExtractor.extract_block(block),
            )),
            ObjectKind::Functions => metadata
                .functions
                .extend(record(issues, block, kind, FunctionExtractor.extract_block(block))),
            ObjectKind::Indexes => metadata
                .indexes
                .extend(record(issues, block, kind, IndexExtractor.extract_block(block))),
            ObjectKind::Triggers => metadata
                .triggers
                .extend(record(issues, block, kind, TriggerExtractor.extract_block(block))),
            ObjectKind::Constraints => metadata.constraints.extend(
                record(issues, block, kind, ConstraintExtractor.extract_block(block))
                    .into_iter()
                    .flatten(),
            ),
            ObjectKind::Partitions => metadata.partitions.extend(record(
                issues,
                block,
                kind,
                PartitionExtractor.extract_block(block),
            )),
            ObjectKind::Comments(_) => metadata
                .comments
                .extend(record(issues, block, kind, CommentExtractor.extract_block(block))),
        }
    }

    apply_comment_fallbacks(&mut metadata);
    metadata
}

/// Move an outcome's issues into the aggregate and hand back its definition.
fn record<T>(
    issues: &mut Vec<LocatedIssue>,
    block: &StatementBlock,
    kind: ObjectKind,
    outcome: ExtractionOutcome<T>,
) -> Option<T> {
    if !outcome.is_success() {
        debug!(
            line = block.start_line,
            kind = %kind,
            issues = outcome.issues.len(),
            "Statement could not be extracted"
        );
    }
    let definition = if outcome.has_errors() {
        None
    } else {
        outcome.definition
    };
    issues.extend(outcome.issues.into_iter().map(|issue| LocatedIssue {
        issue,
        object_kind: kind,
        start_line: block.start_line,
        end_line: block.end_line,
        source_path: block.source_path.clone(),
    }));
    definition
}

/// Copy `COMMENT ON TABLE/VIEW/COLUMN` text into annotations that lack a description.
///
/// The last comment on a target wins, so a trailing `IS NULL` suppresses
/// earlier text.
pub(super) fn apply_comment_fallbacks(metadata: &mut SchemaMetadata) {
    let mut seen = HashSet::new();

    for comment in metadata.comments.iter().rev() {
        let key = (
            comment.object_type,
            comment.schema.as_deref().map(str::to_lowercase),
            comment.table_name.as_deref().map(str::to_lowercase),
            comment.name.to_lowercase(),
        );
        if !seen.insert(key) {
            continue;
        }
        let Some(text) = comment.comment.as_deref() else {
            continue;
        };
        let schema = comment.schema.as_deref();

        match comment.object_type {
            CommentObjectType::Table => {
                for table in metadata.tables.iter_mut().filter(|t| {
                    t.name.eq_ignore_ascii_case(&comment.name)
                        && schema_matches(t.schema.as_deref(), schema)
                }) {
                    table.annotations =
                        std::mem::take(&mut table.annotations).with_fallback_comment(Some(text));
                }
            }
            CommentObjectType::View => {
                for view in metadata.views.iter_mut().filter(|v| {
                    v.name.eq_ignore_ascii_case(&comment.name)
                        && schema_matches(v.schema.as_deref(), schema)
                }) {
                    view.annotations =
                        std::mem::take(&mut view.annotations).with_fallback_comment(Some(text));
                }
            }
            CommentObjectType::Column => {
                let Some(table_name) = comment.table_name.as_deref() else {
                    continue;
                };
                let table_columns = metadata
                    .tables
                    .iter_mut()
                    .filter(|t| {
                        t.name.eq_ignore_ascii_case(table_name)
                            && schema_matches(t.schema.as_deref(), schema)
                    })
                    .flat_map(|t| t.columns.iter_mut());
                let added_columns = metadata.columns.iter_mut().filter(|c| {
                    c.table_name
                        .as_deref()
                        .is_some_and(|t| t.eq_ignore_ascii_case(table_name))
                        && schema_matches(c.schema.as_deref(), schema)
                });
                for column in table_columns
                    .chain(added_columns)
                    .filter(|c| c.name.eq_ignore_ascii_case(&comment.name))
                {
                    column.annotations =
                        std::mem::take(&mut column.annotations).with_fallback_comment(Some(text));
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::codes;
    use crate::parser::extract_blocks;

    fn build(sql: &str) -> SchemaMetadata {
        build_metadata(&extract_blocks(sql, None))
    }

    #[test]
    fn test_blocks_dispatch_by_kind_in_order() {
        let metadata = build(
            "CREATE TABLE a (id int);\n\
             CREATE TABLE b (id int);\n\
             CREATE VIEW v AS SELECT id FROM a;\n\
             CREATE INDEX ON b (id);\n\
             CREATE TYPE mood AS ENUM ('ok');\n\
             INSERT INTO a VALUES (1);",
        );
        let names: Vec<&str> = metadata.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(metadata.views.len(), 1);
        assert_eq!(metadata.indexes.len(), 1);
        assert_eq!(metadata.enum_types.len(), 1);
        assert_eq!(metadata.object_count(), 5);
    }

    #[test]
    fn test_failed_block_keeps_later_blocks() {
        let metadata = build(
            "CREATE TYPE broken AS ENUM ();\nCREATE TABLE t (id int);",
        );
        assert!(metadata.enum_types.is_empty());
        assert_eq!(metadata.tables.len(), 1);
        let issue = metadata.errors().next().unwrap();
        assert_eq!(issue.issue.code, codes::ENUM_EMPTY_VALUES);
        assert_eq!(issue.start_line, 1);
        assert_eq!(issue.object_kind, ObjectKind::Types(TypeKind::Enum));
    }

    #[test]
    fn test_alter_table_additions_are_collected() {
        let metadata = build(
            "CREATE TABLE t (id int);\n\
             ALTER TABLE t ADD COLUMN c int, ADD COLUMN d text;\n\
             ALTER TABLE t ADD CONSTRAINT t_pk PRIMARY KEY (id), ADD CONSTRAINT t_c_key UNIQUE (c);",
        );
        let columns: Vec<&str> = metadata.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, vec!["c", "d"]);
        assert_eq!(metadata.columns[0].table_name.as_deref(), Some("t"));
        let constraints: Vec<&str> =
            metadata.constraints.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(constraints, vec!["t_pk", "t_c_key"]);
        assert!(!metadata.has_errors());
    }

    #[test]
    fn test_comment_on_fills_missing_descriptions() {
        let metadata = build(
            "CREATE TABLE orders (\n    id int, -- comment: Key\n    total numeric\n);\n\
             COMMENT ON TABLE orders IS 'All orders';\n\
             COMMENT ON COLUMN orders.id IS 'Ignored';\n\
             COMMENT ON COLUMN public.orders.total IS 'Gross total';",
        );
        let table = &metadata.tables[0];
        assert_eq!(table.annotations.comment.as_deref(), Some("All orders"));
        assert_eq!(table.columns[0].annotations.comment.as_deref(), Some("Key"));
        assert_eq!(table.columns[1].annotations.comment.as_deref(), Some("Gross total"));
        assert_eq!(metadata.comments.len(), 3);
    }

    #[test]
    fn test_last_comment_wins() {
        let metadata = build(
            "CREATE VIEW v AS SELECT 1;\n\
             COMMENT ON VIEW v IS 'first';\n\
             COMMENT ON VIEW v IS NULL;",
        );
        assert_eq!(metadata.views[0].annotations.comment, None);
    }
}
