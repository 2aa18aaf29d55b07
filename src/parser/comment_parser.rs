//! `COMMENT ON` parsing
//!
//! ```sql
//! COMMENT ON TABLE [schema.]table IS 'text'
//! COMMENT ON COLUMN [schema.]table.column IS 'text'
//! COMMENT ON TRIGGER name ON [schema.]table IS 'text'
//! COMMENT ON FUNCTION [schema.]name (arg types) IS NULL
//! ```

use super::block_extractor::StatementBlock;
use super::extractor::{tokenize, Extractor};
use super::object_detector::ObjectKind;
use super::token_parser_base::TokenParser;
use crate::model::{
    codes, CommentDefinition, CommentObjectType, ExtractionOutcome, ValidationIssue,
};

/// Object words after `COMMENT ON`, longest spelling first
const OBJECT_WORDS: &[(&[&str], CommentObjectType)] = &[
    (&["MATERIALIZED", "VIEW"], CommentObjectType::View),
    (&["TABLE"], CommentObjectType::Table),
    (&["COLUMN"], CommentObjectType::Column),
    (&["INDEX"], CommentObjectType::Index),
    (&["VIEW"], CommentObjectType::View),
    (&["FUNCTION"], CommentObjectType::Function),
    (&["PROCEDURE"], CommentObjectType::Function),
    (&["TRIGGER"], CommentObjectType::Trigger),
    (&["CONSTRAINT"], CommentObjectType::Constraint),
    (&["TYPE"], CommentObjectType::Type),
    (&["DOMAIN"], CommentObjectType::Type),
];

/// The object a comment is attached to
struct CommentTarget {
    name: String,
    schema: Option<String>,
    table_name: Option<String>,
}

/// Token parser for COMMENT ON
pub struct CommentTokenParser<'a> {
    base: TokenParser<'a>,
}

impl<'a> CommentTokenParser<'a> {
    pub fn new(base: TokenParser<'a>) -> Self {
        Self { base }
    }

    pub fn parse(mut self, block: &StatementBlock) -> ExtractionOutcome<CommentDefinition> {
        self.base.skip_whitespace();
        self.base.expect_word_ci("COMMENT");
        self.base.expect_word_ci("ON");

        let Some(object_type) = self.parse_object_type() else {
            let word = self.base.current_keyword().unwrap_or_default();
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::COMMENT_UNSUPPORTED_OBJECT,
                format!("COMMENT ON {} is not supported", word),
            ));
        };

        let Some(target) = self.parse_target(object_type) else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::COMMENT_MISSING_TARGET,
                format!("COMMENT ON {:?} does not name its target", object_type),
            ));
        };

        self.base.skip_whitespace();
        let mut issues = Vec::new();
        let comment = if self.base.expect_word_ci("IS").is_none() {
            None
        } else if self.base.check_word_ci("NULL") {
            issues.push(ValidationIssue::info(
                codes::COMMENT_CLEARED,
                format!("Comment on {} is cleared", target.name),
            ));
            return ExtractionOutcome::success(
                self.definition(block, object_type, target, None),
                issues,
            );
        } else {
            self.base.parse_string_literal()
        };

        match comment {
            Some(text) => ExtractionOutcome::success(
                self.definition(block, object_type, target, Some(text)),
                issues,
            ),
            None => ExtractionOutcome::failure(ValidationIssue::error(
                codes::COMMENT_MISSING_TEXT,
                format!("COMMENT ON {} has no IS 'text' clause", target.name),
            )),
        }
    }

    fn parse_object_type(&mut self) -> Option<CommentObjectType> {
        OBJECT_WORDS
            .iter()
            .find(|(words, _)| self.base.consume_words_ci(words))
            .map(|(_, object_type)| *object_type)
    }

    fn parse_target(&mut self, object_type: CommentObjectType) -> Option<CommentTarget> {
        match object_type {
            CommentObjectType::Column => {
                let mut parts = self.base.parse_name_parts()?;
                if parts.len() < 2 {
                    return None;
                }
                let name = parts.pop()?;
                let table = parts.pop()?;
                Some(CommentTarget {
                    name,
                    schema: parts.pop(),
                    table_name: Some(table),
                })
            }
            CommentObjectType::Trigger | CommentObjectType::Constraint => {
                let name = self.base.parse_identifier()?;
                self.base.skip_whitespace();
                self.base.expect_word_ci("ON")?;
                let (schema, table) = self.base.parse_qualified_name()?;
                Some(CommentTarget {
                    name,
                    schema,
                    table_name: Some(table),
                })
            }
            CommentObjectType::Function => {
                let (schema, name) = self.base.parse_qualified_name()?;
                self.base.skip_whitespace();
                if self.base.check_token(&sqlparser::tokenizer::Token::LParen) {
                    self.base.skip_group()?;
                }
                Some(CommentTarget {
                    name,
                    schema,
                    table_name: None,
                })
            }
            _ => {
                let (schema, name) = self.base.parse_qualified_name()?;
                Some(CommentTarget {
                    name,
                    schema,
                    table_name: None,
                })
            }
        }
    }

    fn definition(
        &self,
        block: &StatementBlock,
        object_type: CommentObjectType,
        target: CommentTarget,
        comment: Option<String>,
    ) -> CommentDefinition {
        CommentDefinition {
            object_type,
            name: target.name,
            schema: target.schema,
            table_name: target.table_name,
            comment,
            original_sql: block.content.clone(),
            source: block.source_location(),
        }
    }
}

/// Extracts `COMMENT ON` statements of every supported object kind
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentExtractor;

impl Extractor for CommentExtractor {
    type Definition = CommentDefinition;

    fn accepts(&self, kind: ObjectKind) -> bool {
        matches!(kind, ObjectKind::Comments(_))
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<CommentDefinition> {
        match tokenize(block) {
            Ok(base) => CommentTokenParser::new(base).parse(block),
            Err(issue) => ExtractionOutcome::failure(issue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(sql: &str) -> ExtractionOutcome<CommentDefinition> {
        CommentExtractor.extract_sql(sql)
    }

    #[test]
    fn test_table_comment() {
        let c = extract("COMMENT ON TABLE sales.orders IS 'Customer orders'")
            .definition
            .unwrap();
        assert_eq!(c.object_type, CommentObjectType::Table);
        assert_eq!(c.name, "orders");
        assert_eq!(c.schema.as_deref(), Some("sales"));
        assert_eq!(c.comment.as_deref(), Some("Customer orders"));
    }

    #[test]
    fn test_column_comment_splits_target() {
        let c = extract("COMMENT ON COLUMN sales.orders.total IS 'Order total, tax included'")
            .definition
            .unwrap();
        assert_eq!(c.object_type, CommentObjectType::Column);
        assert_eq!(c.name, "total");
        assert_eq!(c.table_name.as_deref(), Some("orders"));
        assert_eq!(c.schema.as_deref(), Some("sales"));

        let c = extract("COMMENT ON COLUMN orders.\"Total\" IS $$x$$")
            .definition
            .unwrap();
        assert_eq!(c.name, "Total");
        assert_eq!(c.schema, None);
        assert_eq!(c.comment.as_deref(), Some("x"));
    }

    #[test]
    fn test_trigger_and_function_targets() {
        let c = extract("COMMENT ON TRIGGER audit_orders ON sales.orders IS 'Audit'")
            .definition
            .unwrap();
        assert_eq!(c.name, "audit_orders");
        assert_eq!(c.table_name.as_deref(), Some("orders"));
        assert_eq!(c.schema.as_deref(), Some("sales"));

        let c = extract("COMMENT ON FUNCTION util.add(int, int) IS 'Adds'")
            .definition
            .unwrap();
        assert_eq!(c.object_type, CommentObjectType::Function);
        assert_eq!(c.name, "add");
        assert_eq!(c.comment.as_deref(), Some("Adds"));
    }

    #[test]
    fn test_materialized_view_comment() {
        let c = extract("COMMENT ON MATERIALIZED VIEW daily_totals IS 'Refreshed nightly'")
            .definition
            .unwrap();
        assert_eq!(c.object_type, CommentObjectType::View);
        assert_eq!(c.name, "daily_totals");
    }

    #[test]
    fn test_is_null_clears_comment() {
        let outcome = extract("COMMENT ON TABLE orders IS NULL");
        assert!(outcome.is_success());
        assert!(outcome.has_code(codes::COMMENT_CLEARED));
        assert_eq!(outcome.definition.unwrap().comment, None);
    }

    #[test]
    fn test_comment_errors() {
        assert!(extract("COMMENT ON COLUMN orders IS 'x'").has_code(codes::COMMENT_MISSING_TARGET));
        assert!(extract("COMMENT ON TABLE orders").has_code(codes::COMMENT_MISSING_TEXT));
        assert!(extract("COMMENT ON TABLE orders IS 42").has_code(codes::COMMENT_MISSING_TEXT));

        let block = StatementBlock::from_sql("COMMENT ON SCHEMA billing IS 'x'").unwrap();
        let outcome = CommentExtractor.extract_block(&block);
        assert!(outcome.has_code(codes::COMMENT_UNSUPPORTED_OBJECT));
    }
}
