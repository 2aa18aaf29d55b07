//! Enum and composite type parsing
//!
//! ```sql
//! CREATE TYPE name AS ENUM ('label' [, ...])
//! CREATE TYPE name AS (attribute data_type [COLLATE collation] [, ...])
//! ```

use std::collections::HashSet;

use super::block_extractor::StatementBlock;
use super::extractor::{check_identifier_length, tokenize, Extractor};
use super::identifier_utils::MAX_IDENTIFIER_BYTES;
use super::object_detector::{ObjectKind, TypeKind};
use super::token_parser_base::TokenParser;
use super::type_expression::parse_type_expression;
use crate::model::{
    codes, CompositeAttribute, CompositeTypeDefinition, EnumTypeDefinition, ExtractionOutcome,
    ValidationIssue,
};

/// Enums with more labels than this get a warning
pub const MAX_ENUM_VALUES: usize = 100;

/// Composite types with more attributes than this get a warning
pub const MAX_COMPOSITE_ATTRIBUTES: usize = 100;

/// `CREATE TYPE name AS`, leaving the parser after `AS`.
fn parse_type_head(base: &mut TokenParser<'_>) -> Option<(Option<String>, String)> {
    base.skip_whitespace();
    base.expect_word_ci("CREATE")?;
    base.expect_word_ci("TYPE")?;
    if base.check_word_ci("AS") {
        return None;
    }
    let name = base.parse_qualified_name()?;
    base.skip_whitespace();
    base.expect_word_ci("AS")?;
    Some(name)
}

/// Extracts `CREATE TYPE ... AS ENUM`
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumTypeExtractor;

impl Extractor for EnumTypeExtractor {
    type Definition = EnumTypeDefinition;

    fn accepts(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Types(TypeKind::Enum)
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<EnumTypeDefinition> {
        let mut base = match tokenize(block) {
            Ok(base) => base,
            Err(issue) => return ExtractionOutcome::failure(issue),
        };
        let Some((schema, name)) = parse_type_head(&mut base) else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::ENUM_MISSING_NAME,
                "CREATE TYPE statement has no type name",
            ));
        };
        let mut issues = Vec::new();
        check_identifier_length("Enum type", &name, &mut issues);

        base.expect_word_ci("ENUM");
        let items = match base.skip_group() {
            Some((start, end)) => base.split_top_level(start, end),
            None => Vec::new(),
        };
        if items.iter().all(|(s, e)| base.text(*s, *e).is_empty()) {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::ENUM_EMPTY_VALUES,
                format!("Enum type {} has no values", name),
            ));
        }

        let mut values = Vec::with_capacity(items.len());
        for (start, end) in items {
            let mut item = base.slice(start, end);
            item.skip_whitespace();
            let value = item.parse_string_literal();
            item.skip_whitespace();
            match value {
                Some(value) if item.is_at_end() => values.push(value),
                _ => {
                    return ExtractionOutcome::failure(ValidationIssue::error(
                        codes::ENUM_INVALID_VALUE,
                        format!(
                            "Enum type {} has a value that is not a string literal: '{}'",
                            name,
                            base.text(start, end)
                        ),
                    ))
                }
            }
        }

        issues.extend(enum_value_warnings(&name, &values));
        ExtractionOutcome::success(
            EnumTypeDefinition {
                name,
                schema,
                values,
                annotations: block.header_annotations(),
                original_sql: block.content.clone(),
                source: block.source_location(),
            },
            issues,
        )
    }
}

fn enum_value_warnings(name: &str, values: &[String]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let mut seen = HashSet::new();
    let mut duplicates: Vec<&str> = Vec::new();
    for value in values {
        if !seen.insert(value.as_str()) && !duplicates.contains(&value.as_str()) {
            duplicates.push(value);
        }
    }
    if !duplicates.is_empty() {
        let quoted: Vec<String> = duplicates.iter().map(|d| format!("'{}'", d)).collect();
        issues.push(ValidationIssue::warning(
            codes::ENUM_DUPLICATE_VALUES,
            format!("Enum type {} repeats values: {}", name, quoted.join(", ")),
        ));
    }
    if values.iter().any(|v| v.is_empty()) {
        issues.push(ValidationIssue::warning(
            codes::ENUM_EMPTY_VALUE,
            format!("Enum type {} contains an empty label", name),
        ));
    }
    if values.len() > MAX_ENUM_VALUES {
        issues.push(ValidationIssue::warning(
            codes::ENUM_TOO_MANY_VALUES,
            format!(
                "Enum type {} has {} values (more than {})",
                name,
                values.len(),
                MAX_ENUM_VALUES
            ),
        ));
    }
    for value in values.iter().filter(|v| v.len() > MAX_IDENTIFIER_BYTES) {
        issues.push(ValidationIssue::warning(
            codes::ENUM_VALUE_TOO_LONG,
            format!(
                "Enum label '{}' is {} bytes; labels are limited to {} bytes",
                value,
                value.len(),
                MAX_IDENTIFIER_BYTES
            ),
        ));
    }
    issues
}

/// Extracts `CREATE TYPE ... AS (...)`
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeTypeExtractor;

impl Extractor for CompositeTypeExtractor {
    type Definition = CompositeTypeDefinition;

    fn accepts(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Types(TypeKind::Composite)
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<CompositeTypeDefinition> {
        let mut base = match tokenize(block) {
            Ok(base) => base,
            Err(issue) => return ExtractionOutcome::failure(issue),
        };
        let Some((schema, name)) = parse_type_head(&mut base) else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::COMPOSITE_MISSING_NAME,
                "CREATE TYPE statement has no type name",
            ));
        };
        let mut issues = Vec::new();
        check_identifier_length("Composite type", &name, &mut issues);

        let items = match base.skip_group() {
            Some((start, end)) => base.split_top_level(start, end),
            None => Vec::new(),
        };
        let items: Vec<(usize, usize)> = items
            .into_iter()
            .filter(|(s, e)| !base.text(*s, *e).is_empty())
            .collect();
        if items.is_empty() {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::COMPOSITE_EMPTY_ATTRIBUTES,
                format!("Composite type {} has no attributes", name),
            ));
        }

        let mut attributes = Vec::with_capacity(items.len());
        for (start, end) in items {
            match parse_attribute(base.slice(start, end), block) {
                Some(attribute) => attributes.push(attribute),
                None => {
                    return ExtractionOutcome::failure(ValidationIssue::error(
                        codes::COMPOSITE_INVALID_ATTRIBUTE,
                        format!(
                            "Invalid attribute '{}' in composite type {}",
                            base.text(start, end),
                            name
                        ),
                    ))
                }
            }
        }

        let mut seen = HashSet::new();
        let duplicates: Vec<&str> = attributes
            .iter()
            .filter(|a| !seen.insert(a.name.to_lowercase()))
            .map(|a| a.name.as_str())
            .collect();
        if !duplicates.is_empty() {
            issues.push(ValidationIssue::warning(
                codes::COMPOSITE_DUPLICATE_ATTRIBUTES,
                format!(
                    "Composite type {} repeats attributes: {}",
                    name,
                    duplicates.join(", ")
                ),
            ));
        }
        if attributes.len() > MAX_COMPOSITE_ATTRIBUTES {
            issues.push(ValidationIssue::warning(
                codes::COMPOSITE_TOO_MANY_ATTRIBUTES,
                format!(
                    "Composite type {} has {} attributes (more than {})",
                    name,
                    attributes.len(),
                    MAX_COMPOSITE_ATTRIBUTES
                ),
            ));
        }

        ExtractionOutcome::success(
            CompositeTypeDefinition {
                name,
                schema,
                attributes,
                annotations: block.header_annotations(),
                original_sql: block.content.clone(),
                source: block.source_location(),
            },
            issues,
        )
    }
}

/// `name data_type [COLLATE collation]`
fn parse_attribute(mut item: TokenParser<'_>, block: &StatementBlock) -> Option<CompositeAttribute> {
    item.skip_whitespace();
    let first_line = block.absolute_line(item.line_at(item.pos()));
    let last_line = block.absolute_line(item.last_code_line());

    let name = item.parse_identifier()?;
    item.skip_whitespace();
    let type_start = item.pos();
    item.skip_to_top_level_word(&["COLLATE"]);
    let data_type = item.text(type_start, item.pos()).to_string();
    let type_expression = parse_type_expression(&data_type)?;

    let collation = if item.expect_word_ci("COLLATE").is_some() {
        Some(item.parse_name_parts()?.join("."))
    } else {
        None
    };
    item.skip_whitespace();
    if !item.is_at_end() {
        return None;
    }

    let annotations = block
        .inline_comment_between(first_line, last_line)
        .map(|c| c.annotations.clone())
        .unwrap_or_default();
    Some(CompositeAttribute {
        name,
        data_type,
        type_expression: Some(type_expression),
        collation,
        annotations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_values_in_order() {
        let outcome = EnumTypeExtractor.extract_sql(
            "-- comment: Order lifecycle\nCREATE TYPE sales.order_status AS ENUM ('pending', 'paid', 'shipped');",
        );
        assert!(outcome.is_success());
        let e = outcome.definition.unwrap();
        assert_eq!(e.name, "order_status");
        assert_eq!(e.schema.as_deref(), Some("sales"));
        assert_eq!(e.values, vec!["pending", "paid", "shipped"]);
        assert_eq!(e.annotations.comment.as_deref(), Some("Order lifecycle"));
    }

    #[test]
    fn test_enum_duplicate_values_warn() {
        let outcome = EnumTypeExtractor.extract_sql("CREATE TYPE t AS ENUM ('a','a')");
        assert!(outcome.is_success());
        let issue = outcome.issue(codes::ENUM_DUPLICATE_VALUES).unwrap();
        assert!(issue.message.contains("'a'"));
    }

    #[test]
    fn test_enum_errors() {
        let outcome = EnumTypeExtractor.extract_sql("CREATE TYPE t AS ENUM ()");
        assert!(!outcome.is_success());
        assert!(outcome.has_code(codes::ENUM_EMPTY_VALUES));

        let outcome = EnumTypeExtractor.extract_sql("CREATE TYPE t AS ENUM ('a', b)");
        assert!(outcome.has_code(codes::ENUM_INVALID_VALUE));
    }

    #[test]
    fn test_enum_value_warnings() {
        let long = "x".repeat(64);
        let outcome =
            EnumTypeExtractor.extract_sql(&format!("CREATE TYPE t AS ENUM ('', '{}')", long));
        assert!(outcome.is_success());
        assert!(outcome.has_code(codes::ENUM_EMPTY_VALUE));
        assert!(outcome.has_code(codes::ENUM_VALUE_TOO_LONG));

        let labels: Vec<String> = (0..101).map(|i| format!("'v{}'", i)).collect();
        let outcome =
            EnumTypeExtractor.extract_sql(&format!("CREATE TYPE t AS ENUM ({})", labels.join(",")));
        assert!(outcome.has_code(codes::ENUM_TOO_MANY_VALUES));
    }

    #[test]
    fn test_composite_attributes() {
        let outcome = CompositeTypeExtractor.extract_sql(
            "CREATE TYPE address AS (\n    street varchar(200), -- comment: Street line\n    city text COLLATE \"C\",\n    zip char(5)[]\n)",
        );
        assert!(outcome.is_success(), "{:?}", outcome.issues);
        let c = outcome.definition.unwrap();
        assert_eq!(c.attributes.len(), 3);
        assert_eq!(c.attributes[0].name, "street");
        assert_eq!(
            c.attributes[0].type_expression.as_ref().unwrap().length,
            Some(200)
        );
        assert_eq!(c.attributes[0].annotations.comment.as_deref(), Some("Street line"));
        assert_eq!(c.attributes[1].collation.as_deref(), Some("C"));
        assert!(c.attributes[2].type_expression.as_ref().unwrap().is_array());
    }

    #[test]
    fn test_composite_errors_and_warnings() {
        assert!(CompositeTypeExtractor
            .extract_sql("CREATE TYPE t AS ()")
            .has_code(codes::COMPOSITE_EMPTY_ATTRIBUTES));
        assert!(CompositeTypeExtractor
            .extract_sql("CREATE TYPE t AS (x)")
            .has_code(codes::COMPOSITE_INVALID_ATTRIBUTE));

        let outcome = CompositeTypeExtractor.extract_sql("CREATE TYPE t AS (a int, A text)");
        assert!(outcome.is_success());
        assert!(outcome.has_code(codes::COMPOSITE_DUPLICATE_ATTRIBUTES));
    }
}
