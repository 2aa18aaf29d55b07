//! Token-based index definition parsing for PostgreSQL
//!
//! ## Supported Syntax
//!
//! ```sql
//! CREATE [UNIQUE] INDEX [CONCURRENTLY] [IF NOT EXISTS] [name] ON [ONLY] table
//!     [USING method] ( { column | (expression) | func(args) }
//!         [COLLATE collation] [opclass [(params)]] [ASC | DESC] [NULLS { FIRST | LAST }] [, ...] )
//!     [INCLUDE (column, ...)] [NULLS [NOT] DISTINCT]
//!     [WITH (param = value, ...)] [TABLESPACE name] [WHERE predicate]
//! ```

use sqlparser::tokenizer::Token;

use super::block_extractor::StatementBlock;
use super::extractor::{check_identifier_length, tokenize, Extractor};
use super::identifier_utils::{default_constraint_name, normalize_identifier};
use super::object_detector::ObjectKind;
use super::token_parser_base::TokenParser;
use crate::model::{
    codes, ExtractionOutcome, IndexColumn, IndexDefinition, IndexMethod, NullsOrder, SortOrder,
    ValidationIssue,
};

/// Token-based index definition parser
pub struct IndexTokenParser<'a> {
    base: TokenParser<'a>,
}

impl<'a> IndexTokenParser<'a> {
    pub fn new(base: TokenParser<'a>) -> Self {
        Self { base }
    }

    pub fn parse(mut self, block: &StatementBlock) -> ExtractionOutcome<IndexDefinition> {
        let mut issues = Vec::new();
        let mut index = IndexDefinition {
            original_sql: block.content.clone(),
            source: block.source_location(),
            ..Default::default()
        };

        self.base.skip_whitespace();
        self.base.expect_word_ci("CREATE");
        index.is_unique = self.base.expect_word_ci("UNIQUE").is_some();
        self.base.expect_word_ci("INDEX");
        index.is_concurrent = self.base.expect_word_ci("CONCURRENTLY").is_some();
        index.if_not_exists = self.base.consume_words_ci(&["IF", "NOT", "EXISTS"]);

        let mut explicit_name = None;
        if !self.base.check_word_ci("ON") {
            if let Some((schema, name)) = self.base.parse_qualified_name() {
                index.schema = schema;
                explicit_name = Some(name);
            }
            self.base.skip_whitespace();
        }

        let table = if self.base.expect_word_ci("ON").is_some() {
            self.base.expect_word_ci("ONLY");
            self.base.parse_qualified_name()
        } else {
            None
        };
        let Some((table_schema, table_name)) = table else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::INDEX_MISSING_TABLE,
                "CREATE INDEX statement has no ON table",
            ));
        };
        index.table_name = table_name;
        if index.schema.is_none() {
            index.schema = table_schema;
        }
        self.base.skip_whitespace();

        if self.base.expect_word_ci("USING").is_some() {
            if let Some(method) = self.base.parse_identifier() {
                index.method = IndexMethod::parse(&method);
                if let IndexMethod::Other(name) = &index.method {
                    issues.push(ValidationIssue::warning(
                        codes::INDEX_UNKNOWN_METHOD,
                        format!("Unknown index method '{}'", name),
                    ));
                }
            }
            self.base.skip_whitespace();
        }

        if let Some((start, end)) = self.base.skip_group() {
            for (s, e) in self.base.split_top_level(start, end) {
                let text = self.base.text(s, e);
                if text.is_empty() {
                    continue;
                }
                match parse_index_element(self.base.slice(s, e)) {
                    Some(column) => index.columns.push(column),
                    None => issues.push(ValidationIssue::error(
                        codes::INDEX_INVALID_ELEMENT,
                        format!("Invalid index element '{}'", text),
                    )),
                }
            }
        }
        if issues.iter().any(ValidationIssue::is_error) {
            return ExtractionOutcome::failure_with(issues);
        }
        if index.columns.is_empty() {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::INDEX_EMPTY_COLUMNS,
                format!("Index on {} has no key columns", index.table_name),
            ));
        }

        self.parse_trailing_clauses(&mut index);

        index.name = match explicit_name {
            Some(name) => {
                check_identifier_length("Index", &name, &mut issues);
                name
            }
            None => {
                let parts: Vec<&str> = index
                    .columns
                    .iter()
                    .map(|c| c.name.as_deref().unwrap_or("expr"))
                    .collect();
                let generated = default_constraint_name(&index.table_name, &parts, "idx");
                issues.push(ValidationIssue::info(
                    codes::INDEX_NAME_GENERATED,
                    format!("Unnamed index on {} named '{}'", index.table_name, generated),
                ));
                generated
            }
        };

        ExtractionOutcome::success(index, issues)
    }

    fn parse_trailing_clauses(&mut self, index: &mut IndexDefinition) {
        loop {
            self.base.skip_whitespace();
            if self.base.expect_word_ci("INCLUDE").is_some() {
                let Some((start, end)) = self.base.skip_group() else {
                    return;
                };
                index.include_columns = self
                    .base
                    .split_top_level(start, end)
                    .into_iter()
                    .map(|(s, e)| normalize_identifier(self.base.text(s, e)))
                    .filter(|c| !c.is_empty())
                    .collect();
            } else if self.base.consume_words_ci(&["NULLS", "NOT", "DISTINCT"]) {
                index.nulls_not_distinct = true;
            } else if self.base.consume_words_ci(&["NULLS", "DISTINCT"]) {
                index.nulls_not_distinct = false;
            } else if self.base.expect_word_ci("WITH").is_some() {
                let Some((start, end)) = self.base.skip_group() else {
                    return;
                };
                index.storage_parameters = self
                    .base
                    .split_top_level(start, end)
                    .into_iter()
                    .map(|(s, e)| self.base.text(s, e).to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
            } else if self.base.expect_word_ci("TABLESPACE").is_some() {
                index.tablespace = self.base.parse_identifier();
            } else if self.base.expect_word_ci("WHERE").is_some() {
                let predicate = self.base.rest_text();
                if !predicate.is_empty() {
                    index.where_clause = Some(predicate.to_string());
                }
                return;
            } else {
                return;
            }
        }
    }
}

/// One key element: a column, a function call or a parenthesized expression,
/// followed by its options.
fn parse_index_element(mut element: TokenParser<'_>) -> Option<IndexColumn> {
    element.skip_whitespace();
    if element.is_at_end() {
        return None;
    }
    let mut column = IndexColumn::default();

    let start = element.pos();
    if element.check_token(&Token::LParen) {
        let inner = element.consume_parenthesized()?;
        column.expression = Some(inner.to_string());
    } else {
        element.parse_name_parts()?;
        let name_end = element.pos();
        element.skip_whitespace();
        if element.check_token(&Token::LParen) {
            element.skip_group()?;
            column.expression = Some(element.text(start, element.pos()).to_string());
        } else {
            column.name = Some(normalize_identifier(element.text(start, name_end)));
        }
    }

    loop {
        element.skip_whitespace();
        if element.is_at_end() {
            break;
        }
        if element.expect_word_ci("COLLATE").is_some() {
            let collation_start = element.pos();
            element.parse_name_parts()?;
            column.collation = Some(element.text(collation_start, element.pos()).to_string());
        } else if element.expect_word_ci("ASC").is_some() {
            column.sort_order = Some(SortOrder::Asc);
        } else if element.expect_word_ci("DESC").is_some() {
            column.sort_order = Some(SortOrder::Desc);
        } else if element.consume_words_ci(&["NULLS", "FIRST"]) {
            column.nulls_order = Some(NullsOrder::First);
        } else if element.consume_words_ci(&["NULLS", "LAST"]) {
            column.nulls_order = Some(NullsOrder::Last);
        } else if matches!(element.current_token(), Some(Token::Word(_))) {
            let class_start = element.pos();
            element.parse_name_parts()?;
            let class_end = element.pos();
            element.skip_whitespace();
            if element.check_token(&Token::LParen) {
                element.skip_group();
            }
            column.operator_class = Some(element.text(class_start, class_end).to_string());
        } else {
            break;
        }
    }
    Some(column)
}

/// Extracts `CREATE INDEX` statements
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexExtractor;

impl Extractor for IndexExtractor {
    type Definition = IndexDefinition;

    fn accepts(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Indexes
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<IndexDefinition> {
        match tokenize(block) {
            Ok(base) => IndexTokenParser::new(base).parse(block),
            Err(issue) => ExtractionOutcome::failure(issue),
        }
    }
}
