//! Token-based column definition parsing for PostgreSQL
//!
//! The grammar is shared by `CREATE TABLE` column lists and
//! `ALTER TABLE ... ADD COLUMN`.
//!
//! ## Supported Syntax
//!
//! ```sql
//! name type [COLLATE collation]
//!     [CONSTRAINT name] NOT NULL | NULL
//!     | DEFAULT expr
//!     | PRIMARY KEY | UNIQUE [NULLS [NOT] DISTINCT]
//!     | REFERENCES table [(column)] [MATCH type] [ON DELETE action] [ON UPDATE action]
//!     | CHECK (expr) [NO INHERIT]
//!     | GENERATED {ALWAYS | BY DEFAULT} AS IDENTITY [(sequence options)]
//!     | GENERATED ALWAYS AS (expr) STORED
//!     [[NOT] DEFERRABLE] [INITIALLY {DEFERRED | IMMEDIATE}]
//! ```

use sqlparser::tokenizer::Token;

use super::block_extractor::StatementBlock;
use super::extractor::{check_identifier_length, tokenize, Extractor};
use super::object_detector::ObjectKind;
use super::token_parser_base::TokenParser;
use super::type_expression::{parse_type_expression, TypeExpression};
use crate::model::{
    codes, ColumnDefinition, ColumnReference, ExtractionOutcome, IdentityGeneration,
    ReferentialAction, SourceLocation, ValidationIssue,
};

/// Words that end a column's type and start a constraint clause
const COLUMN_CONSTRAINT_WORDS: &[&str] = &[
    "CHECK",
    "COLLATE",
    "CONSTRAINT",
    "DEFAULT",
    "DEFERRABLE",
    "GENERATED",
    "INITIALLY",
    "NOT",
    "NULL",
    "PRIMARY",
    "REFERENCES",
    "UNIQUE",
];

/// Result of parsing a column definition using tokens
#[derive(Debug, Clone, Default)]
pub struct TokenParsedColumn {
    pub name: String,
    /// Type text as written (e.g. `numeric(12, 2)`, `text[]`)
    pub data_type: String,
    pub type_expression: Option<TypeExpression>,
    /// Some(true) = explicit NULL, Some(false) = explicit NOT NULL, None = implicit
    pub nullability: Option<bool>,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub default_value: Option<String>,
    pub identity_generation: Option<IdentityGeneration>,
    pub generated_expression: Option<String>,
    pub collation: Option<String>,
    pub check_expression: Option<String>,
    pub references: Option<ColumnReference>,
    /// Names given with `CONSTRAINT name`
    pub constraint_names: Vec<String>,
    /// Definition text as written
    pub original: String,
    /// Content-relative line of the column name
    pub start_line: usize,
    /// Content-relative line of the last token
    pub end_line: usize,
}

impl TokenParsedColumn {
    pub fn is_serial(&self) -> bool {
        self.type_expression
            .as_ref()
            .is_some_and(TypeExpression::is_serial)
    }

    pub fn is_identity(&self) -> bool {
        self.identity_generation.is_some() || self.is_serial()
    }

    /// Identity, serial and primary key columns are implicitly NOT NULL.
    pub fn is_nullable(&self) -> bool {
        self.nullability != Some(false) && !self.is_primary_key && !self.is_identity()
    }

    /// Convert into a definition, attaching the inline comment on the column's lines.
    pub fn into_definition(
        self,
        block: &StatementBlock,
        schema: Option<String>,
        table_name: Option<String>,
    ) -> ColumnDefinition {
        let start_line = block.absolute_line(self.start_line);
        let end_line = block.absolute_line(self.end_line);
        let annotations = block
            .inline_comment_between(start_line, end_line)
            .map(|comment| comment.annotations.clone())
            .unwrap_or_default();
        let is_nullable = self.is_nullable();
        let is_identity = self.is_identity();
        let expr = self.type_expression.as_ref();
        let max_length = expr.and_then(|t| t.length);
        let numeric_precision = expr.and_then(|t| t.precision);
        let numeric_scale = expr.and_then(|t| t.scale);
        let is_array = expr.is_some_and(TypeExpression::is_array);

        ColumnDefinition {
            max_length,
            numeric_precision,
            numeric_scale,
            is_array,
            name: self.name,
            schema,
            table_name,
            data_type: self.data_type,
            type_expression: self.type_expression,
            is_nullable,
            is_primary_key: self.is_primary_key,
            is_unique: self.is_unique,
            default_value: self.default_value,
            is_identity,
            identity_generation: self.identity_generation,
            generated_expression: self.generated_expression,
            collation: self.collation,
            check_expression: self.check_expression,
            references: self.references,
            annotations,
            original_sql: self.original,
            source: SourceLocation {
                source_path: block.source_path.clone(),
                start_line,
                end_line,
            },
        }
    }
}

/// Token-based column definition parser
pub struct ColumnTokenParser<'a> {
    base: TokenParser<'a>,
}

impl<'a> ColumnTokenParser<'a> {
    /// Create a parser over an already tokenized column definition.
    pub fn from_parser(base: TokenParser<'a>) -> Self {
        Self { base }
    }

    /// Parse the column definition and return the result.
    pub fn parse(&mut self) -> Option<TokenParsedColumn> {
        self.base.skip_whitespace();
        if self.base.is_at_end() {
            return None;
        }
        let start_line = self.base.line_at(self.base.pos());
        let original = self.base.rest_text().to_string();

        let name = self.base.parse_identifier()?;
        self.base.skip_whitespace();

        let type_start = self.base.pos();
        self.base.skip_to_top_level_word(COLUMN_CONSTRAINT_WORDS);
        let data_type = self.base.text(type_start, self.base.pos()).to_string();
        let type_expression = parse_type_expression(&data_type)?;

        let mut result = TokenParsedColumn {
            name,
            data_type,
            type_expression: Some(type_expression),
            original,
            start_line,
            end_line: self.base.last_code_line(),
            ..Default::default()
        };

        self.parse_column_constraints(&mut result)?;
        Some(result)
    }

    /// Parse constraint clauses in any order. Unknown text fails the column.
    fn parse_column_constraints(&mut self, result: &mut TokenParsedColumn) -> Option<()> {
        loop {
            self.base.skip_whitespace();
            if self.base.is_at_end() {
                return Some(());
            }

            if self.base.expect_word_ci("CONSTRAINT").is_some() {
                result.constraint_names.push(self.base.parse_identifier()?);
            } else if self.base.consume_words_ci(&["NOT", "NULL"]) {
                result.nullability = Some(false);
            } else if self.base.expect_word_ci("NULL").is_some() {
                result.nullability = Some(true);
            } else if self.base.expect_word_ci("DEFAULT").is_some() {
                result.default_value = Some(self.parse_default_expression()?);
            } else if self.base.consume_words_ci(&["PRIMARY", "KEY"]) {
                result.is_primary_key = true;
                skip_index_parameters(&mut self.base);
            } else if self.base.expect_word_ci("UNIQUE").is_some() {
                result.is_unique = true;
                if !self.base.consume_words_ci(&["NULLS", "NOT", "DISTINCT"]) {
                    self.base.consume_words_ci(&["NULLS", "DISTINCT"]);
                }
                skip_index_parameters(&mut self.base);
            } else if self.base.expect_word_ci("REFERENCES").is_some() {
                result.references = Some(self.parse_references()?);
            } else if self.base.expect_word_ci("CHECK").is_some() {
                result.check_expression = Some(self.base.consume_parenthesized()?.to_string());
                self.base.skip_whitespace();
                self.base.consume_words_ci(&["NO", "INHERIT"]);
            } else if self.base.expect_word_ci("GENERATED").is_some() {
                self.parse_generated(result)?;
            } else if self.base.expect_word_ci("COLLATE").is_some() {
                let parts = self.base.parse_name_parts()?;
                result.collation = Some(parts.join("."));
            } else if self.base.consume_words_ci(&["NOT", "DEFERRABLE"])
                || self.base.expect_word_ci("DEFERRABLE").is_some()
            {
                continue;
            } else if self.base.expect_word_ci("INITIALLY").is_some() {
                if self.base.expect_word_ci("DEFERRED").is_none() {
                    self.base.expect_word_ci("IMMEDIATE")?;
                }
            } else {
                return None;
            }
        }
    }

    /// `DEFAULT` runs until the next constraint clause at depth 0.
    fn parse_default_expression(&mut self) -> Option<String> {
        let start = self.base.pos();
        if self.base.check_token(&Token::LParen) {
            self.base.skip_group()?;
        } else {
            self.base.advance();
        }
        self.base.skip_to_top_level_word(COLUMN_CONSTRAINT_WORDS);
        let expression = self.base.text(start, self.base.pos());
        if expression.is_empty() {
            None
        } else {
            Some(expression.to_string())
        }
    }

    fn parse_references(&mut self) -> Option<ColumnReference> {
        let (schema, table) = self.base.parse_qualified_name()?;
        self.base.skip_whitespace();
        let column = if self.base.check_token(&Token::LParen) {
            let inner = self.base.consume_parenthesized()?;
            Some(super::identifier_utils::normalize_identifier(inner))
        } else {
            None
        };
        let actions = parse_foreign_key_actions(&mut self.base);
        Some(ColumnReference {
            table,
            schema,
            column,
            on_delete: actions.on_delete.first().copied(),
            on_update: actions.on_update.first().copied(),
        })
    }

    fn parse_generated(&mut self, result: &mut TokenParsedColumn) -> Option<()> {
        let generation = if self.base.expect_word_ci("ALWAYS").is_some() {
            IdentityGeneration::Always
        } else if self.base.consume_words_ci(&["BY", "DEFAULT"]) {
            IdentityGeneration::ByDefault
        } else {
            return None;
        };
        self.base.expect_word_ci("AS")?;

        if self.base.expect_word_ci("IDENTITY").is_some() {
            result.identity_generation = Some(generation);
            if self.base.check_token(&Token::LParen) {
                self.base.skip_group()?;
            }
            return Some(());
        }

        let expression = self.base.consume_parenthesized()?;
        result.generated_expression = Some(expression.to_string());
        self.base.skip_whitespace();
        self.base.expect_word_ci("STORED");
        Some(())
    }
}

/// Foreign key actions; a clause appearing twice is recorded twice.
#[derive(Debug, Default)]
pub(crate) struct ForeignKeyActions {
    pub on_delete: Vec<ReferentialAction>,
    pub on_update: Vec<ReferentialAction>,
    pub match_type: Option<String>,
}

/// Parse `[MATCH type] [ON DELETE action] [ON UPDATE action]` in any order.
pub(crate) fn parse_foreign_key_actions(base: &mut TokenParser<'_>) -> ForeignKeyActions {
    let mut actions = ForeignKeyActions::default();
    loop {
        base.skip_whitespace();
        if base.expect_word_ci("MATCH").is_some() {
            actions.match_type = base.current_keyword();
            base.bump();
        } else if base.consume_words_ci(&["ON", "DELETE"]) {
            match parse_referential_action(base) {
                Some(action) => actions.on_delete.push(action),
                None => break,
            }
        } else if base.consume_words_ci(&["ON", "UPDATE"]) {
            match parse_referential_action(base) {
                Some(action) => actions.on_update.push(action),
                None => break,
            }
        } else {
            break;
        }
    }
    actions
}

/// `CASCADE | RESTRICT | SET NULL | SET DEFAULT | NO ACTION`
pub(crate) fn parse_referential_action(base: &mut TokenParser<'_>) -> Option<ReferentialAction> {
    let action = if base.expect_word_ci("CASCADE").is_some() {
        ReferentialAction::Cascade
    } else if base.expect_word_ci("RESTRICT").is_some() {
        ReferentialAction::Restrict
    } else if base.consume_words_ci(&["SET", "NULL"]) {
        ReferentialAction::SetNull
    } else if base.consume_words_ci(&["SET", "DEFAULT"]) {
        ReferentialAction::SetDefault
    } else if base.consume_words_ci(&["NO", "ACTION"]) {
        ReferentialAction::NoAction
    } else {
        return None;
    };
    // SET NULL (col, ...) column lists
    if base.check_token(&Token::LParen) {
        base.skip_group();
        base.skip_whitespace();
    }
    Some(action)
}

/// Skip `INCLUDE (...)`, `WITH (...)` and `USING INDEX TABLESPACE name`.
pub(crate) fn skip_index_parameters(base: &mut TokenParser<'_>) {
    loop {
        base.skip_whitespace();
        if base.expect_word_ci("INCLUDE").is_some() || base.expect_word_ci("WITH").is_some() {
            if base.skip_group().is_none() {
                return;
            }
        } else if base.consume_words_ci(&["USING", "INDEX", "TABLESPACE"]) {
            base.parse_identifier();
        } else {
            return;
        }
    }
}

/// Parse a single column definition string.
pub fn parse_column_definition_tokens(col_def: &str) -> Option<TokenParsedColumn> {
    let base = TokenParser::new(col_def).ok()?;
    ColumnTokenParser::from_parser(base).parse()
}

/// Extracts the columns added by `ALTER TABLE ... ADD [COLUMN]`
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnExtractor;

impl Extractor for ColumnExtractor {
    type Definition = Vec<ColumnDefinition>;

    fn accepts(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Columns
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<Vec<ColumnDefinition>> {
        let mut base = match tokenize(block) {
            Ok(base) => base,
            Err(issue) => return ExtractionOutcome::failure(issue),
        };

        base.skip_whitespace();
        let table = if base.consume_words_ci(&["ALTER", "TABLE"]) {
            base.consume_words_ci(&["IF", "EXISTS"]);
            base.expect_word_ci("ONLY");
            base.parse_qualified_name()
        } else {
            None
        };
        let Some((schema, table_name)) = table else {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::COLUMN_MISSING_TABLE,
                "ALTER TABLE statement has no table name",
            ));
        };
        base.skip_whitespace();
        base.expect_token(&Token::Mul);

        let mut columns = Vec::new();
        let mut issues = Vec::new();
        for (start, end) in base.split_top_level(base.pos(), base.len()) {
            let mut action = base.slice(start, end);
            action.skip_whitespace();
            if action.expect_word_ci("ADD").is_none() {
                continue;
            }
            let explicit_column = action.expect_word_ci("COLUMN").is_some();
            if !explicit_column
                && action.check_any_word_ci(&["CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "CHECK", "EXCLUDE"])
            {
                continue;
            }
            action.consume_words_ci(&["IF", "NOT", "EXISTS"]);

            let item_text = action.rest_text().to_string();
            let column_tokens = action.slice(action.pos(), action.len());
            match ColumnTokenParser::from_parser(column_tokens).parse() {
                Some(parsed) => {
                    check_identifier_length("Column", &parsed.name, &mut issues);
                    columns.push(parsed.into_definition(
                        block,
                        schema.clone(),
                        Some(table_name.clone()),
                    ));
                }
                None => issues.push(ValidationIssue::error(
                    codes::COLUMN_INVALID_DEFINITION,
                    format!("Invalid column definition '{}'", item_text),
                )),
            }
        }

        if issues.iter().any(ValidationIssue::is_error) {
            return ExtractionOutcome::failure_with(issues);
        }
        if columns.is_empty() {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::COLUMN_NO_COLUMNS,
                format!("ALTER TABLE {} adds no columns", table_name),
            ));
        }
        ExtractionOutcome::success(columns, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_column() {
        let col = parse_column_definition_tokens("id integer").unwrap();
        assert_eq!(col.name, "id");
        assert_eq!(col.data_type, "integer");
        assert!(col.is_nullable());
        assert!(!col.is_identity());
    }

    #[test]
    fn test_not_null_default() {
        let col = parse_column_definition_tokens("created_at timestamptz NOT NULL DEFAULT now()").unwrap();
        assert_eq!(col.nullability, Some(false));
        assert_eq!(col.default_value.as_deref(), Some("now()"));
        assert!(!col.is_nullable());
    }

    #[test]
    fn test_default_before_not_null() {
        let col = parse_column_definition_tokens("status text DEFAULT 'new'::text NOT NULL").unwrap();
        assert_eq!(col.default_value.as_deref(), Some("'new'::text"));
        assert_eq!(col.nullability, Some(false));
    }

    #[test]
    fn test_default_null() {
        let col = parse_column_definition_tokens("note text DEFAULT NULL").unwrap();
        assert_eq!(col.default_value.as_deref(), Some("NULL"));
        assert!(col.is_nullable());
    }

    #[test]
    fn test_multi_word_type_with_modifiers() {
        let col = parse_column_definition_tokens("amount numeric(12, 2) CHECK (amount >= 0)").unwrap();
        assert_eq!(col.data_type, "numeric(12, 2)");
        let expr = col.type_expression.as_ref().unwrap();
        assert_eq!(expr.precision, Some(12));
        assert_eq!(col.check_expression.as_deref(), Some("amount >= 0"));

        let col = parse_column_definition_tokens("seen timestamp with time zone NULL").unwrap();
        assert_eq!(
            col.type_expression.unwrap().base_type,
            "TIMESTAMP WITH TIME ZONE"
        );
        assert_eq!(col.nullability, Some(true));
    }

    #[test]
    fn test_serial_is_identity_and_not_null() {
        let col = parse_column_definition_tokens("id bigserial PRIMARY KEY").unwrap();
        assert!(col.is_serial());
        assert!(col.is_identity());
        assert!(col.is_primary_key);
        assert!(!col.is_nullable());
    }

    #[test]
    fn test_identity_column() {
        let col = parse_column_definition_tokens(
            "id int GENERATED BY DEFAULT AS IDENTITY (START WITH 10 INCREMENT BY 5)",
        )
        .unwrap();
        assert_eq!(col.identity_generation, Some(IdentityGeneration::ByDefault));
        assert!(!col.is_nullable());
    }

    #[test]
    fn test_generated_stored_column() {
        let col = parse_column_definition_tokens(
            "total numeric GENERATED ALWAYS AS (price * qty) STORED",
        )
        .unwrap();
        assert_eq!(col.generated_expression.as_deref(), Some("price * qty"));
        assert_eq!(col.identity_generation, None);
    }

    #[test]
    fn test_references_with_actions() {
        let col = parse_column_definition_tokens(
            "customer_id int CONSTRAINT fk_customer REFERENCES sales.customers (id) ON DELETE CASCADE ON UPDATE SET NULL",
        )
        .unwrap();
        assert_eq!(col.constraint_names, vec!["fk_customer"]);
        let reference = col.references.unwrap();
        assert_eq!(reference.table, "customers");
        assert_eq!(reference.schema.as_deref(), Some("sales"));
        assert_eq!(reference.column.as_deref(), Some("id"));
        assert_eq!(reference.on_delete, Some(ReferentialAction::Cascade));
        assert_eq!(reference.on_update, Some(ReferentialAction::SetNull));
    }

    #[test]
    fn test_collate_and_array() {
        let col = parse_column_definition_tokens("tags text[] COLLATE \"C\" NOT NULL").unwrap();
        assert_eq!(col.collation.as_deref(), Some("C"));
        assert!(col.type_expression.unwrap().is_array());
    }

    #[test]
    fn test_unique_nulls_not_distinct() {
        let col = parse_column_definition_tokens("code text UNIQUE NULLS NOT DISTINCT").unwrap();
        assert!(col.is_unique);
    }

    #[test]
    fn test_invalid_column() {
        assert!(parse_column_definition_tokens("").is_none());
        assert!(parse_column_definition_tokens("name").is_none());
        assert!(parse_column_definition_tokens("x int CHECK").is_none());
    }

    #[test]
    fn test_column_extractor_add_columns() {
        let outcome = ColumnExtractor.extract_sql(
            "ALTER TABLE ONLY app.users\n  ADD COLUMN email text NOT NULL, -- comment: login;\n  ADD IF NOT EXISTS age int",
        );
        assert!(outcome.is_success(), "{:?}", outcome.issues);
        let columns = outcome.definition.unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "email");
        assert_eq!(columns[0].table_name.as_deref(), Some("users"));
        assert_eq!(columns[0].schema.as_deref(), Some("app"));
        assert_eq!(columns[0].annotations.comment.as_deref(), Some("login"));
        assert_eq!(columns[0].source.start_line, 2);
        assert_eq!(columns[1].name, "age");
        assert!(columns[1].annotations.is_empty());
    }

    #[test]
    fn test_column_extractor_invalid_definition() {
        let outcome = ColumnExtractor.extract_sql("ALTER TABLE t ADD COLUMN broken");
        assert!(!outcome.is_success());
        assert!(outcome.has_code(codes::COLUMN_INVALID_DEFINITION));
    }

    #[test]
    fn test_column_extractor_rejects_other_statements() {
        let outcome = ColumnExtractor.extract_sql("ALTER TABLE t DROP COLUMN c");
        assert!(outcome.has_code(codes::NO_MATCHING_STATEMENT));
    }
}
