//! Token-based table constraint parsing for PostgreSQL
//!
//! Handles table-level constraints inside `CREATE TABLE` and constraints added
//! with `ALTER TABLE ... ADD`:
//!
//! ```sql
//! [CONSTRAINT name] PRIMARY KEY (col, ...) [INCLUDE (...)] [WITH (...)]
//! [CONSTRAINT name] UNIQUE [NULLS [NOT] DISTINCT] (col, ...)
//! [CONSTRAINT name] FOREIGN KEY (col, ...) REFERENCES table [(col, ...)]
//!     [MATCH FULL | PARTIAL | SIMPLE] [ON DELETE action] [ON UPDATE action]
//! [CONSTRAINT name] CHECK (expr) [NO INHERIT]
//! [CONSTRAINT name] EXCLUDE [USING method] (element WITH operator, ...) [WHERE (predicate)]
//!     [[NOT] DEFERRABLE] [INITIALLY DEFERRED | IMMEDIATE] [NOT VALID]
//! ```

use sqlparser::tokenizer::Token;

use super::block_extractor::StatementBlock;
use super::column_parser::{parse_foreign_key_actions, skip_index_parameters};
use super::extractor::{check_identifier_length, tokenize, Extractor};
use super::identifier_utils::{default_constraint_name, normalize_identifier};
use super::object_detector::ObjectKind;
use super::token_parser_base::{string_literal_value, TokenParser};
use crate::model::{
    codes, ConstraintDefinition, ConstraintType, ExtractionOutcome, ReferentialAction,
    SourceLocation, ValidationIssue,
};

/// Result of parsing a table constraint using tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParsedConstraint {
    pub name: Option<String>,
    pub constraint_type: ConstraintType,
    pub columns: Vec<String>,
    pub referenced_table: Option<String>,
    pub referenced_schema: Option<String>,
    pub referenced_columns: Vec<String>,
    pub on_delete: Vec<ReferentialAction>,
    pub on_update: Vec<ReferentialAction>,
    pub match_type: Option<String>,
    pub is_deferrable: bool,
    pub initially_deferred: bool,
    pub check_expression: Option<String>,
    pub exclude_elements: Option<String>,
    pub is_not_valid: bool,
    /// Constraint text as written
    pub original: String,
}

impl TokenParsedConstraint {
    fn new(name: Option<String>, constraint_type: ConstraintType, original: String) -> Self {
        Self {
            name,
            constraint_type,
            columns: Vec::new(),
            referenced_table: None,
            referenced_schema: None,
            referenced_columns: Vec::new(),
            on_delete: Vec::new(),
            on_update: Vec::new(),
            match_type: None,
            is_deferrable: false,
            initially_deferred: false,
            check_expression: None,
            exclude_elements: None,
            is_not_valid: false,
            original,
        }
    }

    /// Build the definition for `table`, generating PostgreSQL's default
    /// name when none was given. Quality warnings are appended to `issues`.
    pub fn into_definition(
        self,
        schema: Option<String>,
        table_name: &str,
        source: SourceLocation,
        issues: &mut Vec<ValidationIssue>,
    ) -> ConstraintDefinition {
        if self.constraint_type == ConstraintType::ForeignKey
            && !self.referenced_columns.is_empty()
            && self.referenced_columns.len() != self.columns.len()
        {
            issues.push(ValidationIssue::warning(
                codes::CONSTRAINT_COLUMN_COUNT_MISMATCH,
                format!(
                    "Foreign key on {} has {} column(s) but references {}",
                    table_name,
                    self.columns.len(),
                    self.referenced_columns.len()
                ),
            ));
        }
        if self.on_delete.len() > 1 || self.on_update.len() > 1 {
            issues.push(ValidationIssue::warning(
                codes::CONSTRAINT_MULTIPLE_ACTIONS,
                format!(
                    "Foreign key on {} repeats ON DELETE or ON UPDATE; the last clause wins",
                    table_name
                ),
            ));
        }

        let name = match self.name {
            Some(name) => {
                check_identifier_length("Constraint", &name, issues);
                name
            }
            None => {
                let columns: Vec<&str> = match self.constraint_type {
                    ConstraintType::PrimaryKey => Vec::new(),
                    ConstraintType::Check | ConstraintType::Exclude => {
                        self.columns.iter().take(1).map(String::as_str).collect()
                    }
                    _ => self.columns.iter().map(String::as_str).collect(),
                };
                let generated = default_constraint_name(
                    table_name,
                    &columns,
                    self.constraint_type.default_name_suffix(),
                );
                issues.push(ValidationIssue::info(
                    codes::CONSTRAINT_NAME_GENERATED,
                    format!("Unnamed constraint on {} named '{}'", table_name, generated),
                ));
                generated
            }
        };

        ConstraintDefinition {
            name,
            schema,
            table_name: table_name.to_string(),
            constraint_type: self.constraint_type,
            columns: self.columns,
            referenced_table: self.referenced_table,
            referenced_schema: self.referenced_schema,
            referenced_columns: self.referenced_columns,
            on_delete: self.on_delete.last().copied(),
            on_update: self.on_update.last().copied(),
            match_type: self.match_type,
            is_deferrable: self.is_deferrable,
            initially_deferred: self.initially_deferred,
            check_expression: self.check_expression,
            exclude_elements: self.exclude_elements,
            is_not_valid: self.is_not_valid,
            original_sql: self.original,
            source,
        }
    }
}

/// Token-based table constraint parser
pub struct ConstraintTokenParser<'a, 'b> {
    base: &'b mut TokenParser<'a>,
}

impl<'a, 'b> ConstraintTokenParser<'a, 'b> {
    pub fn new(base: &'b mut TokenParser<'a>) -> Self {
        Self { base }
    }

    /// Parse one constraint starting at the current position.
    pub fn parse(&mut self) -> Result<TokenParsedConstraint, ValidationIssue> {
        self.base.skip_whitespace();
        let original = self.base.rest_text().to_string();

        let name = if self.base.expect_word_ci("CONSTRAINT").is_some() {
            Some(self.base.parse_identifier().ok_or_else(|| {
                ValidationIssue::error(codes::CONSTRAINT_UNKNOWN_TYPE, "CONSTRAINT without a name")
            })?)
        } else {
            None
        };
        self.base.skip_whitespace();

        let mut constraint = if self.base.consume_words_ci(&["PRIMARY", "KEY"]) {
            let mut c = TokenParsedConstraint::new(name, ConstraintType::PrimaryKey, original);
            c.columns = self.parse_key_columns()?;
            skip_index_parameters(self.base);
            c
        } else if self.base.expect_word_ci("UNIQUE").is_some() {
            if !self.base.consume_words_ci(&["NULLS", "NOT", "DISTINCT"]) {
                self.base.consume_words_ci(&["NULLS", "DISTINCT"]);
            }
            let mut c = TokenParsedConstraint::new(name, ConstraintType::Unique, original);
            c.columns = self.parse_key_columns()?;
            skip_index_parameters(self.base);
            c
        } else if self.base.consume_words_ci(&["FOREIGN", "KEY"]) {
            let mut c = TokenParsedConstraint::new(name, ConstraintType::ForeignKey, original);
            c.columns = self.parse_key_columns()?;
            self.parse_references(&mut c)?;
            c
        } else if self.base.expect_word_ci("CHECK").is_some() {
            let mut c = TokenParsedConstraint::new(name, ConstraintType::Check, original);
            self.parse_check(&mut c)?;
            c
        } else if self.base.expect_word_ci("EXCLUDE").is_some() {
            let mut c = TokenParsedConstraint::new(name, ConstraintType::Exclude, original);
            self.parse_exclude(&mut c)?;
            c
        } else {
            let found = self.base.rest_text().split_whitespace().next().unwrap_or("");
            return Err(ValidationIssue::error(
                codes::CONSTRAINT_UNKNOWN_TYPE,
                format!("Unknown constraint type '{}'", found),
            ));
        };

        self.parse_trailing_options(&mut constraint);
        Ok(constraint)
    }

    /// `(col, ...)`; an absent or empty list is an error.
    fn parse_key_columns(&mut self) -> Result<Vec<String>, ValidationIssue> {
        let columns = self.parse_column_list().unwrap_or_default();
        if columns.is_empty() {
            return Err(ValidationIssue::error(
                codes::CONSTRAINT_EMPTY_COLUMNS,
                "Constraint has no columns",
            ));
        }
        Ok(columns)
    }

    fn parse_column_list(&mut self) -> Option<Vec<String>> {
        self.base.skip_whitespace();
        let (start, end) = self.base.skip_group()?;
        self.base.skip_whitespace();
        Some(
            self.base
                .split_top_level(start, end)
                .into_iter()
                .map(|(s, e)| normalize_identifier(self.base.text(s, e)))
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }

    fn parse_references(&mut self, c: &mut TokenParsedConstraint) -> Result<(), ValidationIssue> {
        let missing = || {
            ValidationIssue::error(
                codes::CONSTRAINT_MISSING_REFERENCES,
                "FOREIGN KEY without REFERENCES table",
            )
        };
        self.base.expect_word_ci("REFERENCES").ok_or_else(missing)?;
        let (schema, table) = self.base.parse_qualified_name().ok_or_else(missing)?;
        c.referenced_schema = schema;
        c.referenced_table = Some(table);
        self.base.skip_whitespace();
        if self.base.check_token(&Token::LParen) {
            c.referenced_columns = self.parse_column_list().unwrap_or_default();
        }
        let actions = parse_foreign_key_actions(self.base);
        c.on_delete = actions.on_delete;
        c.on_update = actions.on_update;
        c.match_type = actions.match_type;
        Ok(())
    }

    fn parse_check(&mut self, c: &mut TokenParsedConstraint) -> Result<(), ValidationIssue> {
        let range = self.base.skip_group();
        let expression = range.map(|(s, e)| self.base.text(s, e)).unwrap_or("");
        if expression.is_empty() {
            return Err(ValidationIssue::error(
                codes::CONSTRAINT_MISSING_EXPRESSION,
                "CHECK constraint has no expression",
            ));
        }
        c.check_expression = Some(expression.to_string());
        if let Some((start, end)) = range {
            c.columns = referenced_identifiers(self.base, start, end);
        }
        self.base.skip_whitespace();
        self.base.consume_words_ci(&["NO", "INHERIT"]);
        Ok(())
    }

    fn parse_exclude(&mut self, c: &mut TokenParsedConstraint) -> Result<(), ValidationIssue> {
        if self.base.expect_word_ci("USING").is_some() {
            self.base.parse_identifier();
            self.base.skip_whitespace();
        }
        let Some((start, end)) = self.base.skip_group() else {
            return Err(ValidationIssue::error(
                codes::CONSTRAINT_EMPTY_COLUMNS,
                "EXCLUDE constraint has no elements",
            ));
        };
        c.exclude_elements = Some(self.base.text(start, end).to_string());
        c.columns = self
            .base
            .split_top_level(start, end)
            .into_iter()
            .filter_map(|(s, e)| {
                let element = self.base.text(s, e);
                let head = element.split_whitespace().next()?;
                Some(normalize_identifier(head))
            })
            .collect();
        if c.columns.is_empty() {
            return Err(ValidationIssue::error(
                codes::CONSTRAINT_EMPTY_COLUMNS,
                "EXCLUDE constraint has no elements",
            ));
        }
        skip_index_parameters(self.base);
        if self.base.expect_word_ci("WHERE").is_some() {
            self.base.skip_group();
        }
        Ok(())
    }

    fn parse_trailing_options(&mut self, c: &mut TokenParsedConstraint) {
        loop {
            self.base.skip_whitespace();
            if self.base.consume_words_ci(&["NOT", "DEFERRABLE"]) {
                c.is_deferrable = false;
            } else if self.base.expect_word_ci("DEFERRABLE").is_some() {
                c.is_deferrable = true;
            } else if self.base.consume_words_ci(&["INITIALLY", "DEFERRED"]) {
                c.initially_deferred = true;
            } else if self.base.consume_words_ci(&["INITIALLY", "IMMEDIATE"]) {
                c.initially_deferred = false;
            } else if self.base.consume_words_ci(&["NOT", "VALID"]) {
                c.is_not_valid = true;
            } else {
                break;
            }
        }
    }
}

/// Words inside a CHECK expression that are never column references.
const EXPRESSION_WORDS: &[&str] = &[
    "ALL", "AND", "ANY", "ARRAY", "AS", "AT", "BETWEEN", "CASE", "CAST", "COLLATE",
    "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DISTINCT", "ELSE", "END", "ESCAPE",
    "FALSE", "FROM", "ILIKE", "IN", "INTERVAL", "IS", "LIKE", "NOT", "NULL", "OR", "SIMILAR",
    "SOME", "THEN", "TIME", "TO", "TRUE", "VALUE", "WHEN", "ZONE",
];

/// Distinct plain identifiers in `start..end` that are not operators or function names.
fn referenced_identifiers(base: &TokenParser<'_>, start: usize, end: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for pos in start..end {
        let Some(Token::Word(word)) = base.token_at(pos) else {
            continue;
        };
        let is_operator_word = word.quote_style.is_none()
            && EXPRESSION_WORDS.iter().any(|w| word.value.eq_ignore_ascii_case(w));
        let next = next_code_token(base, pos + 1, end);
        let previous = previous_code_token(base, pos, start);
        let is_call = matches!(next, Some(Token::LParen));
        let is_qualifier = matches!(next, Some(Token::Period));
        let is_typed_literal = next.is_some_and(|t| string_literal_value(t).is_some());
        let is_type_name = matches!(previous, Some(Token::DoubleColon))
            || matches!(previous, Some(Token::Word(w)) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case("AS"));
        if is_operator_word || is_call || is_qualifier || is_typed_literal || is_type_name {
            continue;
        }
        if !names.iter().any(|n| n == &word.value) {
            names.push(word.value.clone());
        }
    }
    names
}

fn next_code_token<'t>(base: &'t TokenParser<'_>, from: usize, end: usize) -> Option<&'t Token> {
    (from..end)
        .filter_map(|pos| base.token_at(pos))
        .find(|t| !matches!(t, Token::Whitespace(_)))
}

fn previous_code_token<'t>(base: &'t TokenParser<'_>, before: usize, start: usize) -> Option<&'t Token> {
    (start..before)
        .rev()
        .filter_map(|pos| base.token_at(pos))
        .find(|t| !matches!(t, Token::Whitespace(_)))
}

/// Parse a single table constraint string.
pub fn parse_table_constraint_tokens(sql: &str) -> Result<TokenParsedConstraint, ValidationIssue> {
    let mut base = TokenParser::new(sql).map_err(|e| {
        ValidationIssue::error(codes::TOKENIZE_FAILED, format!("Constraint could not be tokenized: {}", e))
    })?;
    ConstraintTokenParser::new(&mut base).parse()
}

/// Words that start a table constraint after `ADD`
const CONSTRAINT_HEADS: &[&str] = &["CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "CHECK", "EXCLUDE"];

/// Extracts constraints added by `ALTER TABLE ... ADD`, one per `ADD` clause
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintExtractor;

impl Extractor for ConstraintExtractor {
    type Definition = Vec<ConstraintDefinition>;

    fn accepts(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Constraints
    }

    fn extract_block(&self, block: &StatementBlock) -> ExtractionOutcome<Vec<ConstraintDefinition>> {
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
                codes::CONSTRAINT_MISSING_TABLE,
                "ALTER TABLE statement has no table name",
            ));
        };
        base.skip_whitespace();
        base.expect_token(&Token::Mul);

        let mut constraints = Vec::new();
        let mut issues = Vec::new();
        for (start, end) in base.split_top_level(base.pos(), base.len()) {
            let mut action = base.slice(start, end);
            action.skip_whitespace();
            if action.expect_word_ci("ADD").is_none() || !action.check_any_word_ci(CONSTRAINT_HEADS) {
                continue;
            }
            match ConstraintTokenParser::new(&mut action).parse() {
                Ok(parsed) => constraints.push(parsed.into_definition(
                    schema.clone(),
                    &table_name,
                    block.source_location(),
                    &mut issues,
                )),
                Err(issue) => issues.push(issue),
            }
        }

        if issues.iter().any(ValidationIssue::is_error) {
            return ExtractionOutcome::failure_with(issues);
        }
        if constraints.is_empty() {
            return ExtractionOutcome::failure(ValidationIssue::error(
                codes::CONSTRAINT_UNKNOWN_TYPE,
                format!("ALTER TABLE {} does not add a constraint", table_name),
            ));
        }
        ExtractionOutcome::success(constraints, issues)
    }
}
